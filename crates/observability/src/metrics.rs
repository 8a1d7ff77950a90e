//! Prometheus-kompatible Metriken fuer Treffpunkt
//!
//! Registrierte Metriken:
//! - `treffpunkt_participants_connected` – Gauge: Registrierte Teilnehmer
//! - `treffpunkt_rooms_active` – Gauge: Raeume mit mindestens einem Teilnehmer
//! - `treffpunkt_connections_total` – Counter: Angenommene WebSocket-Verbindungen
//! - `treffpunkt_messages_relayed_total` – Counter: Zugestellte Nachrichten (kind)
//! - `treffpunkt_messages_dropped_total` – Counter: Verworfene Nachrichten (reason)
//! - `treffpunkt_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `treffpunkt_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Grund fuer eine verworfene Nachricht (Label `reason`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropGrund {
    /// Mailbox des Empfaengers voll
    MailboxVoll,
    /// Gerichtete Nachricht ohne `to`
    EmpfaengerFehlt,
    /// Empfaenger nicht (mehr) im Raum
    EmpfaengerUnbekannt,
    /// Unbekannter oder nicht erlaubter Nachrichtentyp
    UnbekannterTyp,
    /// Frame nicht dekodierbar
    Fehlerhaft,
}

impl DropGrund {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MailboxVoll => "mailbox_full",
            Self::EmpfaengerFehlt => "recipient_missing",
            Self::EmpfaengerUnbekannt => "recipient_unknown",
            Self::UnbekannterTyp => "unknown_kind",
            Self::Fehlerhaft => "malformed",
        }
    }
}

/// Alle Treffpunkt-Prometheus-Metriken
///
/// Clone teilt die zugrunde liegenden Metriken.
#[derive(Clone)]
pub struct TreffpunktMetrics {
    pub registry: Arc<Registry>,

    // Signaling-Metriken
    pub participants_connected: IntGauge,
    pub rooms_active: IntGauge,
    pub connections_total: IntCounter,
    pub messages_relayed_total: IntCounterVec,
    pub messages_dropped_total: IntCounterVec,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl TreffpunktMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Signaling-Metriken ---
        let participants_connected = IntGauge::with_opts(Opts::new(
            "treffpunkt_participants_connected",
            "Anzahl aktuell registrierter Teilnehmer",
        ))?;
        registry.register(Box::new(participants_connected.clone()))?;

        let rooms_active = IntGauge::with_opts(Opts::new(
            "treffpunkt_rooms_active",
            "Anzahl aktiver Raeume",
        ))?;
        registry.register(Box::new(rooms_active.clone()))?;

        let connections_total = IntCounter::with_opts(Opts::new(
            "treffpunkt_connections_total",
            "Gesamtanzahl angenommener WebSocket-Verbindungen",
        ))?;
        registry.register(Box::new(connections_total.clone()))?;

        let messages_relayed_total = IntCounterVec::new(
            Opts::new(
                "treffpunkt_messages_relayed_total",
                "In eine Mailbox eingereihte Nachrichten",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(messages_relayed_total.clone()))?;

        let messages_dropped_total = IntCounterVec::new(
            Opts::new(
                "treffpunkt_messages_dropped_total",
                "Verworfene Nachrichten nach Grund",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(messages_dropped_total.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("treffpunkt_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "treffpunkt_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            participants_connected,
            rooms_active,
            connections_total,
            messages_relayed_total,
            messages_dropped_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Zaehlt eine zugestellte Nachricht
    pub fn zugestellt(&self, kind: &str) {
        self.messages_relayed_total.with_label_values(&[kind]).inc();
    }

    /// Zaehlt eine verworfene Nachricht
    pub fn verworfen(&self, grund: DropGrund) {
        self.messages_dropped_total
            .with_label_values(&[grund.label()])
            .inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: TreffpunktMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<TreffpunktMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = TreffpunktMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn gauges_setzen() {
        let metriken = TreffpunktMetrics::neu().unwrap();
        metriken.participants_connected.set(3);
        metriken.rooms_active.inc();
        assert_eq!(metriken.participants_connected.get(), 3);
        assert_eq!(metriken.rooms_active.get(), 1);
    }

    #[test]
    fn verworfen_nach_grund() {
        let metriken = TreffpunktMetrics::neu().unwrap();
        metriken.verworfen(DropGrund::MailboxVoll);
        metriken.verworfen(DropGrund::MailboxVoll);
        metriken.verworfen(DropGrund::UnbekannterTyp);

        let voll = metriken
            .messages_dropped_total
            .with_label_values(&["mailbox_full"])
            .get();
        let unbekannt = metriken
            .messages_dropped_total
            .with_label_values(&["unknown_kind"])
            .get();
        assert_eq!(voll, 2);
        assert_eq!(unbekannt, 1);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = TreffpunktMetrics::neu().unwrap();
        metriken.rooms_active.set(2);
        metriken.zugestellt("offer");

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("treffpunkt_rooms_active 2"));
        assert!(output.contains("treffpunkt_messages_relayed_total{kind=\"offer\"} 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn zwei_instanzen_haben_getrennte_registries() {
        let a = TreffpunktMetrics::neu().unwrap();
        let b = TreffpunktMetrics::neu().unwrap();
        a.connections_total.inc();
        assert_eq!(a.connections_total.get(), 1);
        assert_eq!(b.connections_total.get(), 0);
    }
}
