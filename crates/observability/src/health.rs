//! Health-Check-Endpunkt fuer Treffpunkt
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime, Hub-Status und Raum-/Teilnehmerzahl

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::TreffpunktMetrics;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub hub_running: bool,
    pub rooms_active: i64,
    pub participants_connected: i64,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    pub hub_laeuft: Arc<AtomicBool>,
    pub metriken: TreffpunktMetrics,
}

impl HealthState {
    pub fn neu(metriken: TreffpunktMetrics) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            hub_laeuft: Arc::new(AtomicBool::new(true)),
            metriken,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn hub_aktiv(&self) -> bool {
        self.hub_laeuft.load(Ordering::Relaxed)
    }

    /// Wird gesetzt wenn die Hub-Kontrollschleife endet
    pub fn hub_status_setzen(&self, laeuft: bool) {
        self.hub_laeuft.store(laeuft, Ordering::Relaxed);
    }

    fn antwort(&self) -> HealthResponse {
        let hub_running = self.hub_aktiv();
        HealthResponse {
            status: if hub_running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            hub_running,
            rooms_active: self.metriken.rooms_active.get(),
            participants_connected: self.metriken.participants_connected.get(),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let response = state.antwort();
    let http_status = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (http_status, Json(response))
}
