//! Structured Logging Setup via tracing-subscriber
//!
//! Die Umgebung hat Vorrang vor der Konfigurationsdatei:
//! - `TREFFPUNKT_LOG_LEVEL`: Filter-Direktive (z.B. `debug` oder
//!   `treffpunkt_signaling=trace,info`)
//! - `TREFFPUNKT_LOG_FORMAT`: `text` oder `json`

use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Filter
pub const LOG_LEVEL_ENV: &str = "TREFFPUNKT_LOG_LEVEL";

/// Umgebungsvariable fuer das Log-Format
pub const LOG_FORMAT_ENV: &str = "TREFFPUNKT_LOG_FORMAT";

/// Ausgabeformat der Log-Events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anderes => Err(format!("Unbekanntes Log-Format '{anderes}' (erlaubt: text, json)")),
        }
    }
}

/// Baut den Filter aus einer Direktive; ungueltige Direktiven fallen auf `info` zurueck
pub fn filter_bauen(direktive: &str) -> EnvFilter {
    EnvFilter::try_new(direktive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialisiert das Logging-System.
///
/// `level` und `format` kommen aus der Konfiguration und werden von
/// `TREFFPUNKT_LOG_LEVEL` bzw. `TREFFPUNKT_LOG_FORMAT` ueberschrieben. Ein
/// unbekanntes Format faellt auf `text` zurueck.
pub fn logging_initialisieren(level: &str, format: &str) -> anyhow::Result<()> {
    let filter = match std::env::var(LOG_LEVEL_ENV) {
        Ok(direktive) => filter_bauen(&direktive),
        Err(_) => filter_bauen(level),
    };

    let format_roh = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| format.to_string());
    let (format, format_fehler) = match format_roh.parse::<LogFormat>() {
        Ok(f) => (f, None),
        Err(e) => (LogFormat::Text, Some(e)),
    };

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| anyhow::anyhow!("Logging-Initialisierung fehlgeschlagen: {e}"))?;

    if let Some(fehler) = format_fehler {
        tracing::warn!(fehler = %fehler, "Verwende Log-Format 'text'");
    }
    Ok(())
}
