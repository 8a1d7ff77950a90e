//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use treffpunkt_signaling::SignalingConfig;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Hub- und Verbindungs-Einstellungen
    pub signaling: SignalingEinstellungen,
    /// Uebergabe der Identitaet von der vorgelagerten Auth-Schicht
    pub identitaet: IdentitaetEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub http_port: u16,
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 8080,
            cors_origins: vec![],
        }
    }
}

/// Hub- und Verbindungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    /// Plaetze in der Mailbox pro Teilnehmer
    pub mailbox_kapazitaet: usize,
    /// Plaetze in der Befehls-Queue des Hubs
    pub hub_queue_kapazitaet: usize,
    /// Maximale Groesse eines eingehenden Frames
    pub max_frame_bytes: usize,
    pub register_timeout_sek: u64,
    pub keepalive_sek: u64,
    pub idle_timeout_sek: u64,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        Self {
            mailbox_kapazitaet: 256,
            hub_queue_kapazitaet: 1024,
            max_frame_bytes: 64 * 1024,
            register_timeout_sek: 5,
            keepalive_sek: 30,
            idle_timeout_sek: 90,
        }
    }
}

/// Identitaets-Uebergabe
///
/// Die Authentifizierung findet vor diesem Server statt. Die vorgelagerte
/// Schicht setzt die Benutzer-ID als Header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitaetEinstellungen {
    /// Header-Name mit der Benutzer-ID (Ganzzahl)
    pub user_header: String,
}

impl Default for IdentitaetEinstellungen {
    fn default() -> Self {
        Self {
            user_header: "x-user-id".into(),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Haengt `/metrics` und `/health` in den Router
    pub aktiviert: bool,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self { aktiviert: true }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    /// Nullwerte im `[signaling]`-Abschnitt sind ein Fehler (ausser `keepalive_sek`).
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config
                    .signaling_config()
                    .validieren()
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die Bind-Adresse fuer HTTP und WebSocket zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.http_port)
    }

    /// Uebersetzt den `[signaling]`-Abschnitt fuer den Hub
    pub fn signaling_config(&self) -> SignalingConfig {
        let s = &self.signaling;
        SignalingConfig {
            mailbox_kapazitaet: s.mailbox_kapazitaet,
            hub_queue_kapazitaet: s.hub_queue_kapazitaet,
            max_frame_bytes: s.max_frame_bytes,
            register_timeout: Duration::from_secs(s.register_timeout_sek),
            keepalive: Duration::from_secs(s.keepalive_sek),
            idle_timeout: Duration::from_secs(s.idle_timeout_sek),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.netzwerk.http_port, 8080);
        assert_eq!(cfg.signaling.mailbox_kapazitaet, 256);
        assert_eq!(cfg.identitaet.user_header, "x-user-id");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.observability.aktiviert);
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_bind_adresse(), "0.0.0.0:8080");
    }

    #[test]
    fn signaling_config_uebernimmt_zeiten() {
        let mut cfg = ServerConfig::default();
        cfg.signaling.keepalive_sek = 10;
        cfg.signaling.idle_timeout_sek = 25;

        let sig = cfg.signaling_config();
        assert_eq!(sig.keepalive, Duration::from_secs(10));
        assert_eq!(sig.idle_timeout, Duration::from_secs(25));
        assert_eq!(sig.register_timeout, Duration::from_secs(5));
        assert_eq!(sig.max_frame_bytes, 65536);
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            http_port = 9000
            cors_origins = ["https://app.example"]

            [signaling]
            mailbox_kapazitaet = 32

            [identitaet]
            user_header = "x-auth-user"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.http_port, 9000);
        assert_eq!(cfg.netzwerk.cors_origins, vec!["https://app.example"]);
        assert_eq!(cfg.signaling.mailbox_kapazitaet, 32);
        assert_eq!(cfg.identitaet.user_header, "x-auth-user");
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.signaling.hub_queue_kapazitaet, 1024);
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/treffpunkt.toml").unwrap();
        assert_eq!(cfg.netzwerk.http_port, 8080);
    }

    #[test]
    fn nullwerte_in_datei_sind_fehler() {
        let pfad = std::env::temp_dir().join(format!("treffpunkt-null-{}.toml", std::process::id()));
        std::fs::write(&pfad, "[signaling]\nidle_timeout_sek = 0\n").unwrap();
        let ergebnis = ServerConfig::laden(pfad.to_str().unwrap());
        let _ = std::fs::remove_file(&pfad);

        let fehler = ergebnis.unwrap_err().to_string();
        assert!(fehler.contains("idle_timeout"), "{fehler}");
    }

    #[test]
    fn keepalive_null_wird_akzeptiert() {
        let mut cfg = ServerConfig::default();
        cfg.signaling.keepalive_sek = 0;
        assert!(cfg.signaling_config().validieren().is_ok());
        cfg.signaling.mailbox_kapazitaet = 0;
        assert!(cfg.signaling_config().validieren().is_err());
    }

    #[test]
    fn kaputte_datei_ist_fehler() {
        let pfad = std::env::temp_dir().join(format!("treffpunkt-{}.toml", std::process::id()));
        std::fs::write(&pfad, "[netzwerk\nhttp_port = ").unwrap();
        let ergebnis = ServerConfig::laden(pfad.to_str().unwrap());
        let _ = std::fs::remove_file(&pfad);
        assert!(ergebnis.is_err());
    }
}
