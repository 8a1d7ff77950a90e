//! treffpunkt-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod routes;

use anyhow::{Context, Result};
use config::ServerConfig;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;
use treffpunkt_observability::{HealthState, TreffpunktMetrics};
use treffpunkt_signaling::SignalingState;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bindet die konfigurierte Adresse und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let adresse = self.config.http_bind_adresse();
        let listener = TcpListener::bind(&adresse)
            .await
            .with_context(|| format!("Bind auf '{adresse}' fehlgeschlagen"))?;

        self.starten_mit(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht installiert werden");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Startet alle Subsysteme auf einem bereits gebundenen Listener
    ///
    /// Reihenfolge:
    /// 1. Metriken registrieren
    /// 2. Hub-Kontrollschleife starten
    /// 3. HTTP/WebSocket-Router ausliefern
    /// 4. Nach `shutdown`: Hub stoppen (schliesst alle Verbindungen)
    pub async fn starten_mit<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let signaling_config = self.config.signaling_config();
        signaling_config
            .validieren()
            .map_err(|e| anyhow::anyhow!("Ungueltige Signaling-Konfiguration: {e}"))?;

        let metriken = TreffpunktMetrics::neu()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (signaling, hub_task) =
            SignalingState::starten(signaling_config, metriken.clone(), shutdown_rx);

        let health = HealthState::neu(metriken);
        let hub_health = health.clone();
        let hub_task = tokio::spawn(async move {
            let ergebnis = hub_task.await;
            hub_health.hub_status_setzen(false);
            if let Err(e) = &ergebnis {
                tracing::error!(fehler = %e, "Signaling-Hub abgebrochen");
            }
            ergebnis
        });

        let app = routes::app(&self.config, signaling, health);

        tracing::info!(
            adresse = %listener.local_addr()?,
            observability = self.config.observability.aktiviert,
            "Treffpunkt-Server gestartet"
        );

        let signal_tx = shutdown_tx.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                // Hub schliesst alle Mailboxen, damit offene WebSockets enden
                let _ = signal_tx.send(true);
            })
            .await?;

        let _ = shutdown_tx.send(true);
        hub_task
            .await
            .context("Hub-Task nicht beendet")?
            .context("Signaling-Hub abgebrochen")?;

        tracing::info!("Server beendet");
        Ok(())
    }
}
