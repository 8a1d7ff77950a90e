//! Gemeinsamer Zustand fuer den Signaling-Service
//!
//! Haelt den Hub-Handle, die Konfiguration und die Metriken. Clone ist
//! billig und teilt denselben Hub.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use treffpunkt_observability::TreffpunktMetrics;
use treffpunkt_protocol::{wire::DEFAULT_MAX_FRAME_SIZE, FrameCodec};

use crate::hub::{Hub, HubHandle, STANDARD_HUB_QUEUE};
use crate::participant::STANDARD_MAILBOX_KAPAZITAET;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Plaetze in der Mailbox pro Teilnehmer
    pub mailbox_kapazitaet: usize,
    /// Plaetze in der Befehls-Queue des Hubs
    pub hub_queue_kapazitaet: usize,
    /// Maximale Groesse eines eingehenden Frames in Bytes
    pub max_frame_bytes: usize,
    /// Wartezeit auf die Bestaetigung der Registrierung
    pub register_timeout: Duration,
    /// Ping-Intervall der Schreib-Pumpe
    pub keepalive: Duration,
    /// Verbindung wird getrennt, wenn so lange kein Frame eingeht
    pub idle_timeout: Duration,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            mailbox_kapazitaet: STANDARD_MAILBOX_KAPAZITAET,
            hub_queue_kapazitaet: STANDARD_HUB_QUEUE,
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
            register_timeout: Duration::from_secs(5),
            keepalive: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
        }
    }
}

impl SignalingConfig {
    /// Validiert die Konfiguration
    ///
    /// `keepalive` darf 0 sein (keine Pings), alle anderen Werte nicht.
    pub fn validieren(&self) -> Result<(), String> {
        let kapazitaeten = [
            ("mailbox_kapazitaet", self.mailbox_kapazitaet),
            ("hub_queue_kapazitaet", self.hub_queue_kapazitaet),
            ("max_frame_bytes", self.max_frame_bytes),
        ];
        for (name, wert) in kapazitaeten {
            if wert == 0 {
                return Err(format!("{name} muss groesser als 0 sein"));
            }
        }
        if self.register_timeout.is_zero() {
            return Err("register_timeout muss groesser als 0 sein".into());
        }
        if self.idle_timeout.is_zero() {
            return Err("idle_timeout muss groesser als 0 sein".into());
        }
        if !self.keepalive.is_zero() && self.keepalive >= self.idle_timeout {
            return Err(format!(
                "keepalive ({:?}) muss kleiner als idle_timeout ({:?}) sein",
                self.keepalive, self.idle_timeout
            ));
        }
        Ok(())
    }
}

/// Gemeinsamer Zustand (Clone teilt Hub, Konfiguration und Metriken)
#[derive(Clone)]
pub struct SignalingState {
    pub hub: HubHandle,
    pub config: Arc<SignalingConfig>,
    pub metriken: TreffpunktMetrics,
}

impl SignalingState {
    /// Startet den Hub und erstellt den Zustand dazu
    ///
    /// Der zurueckgegebene `JoinHandle` endet, sobald der Hub nach einem
    /// Shutdown-Signal alle Raeume geschlossen hat.
    pub fn starten(
        config: SignalingConfig,
        metriken: TreffpunktMetrics,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let hub = Hub::neu(FrameCodec::with_max_size(config.max_frame_bytes), metriken.clone());
        let (handle, task) = hub.starten(config.hub_queue_kapazitaet, shutdown_rx);
        let state = Self {
            hub: handle,
            config: Arc::new(config),
            metriken,
        };
        (state, task)
    }

    /// Codec fuer eingehende Frames einer Verbindung
    pub fn codec(&self) -> FrameCodec {
        FrameCodec::with_max_size(self.config.max_frame_bytes)
    }
}
