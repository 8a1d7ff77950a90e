//! Fehlertypen fuer den Signaling-Service
//!
//! Fehler einzelner Verbindungen werden nie an die Hub-Kontrollschleife
//! weitergereicht. Dieser Typ beschreibt nur, was ein Aufrufer des
//! `HubHandle` zurueckbekommen kann.

use std::time::Duration;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Die Hub-Kontrollschleife laeuft nicht mehr (Shutdown)
    #[error("Hub nicht erreichbar")]
    HubNichtErreichbar,

    /// Registrierung wurde nicht rechtzeitig bestaetigt
    #[error("Timeout nach {0:?}")]
    Timeout(Duration),
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
