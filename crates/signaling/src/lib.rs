//! treffpunkt-signaling – WebSocket-Signaling-Hub
//!
//! Dieser Crate vermittelt SDP-Offers, Answers und ICE-Candidates zwischen
//! den Teilnehmern eines Raums, damit diese direkte WebRTC-Verbindungen
//! aufbauen koennen. Medien laufen nie ueber den Server.
//!
//! ## Architektur
//!
//! ```text
//! WebSocket-Upgrade (ws::verbindung_annehmen)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Lese-Pumpe  -> HubHandle::weiterleiten
//!     |  Schreib-Pumpe <- Mailbox
//!     v
//! Hub (eine Kontrollschleife, besitzt alle Raeume)
//!     |
//!     +-- Room         (Teilnehmer eines Calls)
//!     +-- Router       (offer/answer/ice-candidate an `to`, leave)
//!     +-- Teilnehmer   (Mailbox, begrenzt, Drop-Newest)
//! ```

pub mod connection;
pub mod error;
pub mod hub;
pub mod participant;
pub mod room;
pub mod router;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use connection::{ClientConnection, Endgrund, VerbindungsZustand};
pub use error::{SignalingError, SignalingResult};
pub use hub::{Hub, HubHandle, HubStatistik};
pub use participant::{ParticipantKey, Teilnehmer, TeilnehmerInfo};
pub use room::{RaumInfo, Room};
pub use server_state::{SignalingConfig, SignalingState};
pub use ws::verbindung_annehmen;
