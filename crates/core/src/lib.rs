//! treffpunkt-core – Gemeinsame Identifikationstypen
//!
//! Dieses Crate stellt die IDs bereit, die von Protokoll, Signaling und
//! Server gemeinsam genutzt werden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{ConnectionId, ParticipantId, RoomId, UserId};
