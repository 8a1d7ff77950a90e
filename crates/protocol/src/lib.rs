//! treffpunkt-protocol – Signaling-Protokoll
//!
//! Dieses Crate definiert das JSON-Nachrichtenschema, das zwischen Browser
//! und Hub ausgetauscht wird, sowie den Codec fuer einzelne WebSocket-Frames.
//!
//! Der Hub kennt von einer Nachricht nur Typ, Absender und Empfaenger. Das
//! Feld `data` (SDP oder ICE-Kandidat) bleibt uninterpretiert.

pub mod signal;
pub mod wire;

pub use signal::{MessageKind, SignalMessage};
pub use wire::{FrameCodec, WireError};
