//! Wire-Format fuer WebSocket-Verbindungen
//!
//! Jeder Text-Frame enthaelt genau ein JSON-Objekt (`SignalMessage`).
//! Die maximale Frame-Groesse ist konfigurierbar (Standard: 64 KiB) und gilt
//! nur fuer eingehende Frames. Ausgehende Frames koennen durch das vom Server
//! gesetzte `from` geringfuegig groesser sein als der Eingang.

use thiserror::Error;

use crate::signal::SignalMessage;

/// Standard-maximale Frame-Groesse (64 KiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Fehler beim Kodieren/Dekodieren eines Frames
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Frame zu gross: {laenge} Bytes (Maximum: {max} Bytes)")]
    ZuGross { laenge: usize, max: usize },

    #[error("JSON-Deserialisierung fehlgeschlagen: {0}")]
    Dekodierung(#[source] serde_json::Error),

    #[error("JSON-Serialisierung fehlgeschlagen: {0}")]
    Kodierung(#[source] serde_json::Error),
}

/// Codec fuer einzelne Signaling-Frames
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Dekodiert einen Text-Frame
    pub fn dekodieren(&self, frame: &str) -> Result<SignalMessage, WireError> {
        self.groesse_pruefen(frame.len())?;
        serde_json::from_str(frame).map_err(WireError::Dekodierung)
    }

    /// Kodiert eine Nachricht als Text-Frame
    pub fn kodieren(&self, nachricht: &SignalMessage) -> Result<String, WireError> {
        serde_json::to_string(nachricht).map_err(WireError::Kodierung)
    }

    fn groesse_pruefen(&self, laenge: usize) -> Result<(), WireError> {
        if laenge > self.max_frame_size {
            return Err(WireError::ZuGross {
                laenge,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::MessageKind;

    #[test]
    fn offer_dekodieren() {
        let codec = FrameCodec::new();
        let msg = codec
            .dekodieren(r#"{"type":"offer","to":"bob","data":{"sdp":"X"}}"#)
            .unwrap();
        assert_eq!(msg.kind, MessageKind::Offer);
        assert_eq!(msg.empfaenger().map(|p| p.as_str()), Some("bob"));
        assert!(msg.from.is_none());
    }

    #[test]
    fn client_absender_wird_gelesen_aber_nicht_vertraut() {
        // Der Codec liest `from` nur – ueberschrieben wird in der Lese-Pumpe
        let codec = FrameCodec::new();
        let msg = codec
            .dekodieren(r#"{"type":"answer","from":"mallory","to":"bob"}"#)
            .unwrap();
        let msg = msg.mit_absender("alice".into());
        assert_eq!(msg.from.map(|p| p.0), Some("alice".to_string()));
    }

    #[test]
    fn kaputtes_json_ist_fehler() {
        let codec = FrameCodec::new();
        assert!(matches!(
            codec.dekodieren("{nicht json"),
            Err(WireError::Dekodierung(_))
        ));
        assert!(matches!(
            codec.dekodieren(r#"{"to":"bob"}"#),
            Err(WireError::Dekodierung(_))
        ));
        assert!(matches!(
            codec.dekodieren("[1,2,3]"),
            Err(WireError::Dekodierung(_))
        ));
    }

    #[test]
    fn zu_grosser_frame_wird_abgelehnt() {
        let codec = FrameCodec::with_max_size(16);
        let frame = r#"{"type":"offer","to":"bob","data":"xxxxxxxx"}"#;
        match codec.dekodieren(frame) {
            Err(WireError::ZuGross { laenge, max }) => {
                assert_eq!(laenge, frame.len());
                assert_eq!(max, 16);
            }
            anderes => panic!("ZuGross erwartet, war: {anderes:?}"),
        }
    }

    #[test]
    fn kodieren_ist_nicht_begrenzt() {
        let codec = FrameCodec::with_max_size(8);
        let msg = SignalMessage::user_left("bob".into(), 1);
        assert!(codec.kodieren(&msg).is_ok());
    }

    #[test]
    fn kodieren_setzt_absender() {
        let codec = FrameCodec::new();
        let msg = SignalMessage::user_left("bob".into(), 1);
        let json = codec.kodieren(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"user-left","from":"bob","data":{"participants_count":1}}"#
        );
    }
}
