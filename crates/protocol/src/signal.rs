//! Signaling-Nachrichten (JSON, ein Objekt pro Frame)
//!
//! ```text
//! { "type": "offer" | "answer" | "ice-candidate" | "leave" | "user-joined" | "user-left",
//!   "from": "<vom Server gesetzt>",
//!   "to":   "<Pflicht fuer offer/answer/ice-candidate>",
//!   "data": <beliebiger JSON-Wert> }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use treffpunkt_core::ParticipantId;

// ---------------------------------------------------------------------------
// Nachrichtentyp
// ---------------------------------------------------------------------------

/// Typ einer Signaling-Nachricht
///
/// Unbekannte Typ-Strings werden nicht abgelehnt, sondern als `Unbekannt`
/// dekodiert, damit der Hub sie protokollieren und verwerfen kann ohne die
/// Verbindung zu trennen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    Join,
    Offer,
    Answer,
    IceCandidate,
    Leave,
    UserJoined,
    UserLeft,
    Unbekannt(String),
}

impl MessageKind {
    /// Draht-Darstellung des Typs
    pub fn as_str(&self) -> &str {
        match self {
            Self::Join => "join",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::Leave => "leave",
            Self::UserJoined => "user-joined",
            Self::UserLeft => "user-left",
            Self::Unbekannt(typ) => typ,
        }
    }
}

impl From<String> for MessageKind {
    fn from(typ: String) -> Self {
        match typ.as_str() {
            "join" => Self::Join,
            "offer" => Self::Offer,
            "answer" => Self::Answer,
            "ice-candidate" => Self::IceCandidate,
            "leave" => Self::Leave,
            "user-joined" => Self::UserJoined,
            "user-left" => Self::UserLeft,
            _ => Self::Unbekannt(typ),
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Unbekannt(typ) => typ,
            bekannt => bekannt.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Nachricht
// ---------------------------------------------------------------------------

/// Eine Signaling-Nachricht
///
/// `data` wird als rohes JSON gehalten und unveraendert weitergereicht,
/// auch ein explizites `null`. Nur ein fehlendes Feld ist `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ParticipantId>,
    #[serde(
        default,
        deserialize_with = "roh_behalten",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Box<RawValue>>,
}

/// Liest `data` als rohes JSON, damit `null` nicht zu `None` wird
fn roh_behalten<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

/// Inhalt von `data` bei `user-joined` / `user-left`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeilnehmerAnzahl {
    pub participants_count: usize,
}

impl SignalMessage {
    /// Erstellt eine Nachricht ohne Absender, Empfaenger und Daten
    pub fn neu(kind: MessageKind) -> Self {
        Self {
            kind,
            from: None,
            to: None,
            data: None,
        }
    }

    /// Praesenz-Hinweis: `from` ist dem Raum beigetreten
    pub fn user_joined(from: ParticipantId, anzahl: usize) -> Self {
        Self::praesenz(MessageKind::UserJoined, from, anzahl)
    }

    /// Praesenz-Hinweis: `from` hat den Raum verlassen
    pub fn user_left(from: ParticipantId, anzahl: usize) -> Self {
        Self::praesenz(MessageKind::UserLeft, from, anzahl)
    }

    fn praesenz(kind: MessageKind, from: ParticipantId, anzahl: usize) -> Self {
        let data = serde_json::value::to_raw_value(&TeilnehmerAnzahl {
            participants_count: anzahl,
        })
        .ok();
        Self {
            kind,
            from: Some(from),
            to: None,
            data,
        }
    }

    /// Setzt den Absender (ueberschreibt jeden vom Client gesendeten Wert)
    pub fn mit_absender(mut self, from: ParticipantId) -> Self {
        self.from = Some(from);
        self
    }

    /// Empfaenger, sofern gesetzt und nicht leer
    pub fn empfaenger(&self) -> Option<&ParticipantId> {
        self.to.as_ref().filter(|to| !to.as_str().is_empty())
    }

    /// Rohes JSON von `data` (falls vorhanden)
    pub fn data_roh(&self) -> Option<&str> {
        self.data.as_deref().map(RawValue::get)
    }

    /// Dekodiert die Teilnehmerzahl aus einer Praesenz-Nachricht
    pub fn teilnehmer_anzahl(&self) -> Option<usize> {
        let roh = self.data_roh()?;
        serde_json::from_str::<TeilnehmerAnzahl>(roh)
            .ok()
            .map(|d| d.participants_count)
    }
}
