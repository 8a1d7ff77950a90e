//! Teilnehmer und Mailbox
//!
//! Ein `Teilnehmer` ist eine registrierte Identitaet in genau einem Raum. Er
//! haelt das einzige Sende-Ende seiner Mailbox; Empfaenger ist die
//! Schreib-Pumpe der zugehoerigen Verbindung.
//!
//! Da nur der Hub Teilnehmer besitzt, ist die Mailbox genau dann geschlossen,
//! wenn der Teilnehmer aus seinem Raum entfernt (gedroppt) wurde. Ein
//! geschlossenes Postfach kann dadurch nicht mehr beschrieben werden.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use treffpunkt_core::{ConnectionId, ParticipantId, RoomId, UserId};
use treffpunkt_observability::{DropGrund, TreffpunktMetrics};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standard-Groesse der Mailbox pro Teilnehmer
pub const STANDARD_MAILBOX_KAPAZITAET: usize = 256;

// ---------------------------------------------------------------------------
// ParticipantKey
// ---------------------------------------------------------------------------

/// Adresse eines Teilnehmers aus Sicht seiner Verbindung
///
/// Die `ConnectionId` unterscheidet eine neue Registrierung unter derselben
/// Teilnehmer-ID von der alten, ersetzten Verbindung.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantKey {
    pub raum: RoomId,
    pub teilnehmer: ParticipantId,
    pub verbindung: ConnectionId,
}

// ---------------------------------------------------------------------------
// Mailbox
// ---------------------------------------------------------------------------

/// Ergebnis eines Zustellversuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustellung {
    Eingereiht,
    /// Mailbox voll – Nachricht fuer diesen Empfaenger verworfen
    Voll,
    /// Schreib-Pumpe beendet
    Geschlossen,
}

/// Begrenzte ausgehende Queue eines Teilnehmers (Produzent: Hub)
#[derive(Debug)]
pub struct Mailbox {
    tx: mpsc::Sender<String>,
}

impl Mailbox {
    /// Erstellt eine Mailbox und gibt das Empfangs-Ende fuer die Schreib-Pumpe zurueck
    pub fn neu(kapazitaet: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(kapazitaet.max(1));
        (Self { tx }, rx)
    }

    /// Reiht einen fertig kodierten Frame nicht-blockierend ein
    ///
    /// Bei voller Queue wird der neue Frame verworfen, bereits eingereihte
    /// Frames bleiben in ihrer Reihenfolge erhalten.
    pub fn einreihen(&self, rahmen: String) -> Zustellung {
        match self.tx.try_send(rahmen) {
            Ok(()) => Zustellung::Eingereiht,
            Err(mpsc::error::TrySendError::Full(_)) => Zustellung::Voll,
            Err(mpsc::error::TrySendError::Closed(_)) => Zustellung::Geschlossen,
        }
    }
}

// ---------------------------------------------------------------------------
// Teilnehmer
// ---------------------------------------------------------------------------

/// Registrierte Identitaet in einem Raum
#[derive(Debug)]
pub struct Teilnehmer {
    pub id: ParticipantId,
    pub user_id: UserId,
    pub raum_id: RoomId,
    pub verbindung_id: ConnectionId,
    pub beigetreten_am: DateTime<Utc>,
    mailbox: Mailbox,
}

impl Teilnehmer {
    /// Erstellt einen Teilnehmer fuer eine neue Verbindung
    pub fn neu(
        id: ParticipantId,
        user_id: UserId,
        raum_id: RoomId,
        mailbox_kapazitaet: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (mailbox, rx) = Mailbox::neu(mailbox_kapazitaet);
        let teilnehmer = Self {
            id,
            user_id,
            raum_id,
            verbindung_id: ConnectionId::new(),
            beigetreten_am: Utc::now(),
            mailbox,
        };
        (teilnehmer, rx)
    }

    pub fn schluessel(&self) -> ParticipantKey {
        ParticipantKey {
            raum: self.raum_id.clone(),
            teilnehmer: self.id.clone(),
            verbindung: self.verbindung_id,
        }
    }

    /// Prueft ob der Schluessel zu genau dieser Verbindung gehoert
    pub fn passt_zu(&self, schluessel: &ParticipantKey) -> bool {
        self.id == schluessel.teilnehmer && self.verbindung_id == schluessel.verbindung
    }

    /// Stellt einen Frame zu und zaehlt das Ergebnis
    pub fn zustellen(&self, rahmen: String, kind: &str, metriken: &TreffpunktMetrics) -> Zustellung {
        let ergebnis = self.mailbox.einreihen(rahmen);
        match ergebnis {
            Zustellung::Eingereiht => metriken.zugestellt(kind),
            Zustellung::Voll => {
                tracing::warn!(
                    room_id = %self.raum_id,
                    participant = %self.id,
                    kind,
                    "Mailbox voll – Nachricht verworfen"
                );
                metriken.verworfen(DropGrund::MailboxVoll);
            }
            Zustellung::Geschlossen => {
                tracing::debug!(
                    room_id = %self.raum_id,
                    participant = %self.id,
                    "Mailbox geschlossen (Verbindung endet)"
                );
            }
        }
        ergebnis
    }

    pub fn info(&self) -> TeilnehmerInfo {
        TeilnehmerInfo {
            participant_id: self.id.clone(),
            user_id: self.user_id,
            joined_at: self.beigetreten_am,
        }
    }
}

/// Oeffentliche Sicht auf einen Teilnehmer (ohne Mailbox)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeilnehmerInfo {
    pub participant_id: ParticipantId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
}
