//! Raum – Menge der Teilnehmer eines Calls
//!
//! Raeume werden ausschliesslich von der Hub-Kontrollschleife angelegt,
//! veraendert und geloescht. Ein leerer Raum existiert nie laenger als der
//! Mutationsschritt, der sein letztes Mitglied entfernt.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use treffpunkt_core::{ParticipantId, RoomId};
use treffpunkt_observability::TreffpunktMetrics;

use crate::participant::{ParticipantKey, Teilnehmer, TeilnehmerInfo, Zustellung};

/// Ein Call-Raum
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub erstellt_am: DateTime<Utc>,
    mitglieder: HashMap<ParticipantId, Teilnehmer>,
}

impl Room {
    pub fn neu(id: RoomId) -> Self {
        Self {
            id,
            erstellt_am: Utc::now(),
            mitglieder: HashMap::new(),
        }
    }

    /// Fuegt einen Teilnehmer hinzu
    ///
    /// Ein vorhandener Eintrag mit derselben Teilnehmer-ID wird ersetzt und
    /// zurueckgegeben (last-writer-wins).
    pub fn einfuegen(&mut self, teilnehmer: Teilnehmer) -> Option<Teilnehmer> {
        self.mitglieder.insert(teilnehmer.id.clone(), teilnehmer)
    }

    /// Entfernt den Teilnehmer, sofern der Schluessel zur aktuellen
    /// Verbindung unter dieser ID gehoert
    pub fn entfernen(&mut self, schluessel: &ParticipantKey) -> Option<Teilnehmer> {
        let passt = self
            .mitglieder
            .get(&schluessel.teilnehmer)
            .is_some_and(|t| t.passt_zu(schluessel));
        if passt {
            self.mitglieder.remove(&schluessel.teilnehmer)
        } else {
            None
        }
    }

    /// Aktuelles Mitglied mit genau diesem Schluessel
    pub fn mitglied(&self, schluessel: &ParticipantKey) -> Option<&Teilnehmer> {
        self.mitglieder
            .get(&schluessel.teilnehmer)
            .filter(|t| t.passt_zu(schluessel))
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Teilnehmer> {
        self.mitglieder.get(id)
    }

    pub fn anzahl(&self) -> usize {
        self.mitglieder.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.mitglieder.is_empty()
    }

    /// Teilnehmer-IDs sortiert nach Beitrittszeit
    #[cfg(test)]
    pub fn teilnehmer_ids(&self) -> Vec<ParticipantId> {
        let mut mitglieder: Vec<&Teilnehmer> = self.mitglieder.values().collect();
        mitglieder.sort_by(|a, b| {
            a.beigetreten_am
                .cmp(&b.beigetreten_am)
                .then_with(|| a.id.cmp(&b.id))
        });
        mitglieder.into_iter().map(|t| t.id.clone()).collect()
    }

    /// Sendet einen Frame an alle Mitglieder ausser `ausser`
    ///
    /// Gibt die Anzahl der erfolgreich eingereihten Frames zurueck. Eine
    /// volle Mailbox betrifft nur ihren eigenen Teilnehmer.
    pub fn an_alle_ausser(
        &self,
        ausser: Option<&ParticipantId>,
        rahmen: &str,
        kind: &str,
        metriken: &TreffpunktMetrics,
    ) -> usize {
        let mut gesendet = 0;
        for teilnehmer in self.mitglieder.values() {
            if Some(&teilnehmer.id) == ausser {
                continue;
            }
            if teilnehmer.zustellen(rahmen.to_string(), kind, metriken) == Zustellung::Eingereiht {
                gesendet += 1;
            }
        }
        gesendet
    }

    /// Momentaufnahme fuer die HTTP-Schicht
    pub fn info(&self) -> RaumInfo {
        let mut participants: Vec<TeilnehmerInfo> =
            self.mitglieder.values().map(Teilnehmer::info).collect();
        participants.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.participant_id.cmp(&b.participant_id))
        });
        RaumInfo {
            room_id: self.id.clone(),
            created_at: self.erstellt_am,
            participants_count: participants.len(),
            participants,
        }
    }
}

/// Oeffentliche Sicht auf einen Raum
#[derive(Debug, Clone, Serialize)]
pub struct RaumInfo {
    pub room_id: RoomId,
    pub created_at: DateTime<Utc>,
    pub participants_count: usize,
    pub participants: Vec<TeilnehmerInfo>,
}
