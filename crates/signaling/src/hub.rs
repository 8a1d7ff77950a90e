//! Hub – Einzige Instanz, die Raeume und Mitgliedschaften veraendert
//!
//! Die Raumtabelle gehoert exklusiv der Kontrollschleife (`Hub::run`). Alle
//! anderen Tasks sprechen ueber einen `HubHandle` mit ihr; Registrieren,
//! Abmelden und Weiterleiten werden damit strikt nacheinander ausgefuehrt.
//! Es gibt weder Locks pro Raum noch einen Lock auf die Tabelle.
//!
//! ```text
//! Lese-Pumpe ──Weiterleiten──┐
//! Verbindung ──Registrieren──┼──> mpsc ──> Hub::run ──> Router ──> Mailbox(en)
//! Verbindung ──Abmelden──────┘
//! ```
//!
//! Reihenfolge: Innerhalb eines Raums sehen alle Mitglieder Beitritte,
//! Abgaenge und Nachrichten in der Reihenfolge, in der sie beim Hub
//! eingegangen sind.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use treffpunkt_core::{ParticipantId, RoomId};
use treffpunkt_observability::{DropGrund, TreffpunktMetrics};
use treffpunkt_protocol::{FrameCodec, SignalMessage};

use crate::error::{SignalingError, SignalingResult};
use crate::participant::{ParticipantKey, Teilnehmer};
use crate::room::{RaumInfo, Room};
use crate::router::{self, Entscheidung};

/// Standard-Groesse der Befehls-Queue des Hubs
pub const STANDARD_HUB_QUEUE: usize = 1024;

// ---------------------------------------------------------------------------
// Befehle
// ---------------------------------------------------------------------------

/// Befehle an die Kontrollschleife
#[derive(Debug)]
pub enum HubBefehl {
    Registrieren {
        teilnehmer: Teilnehmer,
        bestaetigung: oneshot::Sender<()>,
    },
    Abmelden {
        schluessel: ParticipantKey,
    },
    Weiterleiten {
        absender: ParticipantKey,
        nachricht: SignalMessage,
    },
    RaumInfo {
        raum_id: RoomId,
        antwort: oneshot::Sender<Option<RaumInfo>>,
    },
    Statistik {
        antwort: oneshot::Sender<HubStatistik>,
    },
}

/// Zaehler ueber den aktuellen Hub-Zustand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HubStatistik {
    pub raeume: usize,
    pub teilnehmer: usize,
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Zustand des Hubs (nur innerhalb der Kontrollschleife benutzt)
pub struct Hub {
    raeume: HashMap<RoomId, Room>,
    codec: FrameCodec,
    metriken: TreffpunktMetrics,
}

impl Hub {
    pub fn neu(codec: FrameCodec, metriken: TreffpunktMetrics) -> Self {
        Self {
            raeume: HashMap::new(),
            codec,
            metriken,
        }
    }

    /// Startet die Kontrollschleife als eigenen Task
    pub fn starten(
        self,
        queue_kapazitaet: usize,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_kapazitaet.max(1));
        let task = tokio::spawn(self.run(rx, shutdown_rx));
        (HubHandle { tx }, task)
    }

    /// Kontrollschleife
    ///
    /// Laeuft bis ein Shutdown-Signal eingeht oder alle Handles gedroppt
    /// sind. Beim Shutdown werden alle Raeume geleert, womit jede Mailbox
    /// geschlossen wird und alle Schreib-Pumpen enden.
    pub async fn run(
        mut self,
        mut befehle: mpsc::Receiver<HubBefehl>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tracing::info!("Signaling-Hub gestartet");

        loop {
            tokio::select! {
                befehl = befehle.recv() => {
                    match befehl {
                        Some(befehl) => self.ausfuehren(befehl),
                        None => {
                            tracing::debug!("Alle Hub-Handles geschlossen");
                            break;
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Signaling-Hub: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        let statistik = self.statistik();
        self.raeume.clear();
        self.metriken_aktualisieren();
        tracing::info!(
            raeume = statistik.raeume,
            teilnehmer = statistik.teilnehmer,
            "Signaling-Hub gestoppt, alle Mailboxen geschlossen"
        );
    }

    /// Fuehrt einen einzelnen Befehl aus
    pub fn ausfuehren(&mut self, befehl: HubBefehl) {
        match befehl {
            HubBefehl::Registrieren {
                teilnehmer,
                bestaetigung,
            } => {
                self.registrieren(teilnehmer);
                // Verbindung kann inzwischen aufgegeben haben
                let _ = bestaetigung.send(());
            }
            HubBefehl::Abmelden { schluessel } => {
                self.abmelden(&schluessel);
            }
            HubBefehl::Weiterleiten {
                absender,
                nachricht,
            } => self.weiterleiten(&absender, nachricht),
            HubBefehl::RaumInfo { raum_id, antwort } => {
                let _ = antwort.send(self.raum_info(&raum_id));
            }
            HubBefehl::Statistik { antwort } => {
                let _ = antwort.send(self.statistik());
            }
        }
    }

    /// Fuegt einen Teilnehmer seinem Raum hinzu und legt den Raum bei Bedarf an
    ///
    /// Alle anderen Mitglieder erhalten `user-joined` mit der neuen
    /// Teilnehmerzahl. Eine bestehende Registrierung unter derselben ID wird
    /// ersetzt; deren Mailbox wird dabei geschlossen.
    pub fn registrieren(&mut self, teilnehmer: Teilnehmer) {
        let raum_id = teilnehmer.raum_id.clone();
        let teilnehmer_id = teilnehmer.id.clone();

        let raum = self.raeume.entry(raum_id.clone()).or_insert_with(|| {
            tracing::info!(room_id = %raum_id, "Raum erstellt");
            Room::neu(raum_id.clone())
        });

        if let Some(ersetzt) = raum.einfuegen(teilnehmer) {
            tracing::warn!(
                room_id = %raum_id,
                participant = %teilnehmer_id,
                alte_verbindung = %ersetzt.verbindung_id,
                "Teilnehmer-ID erneut registriert – alte Verbindung ersetzt"
            );
        }

        let anzahl = raum.anzahl();
        tracing::info!(
            room_id = %raum_id,
            participant = %teilnehmer_id,
            participants = anzahl,
            "Teilnehmer registriert"
        );

        let hinweis = SignalMessage::user_joined(teilnehmer_id.clone(), anzahl);
        self.an_raum_senden(&raum_id, Some(&teilnehmer_id), &hinweis);
        self.metriken_aktualisieren();
    }

    /// Entfernt einen Teilnehmer und schliesst seine Mailbox
    ///
    /// Ist der Schluessel nicht (mehr) registriert, passiert nichts. Die
    /// verbleibenden Mitglieder erhalten `user-left`; ein leerer Raum wird im
    /// selben Schritt geloescht. Gibt `true` zurueck wenn entfernt wurde.
    pub fn abmelden(&mut self, schluessel: &ParticipantKey) -> bool {
        let Some(raum) = self.raeume.get_mut(&schluessel.raum) else {
            return false;
        };
        let Some(entfernt) = raum.entfernen(schluessel) else {
            return false;
        };
        // Mailbox schliessen bevor irgendjemand benachrichtigt wird
        drop(entfernt);

        let anzahl = raum.anzahl();
        tracing::info!(
            room_id = %schluessel.raum,
            participant = %schluessel.teilnehmer,
            participants = anzahl,
            "Teilnehmer abgemeldet"
        );

        if raum.ist_leer() {
            self.raeume.remove(&schluessel.raum);
            tracing::info!(room_id = %schluessel.raum, "Raum geloescht (leer)");
        } else {
            let hinweis = SignalMessage::user_left(schluessel.teilnehmer.clone(), anzahl);
            self.an_raum_senden(&schluessel.raum, None, &hinweis);
        }

        self.metriken_aktualisieren();
        true
    }

    /// Leitet eine Nachricht eines registrierten Teilnehmers weiter
    pub fn weiterleiten(&mut self, absender: &ParticipantKey, nachricht: SignalMessage) {
        let entscheidung = match self.raeume.get(&absender.raum) {
            Some(raum) if raum.mitglied(absender).is_some() => {
                router::entscheiden(raum, &absender.teilnehmer, nachricht)
            }
            _ => {
                tracing::debug!(
                    room_id = %absender.raum,
                    participant = %absender.teilnehmer,
                    kind = %nachricht.kind,
                    "Absender nicht registriert – Nachricht verworfen"
                );
                return;
            }
        };

        match entscheidung {
            Entscheidung::Weiterleiten { an, nachricht } => {
                let Some(rahmen) = self.kodieren(&nachricht) else {
                    return;
                };
                if let Some(empfaenger) = self.raeume.get(&absender.raum).and_then(|r| r.get(&an)) {
                    empfaenger.zustellen(rahmen, nachricht.kind.as_str(), &self.metriken);
                    tracing::trace!(
                        room_id = %absender.raum,
                        from = %absender.teilnehmer,
                        to = %an,
                        kind = %nachricht.kind,
                        "Nachricht weitergeleitet"
                    );
                }
            }
            Entscheidung::Abmelden => {
                self.abmelden(absender);
            }
            Entscheidung::Verwerfen(grund) => self.metriken.verworfen(grund),
        }
    }

    /// Momentaufnahme eines Raums
    pub fn raum_info(&self, raum_id: &RoomId) -> Option<RaumInfo> {
        self.raeume.get(raum_id).map(Room::info)
    }

    pub fn statistik(&self) -> HubStatistik {
        HubStatistik {
            raeume: self.raeume.len(),
            teilnehmer: self.raeume.values().map(Room::anzahl).sum(),
        }
    }

    #[cfg(test)]
    pub fn raum_existiert(&self, raum_id: &RoomId) -> bool {
        self.raeume.contains_key(raum_id)
    }

    /// Mitglieder eines Raums (leer wenn der Raum nicht existiert)
    #[cfg(test)]
    pub fn mitglieder(&self, raum_id: &RoomId) -> Vec<ParticipantId> {
        self.raeume
            .get(raum_id)
            .map(Room::teilnehmer_ids)
            .unwrap_or_default()
    }

    fn an_raum_senden(
        &self,
        raum_id: &RoomId,
        ausser: Option<&ParticipantId>,
        nachricht: &SignalMessage,
    ) -> usize {
        let Some(raum) = self.raeume.get(raum_id) else {
            return 0;
        };
        let Some(rahmen) = self.kodieren(nachricht) else {
            return 0;
        };
        raum.an_alle_ausser(ausser, &rahmen, nachricht.kind.as_str(), &self.metriken)
    }

    fn kodieren(&self, nachricht: &SignalMessage) -> Option<String> {
        match self.codec.kodieren(nachricht) {
            Ok(rahmen) => Some(rahmen),
            Err(e) => {
                tracing::error!(fehler = %e, kind = %nachricht.kind, "Kodieren fehlgeschlagen");
                self.metriken.verworfen(DropGrund::Fehlerhaft);
                None
            }
        }
    }

    fn metriken_aktualisieren(&self) {
        let statistik = self.statistik();
        self.metriken.rooms_active.set(statistik.raeume as i64);
        self.metriken
            .participants_connected
            .set(statistik.teilnehmer as i64);
    }
}

// ---------------------------------------------------------------------------
// HubHandle
// ---------------------------------------------------------------------------

/// Handle auf die Kontrollschleife (Clone teilt die Befehls-Queue)
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubBefehl>,
}

impl HubHandle {
    /// Registriert einen Teilnehmer und wartet auf die Bestaetigung
    ///
    /// Nach Ablauf von `timeout` gibt die Methode `Timeout` zurueck. Der
    /// Befehl kann dann trotzdem noch ausgefuehrt werden; der Aufrufer muss
    /// in diesem Fall `abmelden` senden.
    pub async fn registrieren(
        &self,
        teilnehmer: Teilnehmer,
        timeout: Duration,
    ) -> SignalingResult<()> {
        let (bestaetigung, rx) = oneshot::channel();
        let anfrage = async {
            self.tx
                .send(HubBefehl::Registrieren {
                    teilnehmer,
                    bestaetigung,
                })
                .await
                .map_err(|_| SignalingError::HubNichtErreichbar)?;
            rx.await.map_err(|_| SignalingError::HubNichtErreichbar)
        };

        tokio::time::timeout(timeout, anfrage)
            .await
            .map_err(|_| SignalingError::Timeout(timeout))?
    }

    /// Meldet einen Teilnehmer ab (idempotent)
    ///
    /// Laeuft der Hub nicht mehr, gibt es nichts abzumelden.
    pub async fn abmelden(&self, schluessel: ParticipantKey) {
        let _ = self.tx.send(HubBefehl::Abmelden { schluessel }).await;
    }

    /// Uebergibt eine eingehende Nachricht an den Router
    pub async fn weiterleiten(
        &self,
        absender: ParticipantKey,
        nachricht: SignalMessage,
    ) -> SignalingResult<()> {
        self.tx
            .send(HubBefehl::Weiterleiten {
                absender,
                nachricht,
            })
            .await
            .map_err(|_| SignalingError::HubNichtErreichbar)
    }

    /// Momentaufnahme eines Raums (`None` wenn er nicht existiert)
    pub async fn raum_info(&self, raum_id: RoomId) -> SignalingResult<Option<RaumInfo>> {
        let (antwort, rx) = oneshot::channel();
        self.tx
            .send(HubBefehl::RaumInfo { raum_id, antwort })
            .await
            .map_err(|_| SignalingError::HubNichtErreichbar)?;
        rx.await.map_err(|_| SignalingError::HubNichtErreichbar)
    }

    pub async fn statistik(&self) -> SignalingResult<HubStatistik> {
        let (antwort, rx) = oneshot::channel();
        self.tx
            .send(HubBefehl::Statistik { antwort })
            .await
            .map_err(|_| SignalingError::HubNichtErreichbar)?;
        rx.await.map_err(|_| SignalingError::HubNichtErreichbar)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
