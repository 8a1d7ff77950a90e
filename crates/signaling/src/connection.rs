//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung laeuft in einem eigenen tokio-Task. Nach der Registrierung
//! beim Hub arbeiten zwei Pumpen nebeneinander:
//!
//! - Lese-Pumpe: Socket -> Codec -> `from` setzen -> Hub
//! - Schreib-Pumpe: Mailbox -> Socket, dazu Keepalive-Pings
//!
//! Endet eine der beiden, endet die Verbindung. Die Abmeldung beim Hub
//! erfolgt danach genau einmal.
//!
//! ## State Machine
//! ```text
//! Verbindend -> Offen -> Schliessend -> Geschlossen
//!     |                                    ^
//!     +---- Registrierung fehlgeschlagen --+
//! ```

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use tokio::sync::mpsc;
use tokio::time::Instant;
use treffpunkt_core::{ParticipantId, RoomId, UserId};
use treffpunkt_observability::DropGrund;
use treffpunkt_protocol::WireError;

use crate::error::SignalingError;
use crate::participant::{ParticipantKey, Teilnehmer};
use crate::server_state::SignalingState;

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand der WebSocket-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Upgrade abgeschlossen, Registrierung laeuft
    Verbindend,
    /// Beim Hub registriert, Pumpen laufen
    Offen,
    /// Eine Pumpe ist beendet, Abmeldung laeuft
    Schliessend,
    /// Abgemeldet, Socket geschlossen
    Geschlossen,
}

/// Grund fuer das Ende einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endgrund {
    /// Client hat einen Close-Frame gesendet oder den Stream beendet
    ClientGeschlossen,
    /// Innerhalb des Idle-Timeouts kam kein Frame
    Leerlauf,
    /// Transportfehler beim Lesen
    Lesefehler,
    /// Transportfehler beim Schreiben
    Sendefehler,
    /// Mailbox wurde vom Hub geschlossen (ersetzt, `leave` oder Shutdown)
    MailboxGeschlossen,
    /// Hub nimmt keine Befehle mehr an
    HubBeendet,
    /// Registrierung wurde abgelehnt oder nicht rechtzeitig bestaetigt
    RegistrierungFehlgeschlagen,
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: SignalingState,
    raum_id: RoomId,
    teilnehmer_id: ParticipantId,
    user_id: UserId,
    zustand: VerbindungsZustand,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection (noch nicht registriert)
    pub fn neu(
        state: SignalingState,
        raum_id: RoomId,
        teilnehmer_id: ParticipantId,
        user_id: UserId,
    ) -> Self {
        Self {
            state,
            raum_id,
            teilnehmer_id,
            user_id,
            zustand: VerbindungsZustand::Verbindend,
        }
    }

    pub fn zustand(&self) -> VerbindungsZustand {
        self.zustand
    }

    /// Startet die Verbindungs-Verarbeitung
    ///
    /// Laeuft bis der Client trennt, der Hub die Mailbox schliesst oder ein
    /// Timeout greift. Gibt den Grund fuer das Ende zurueck.
    pub async fn verarbeiten<S, E>(mut self, mut socket: S) -> Endgrund
    where
        S: Stream<Item = Result<Message, E>> + Sink<Message> + Unpin + Send,
        <S as Sink<Message>>::Error: Display + Send,
        E: Display + Send,
    {
        let (teilnehmer, mut mailbox) = Teilnehmer::neu(
            self.teilnehmer_id.clone(),
            self.user_id,
            self.raum_id.clone(),
            self.state.config.mailbox_kapazitaet,
        );
        let schluessel = teilnehmer.schluessel();

        tracing::debug!(
            room_id = %self.raum_id,
            participant = %self.teilnehmer_id,
            connection = %schluessel.verbindung,
            "Neue Verbindung"
        );

        if let Err(e) = self
            .state
            .hub
            .registrieren(teilnehmer, self.state.config.register_timeout)
            .await
        {
            tracing::warn!(
                room_id = %self.raum_id,
                participant = %self.teilnehmer_id,
                fehler = %e,
                "Registrierung fehlgeschlagen"
            );
            if matches!(e, SignalingError::Timeout(_)) {
                // Der Befehl kann noch in der Queue liegen
                self.state.hub.abmelden(schluessel).await;
            }
            let _ = socket.send(Message::Close(None)).await;
            let _ = socket.close().await;
            self.zustand_setzen(VerbindungsZustand::Geschlossen);
            return Endgrund::RegistrierungFehlgeschlagen;
        }
        self.zustand_setzen(VerbindungsZustand::Offen);

        let (mut schreiben, mut lesen) = socket.split();

        let grund = tokio::select! {
            grund = self.lese_pumpe(&mut lesen, &schluessel) => grund,
            grund = self.schreib_pumpe(&mut schreiben, &mut mailbox) => grund,
        };

        self.zustand_setzen(VerbindungsZustand::Schliessend);
        self.state.hub.abmelden(schluessel).await;

        if !matches!(grund, Endgrund::MailboxGeschlossen | Endgrund::Sendefehler) {
            let _ = schreiben.send(Message::Close(None)).await;
        }
        let _ = schreiben.close().await;
        self.zustand_setzen(VerbindungsZustand::Geschlossen);

        tracing::info!(
            room_id = %self.raum_id,
            participant = %self.teilnehmer_id,
            grund = ?grund,
            "Verbindung beendet"
        );
        grund
    }

    /// Liest Frames vom Client und uebergibt sie dem Hub
    async fn lese_pumpe<R, E>(&self, lesen: &mut R, schluessel: &ParticipantKey) -> Endgrund
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let codec = self.state.codec();
        let idle_timeout = self.state.config.idle_timeout;

        loop {
            let frame = match tokio::time::timeout(idle_timeout, lesen.next()).await {
                Ok(frame) => frame,
                Err(_) => {
                    tracing::warn!(
                        participant = %self.teilnehmer_id,
                        timeout = ?idle_timeout,
                        "Verbindungs-Timeout"
                    );
                    return Endgrund::Leerlauf;
                }
            };

            match frame {
                Some(Ok(Message::Text(text))) => match codec.dekodieren(&text) {
                    Ok(nachricht) => {
                        let nachricht = nachricht.mit_absender(self.teilnehmer_id.clone());
                        tracing::trace!(
                            participant = %self.teilnehmer_id,
                            kind = %nachricht.kind,
                            "Nachricht empfangen"
                        );
                        if self
                            .state
                            .hub
                            .weiterleiten(schluessel.clone(), nachricht)
                            .await
                            .is_err()
                        {
                            return Endgrund::HubBeendet;
                        }
                    }
                    Err(e) => self.fehlerhaft_verwerfen(&e),
                },
                Some(Ok(Message::Binary(daten))) => {
                    tracing::warn!(
                        participant = %self.teilnehmer_id,
                        laenge = daten.len(),
                        "Binaer-Frame verworfen"
                    );
                    self.state.metriken.verworfen(DropGrund::Fehlerhaft);
                }
                // Pong beantwortet der WebSocket-Layer selbst
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(participant = %self.teilnehmer_id, "Verbindung vom Client getrennt");
                    return Endgrund::ClientGeschlossen;
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        participant = %self.teilnehmer_id,
                        fehler = %e,
                        "Frame-Lesefehler"
                    );
                    return Endgrund::Lesefehler;
                }
            }
        }
    }

    /// Schreibt Mailbox-Frames und Keepalive-Pings auf den Socket
    async fn schreib_pumpe<W>(&self, schreiben: &mut W, mailbox: &mut mpsc::Receiver<String>) -> Endgrund
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        // Intervall 0 schaltet den Keepalive ab
        let intervall = self.state.config.keepalive;
        let mut naechster_ping = Instant::now() + intervall;

        loop {
            tokio::select! {
                rahmen = mailbox.recv() => {
                    let Some(rahmen) = rahmen else {
                        tracing::debug!(participant = %self.teilnehmer_id, "Mailbox geschlossen");
                        let _ = schreiben.send(Message::Close(None)).await;
                        return Endgrund::MailboxGeschlossen;
                    };
                    if let Err(e) = schreiben.send(Message::Text(rahmen)).await {
                        tracing::warn!(
                            participant = %self.teilnehmer_id,
                            fehler = %e,
                            "Senden fehlgeschlagen"
                        );
                        return Endgrund::Sendefehler;
                    }
                }

                _ = tokio::time::sleep_until(naechster_ping), if !intervall.is_zero() => {
                    if let Err(e) = schreiben.send(Message::Ping(Vec::new())).await {
                        tracing::warn!(
                            participant = %self.teilnehmer_id,
                            fehler = %e,
                            "Ping-Senden fehlgeschlagen"
                        );
                        return Endgrund::Sendefehler;
                    }
                    naechster_ping = Instant::now() + intervall;
                }
            }
        }
    }

    fn fehlerhaft_verwerfen(&self, fehler: &WireError) {
        tracing::warn!(
            participant = %self.teilnehmer_id,
            fehler = %fehler,
            "Fehlerhafter Frame verworfen"
        );
        self.state.metriken.verworfen(DropGrund::Fehlerhaft);
    }

    fn zustand_setzen(&mut self, neu: VerbindungsZustand) {
        tracing::trace!(
            participant = %self.teilnehmer_id,
            alt = ?self.zustand,
            neu = ?neu,
            "Zustandswechsel"
        );
        self.zustand = neu;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
