//! Message-Router – Entscheidet ueber die Zustellung einer Nachricht
//!
//! Der Router ist eine reine Funktion ueber dem Raum des Absenders. Er
//! veraendert keinen Zustand; die Entscheidung fuehrt der Hub innerhalb
//! derselben Kontrollschleifen-Iteration aus.
//!
//! | Typ                            | Entscheidung                          |
//! |--------------------------------|---------------------------------------|
//! | offer, answer, ice-candidate   | an `to` im selben Raum                |
//! | leave                          | Absender abmelden                     |
//! | join, user-joined, user-left   | verwerfen (nur serverseitig erzeugt)  |
//! | unbekannt                      | verwerfen                             |

use treffpunkt_core::ParticipantId;
use treffpunkt_observability::DropGrund;
use treffpunkt_protocol::{MessageKind, SignalMessage};

use crate::room::Room;

/// Ergebnis der Routing-Entscheidung
#[derive(Debug)]
pub enum Entscheidung {
    /// Nachricht (mit gesetztem `from`) an genau einen Empfaenger
    Weiterleiten {
        an: ParticipantId,
        nachricht: SignalMessage,
    },
    /// Absender verlaesst den Raum
    Abmelden,
    /// Nachricht wird verworfen
    Verwerfen(DropGrund),
}

/// Bestimmt die Zustellung einer Nachricht aus dem Raum `raum`
pub fn entscheiden(raum: &Room, absender: &ParticipantId, nachricht: SignalMessage) -> Entscheidung {
    let nachricht = nachricht.mit_absender(absender.clone());

    match nachricht.kind {
        MessageKind::Offer | MessageKind::Answer | MessageKind::IceCandidate => {
            let an = match nachricht.empfaenger() {
                Some(an) => an.clone(),
                None => {
                    tracing::warn!(
                        room_id = %raum.id,
                        participant = %absender,
                        kind = %nachricht.kind,
                        "Nachricht ohne 'to' verworfen"
                    );
                    return Entscheidung::Verwerfen(DropGrund::EmpfaengerFehlt);
                }
            };

            if raum.get(&an).is_none() {
                // Normalfall wenn der Peer gerade gegangen ist
                tracing::debug!(
                    room_id = %raum.id,
                    participant = %absender,
                    to = %an,
                    kind = %nachricht.kind,
                    "Empfaenger nicht im Raum – Nachricht verworfen"
                );
                return Entscheidung::Verwerfen(DropGrund::EmpfaengerUnbekannt);
            }

            Entscheidung::Weiterleiten { an, nachricht }
        }

        MessageKind::Leave => Entscheidung::Abmelden,

        MessageKind::Join
        | MessageKind::UserJoined
        | MessageKind::UserLeft
        | MessageKind::Unbekannt(_) => {
            tracing::warn!(
                room_id = %raum.id,
                participant = %absender,
                kind = %nachricht.kind,
                "Unerwarteter Nachrichtentyp verworfen"
            );
            Entscheidung::Verwerfen(DropGrund::UnbekannterTyp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::Teilnehmer;
    use tokio::sync::mpsc;
    use treffpunkt_core::UserId;

    fn raum_mit(ids: &[&str]) -> (Room, Vec<mpsc::Receiver<String>>) {
        let mut raum = Room::neu("r1".into());
        let mut empfaenger = Vec::new();
        for id in ids {
            let (t, rx) = Teilnehmer::neu((*id).into(), UserId(1), "r1".into(), 8);
            raum.einfuegen(t);
            empfaenger.push(rx);
        }
        (raum, empfaenger)
    }

    fn nachricht(json: &str) -> SignalMessage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn offer_wird_an_empfaenger_geleitet() {
        let (raum, _rx) = raum_mit(&["alice", "bob"]);
        let msg = nachricht(r#"{"type":"offer","from":"mallory","to":"bob","data":{"sdp":"X"}}"#);

        match entscheiden(&raum, &"alice".into(), msg) {
            Entscheidung::Weiterleiten { an, nachricht } => {
                assert_eq!(an.as_str(), "bob");
                // Absender wird immer vom Server gesetzt
                assert_eq!(nachricht.from.as_ref().map(|f| f.as_str()), Some("alice"));
                assert_eq!(nachricht.data_roh(), Some(r#"{"sdp":"X"}"#));
            }
            anderes => panic!("Weiterleiten erwartet, war: {anderes:?}"),
        }
    }

    #[test]
    fn fehlender_empfaenger() {
        let (raum, _rx) = raum_mit(&["alice", "bob"]);
        for json in [
            r#"{"type":"ice-candidate","data":{}}"#,
            r#"{"type":"answer","to":""}"#,
        ] {
            assert!(matches!(
                entscheiden(&raum, &"alice".into(), nachricht(json)),
                Entscheidung::Verwerfen(DropGrund::EmpfaengerFehlt)
            ));
        }
    }

    #[test]
    fn empfaenger_nicht_im_raum() {
        let (raum, _rx) = raum_mit(&["alice"]);
        let msg = nachricht(r#"{"type":"offer","to":"bob"}"#);
        assert!(matches!(
            entscheiden(&raum, &"alice".into(), msg),
            Entscheidung::Verwerfen(DropGrund::EmpfaengerUnbekannt)
        ));
    }

    #[test]
    fn leave_meldet_absender_ab() {
        let (raum, _rx) = raum_mit(&["alice", "bob"]);
        let msg = nachricht(r#"{"type":"leave","to":"bob"}"#);
        assert!(matches!(
            entscheiden(&raum, &"alice".into(), msg),
            Entscheidung::Abmelden
        ));
    }

    #[test]
    fn serverseitige_und_unbekannte_typen_werden_verworfen() {
        let (raum, _rx) = raum_mit(&["alice", "bob"]);
        for json in [
            r#"{"type":"join"}"#,
            r#"{"type":"user-joined","to":"bob"}"#,
            r#"{"type":"user-left"}"#,
            r#"{"type":"chat","to":"bob"}"#,
        ] {
            assert!(matches!(
                entscheiden(&raum, &"alice".into(), nachricht(json)),
                Entscheidung::Verwerfen(DropGrund::UnbekannterTyp)
            ));
        }
    }
}
