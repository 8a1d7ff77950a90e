//! WebSocket-Upgrade fuer Signaling-Verbindungen
//!
//! Die Identitaet (`UserId`) muss vor dem Upgrade feststehen. Die
//! Teilnehmer-ID wird daraus abgeleitet, nie aus Client-Daten.

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::Response;
use treffpunkt_core::{ParticipantId, RoomId, UserId};

use crate::connection::ClientConnection;
use crate::server_state::SignalingState;

/// Nimmt eine Verbindung an und startet deren Verarbeitung nach dem Upgrade
pub fn verbindung_annehmen(
    ws: WebSocketUpgrade,
    state: SignalingState,
    raum_id: RoomId,
    user_id: UserId,
) -> Response {
    let max = state.config.max_frame_bytes;
    let teilnehmer_id = ParticipantId::fuer_user(user_id);

    tracing::debug!(
        room_id = %raum_id,
        participant = %teilnehmer_id,
        "WebSocket-Upgrade angefordert"
    );

    ws.max_message_size(max)
        .max_frame_size(max)
        .on_failed_upgrade(|fehler| {
            tracing::warn!(fehler = %fehler, "WebSocket-Upgrade fehlgeschlagen");
        })
        .on_upgrade(move |socket: WebSocket| async move {
            state.metriken.connections_total.inc();
            let verbindung = ClientConnection::neu(state, raum_id, teilnehmer_id, user_id);
            verbindung.verarbeiten(socket).await;
        })
}
