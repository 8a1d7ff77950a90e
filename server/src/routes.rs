//! HTTP-Routen des Servers
//!
//! ```text
//! GET /ws/signaling/:room_id   WebSocket-Upgrade (Identitaet aus Header)
//! GET /v1/rooms/:room_id       Momentaufnahme eines Raums
//! GET /health                  Health-Check (wenn Observability aktiv)
//! GET /metrics                 Prometheus (wenn Observability aktiv)
//! ```

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use treffpunkt_core::{RoomId, UserId};
use treffpunkt_observability::{
    health_router, metrics_router, request_timing_layer, timing_middleware, HealthState,
};
use treffpunkt_signaling::{verbindung_annehmen, SignalingState};

use crate::config::ServerConfig;

/// Zustand der Anwendungs-Routen
#[derive(Clone)]
pub struct AppState {
    pub signaling: SignalingState,
    /// Header mit der Benutzer-ID
    pub user_header: Arc<str>,
}

/// Baut den vollstaendigen Router inklusive Layern
pub fn app(config: &ServerConfig, signaling: SignalingState, health: HealthState) -> Router {
    let metriken = signaling.metriken.clone();
    let state = AppState {
        signaling,
        user_header: Arc::from(config.identitaet.user_header.as_str()),
    };

    let mut router = Router::new()
        .route("/ws/signaling/:room_id", get(signaling_verbinden))
        .route("/v1/rooms/:room_id", get(raum_abfragen))
        .with_state(state);

    if config.observability.aktiviert {
        router = router
            .merge(health_router(health))
            .merge(metrics_router(metriken.clone()));
    }

    router
        .layer(middleware::from_fn_with_state(metriken, timing_middleware))
        .layer(request_timing_layer())
        .layer(cors_layer(&config.netzwerk.cors_origins))
}

/// CORS konfigurieren: entweder spezifische Origins oder Any
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

/// Liest die Benutzer-ID aus dem Identitaets-Header
pub fn user_aus_headers(headers: &HeaderMap, header: &str) -> Result<UserId, Response> {
    let wert = headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| fehler(StatusCode::UNAUTHORIZED, "Identitaets-Header fehlt"))?;

    wert.trim()
        .parse::<i64>()
        .map(UserId)
        .map_err(|_| fehler(StatusCode::UNAUTHORIZED, "Ungueltige Benutzer-ID"))
}

fn fehler(status: StatusCode, nachricht: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": status.as_u16(), "message": nachricht } })),
    )
        .into_response()
}

/// GET /ws/signaling/:room_id
///
/// Die Identitaet wird vor dem Upgrade geprueft; ohne gueltigen Header gibt
/// es kein Upgrade.
async fn signaling_verbinden(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let user_id = match user_aus_headers(&headers, &state.user_header) {
        Ok(u) => u,
        Err(r) => {
            tracing::debug!(room_id = %room_id, "Signaling-Anfrage ohne gueltige Identitaet");
            return r;
        }
    };
    let Some(ws) = ws else {
        return fehler(StatusCode::BAD_REQUEST, "WebSocket-Upgrade erwartet");
    };
    verbindung_annehmen(ws, state.signaling, RoomId::neu(room_id), user_id)
}

/// GET /v1/rooms/:room_id
async fn raum_abfragen(State(state): State<AppState>, Path(room_id): Path<String>) -> Response {
    match state.signaling.hub.raum_info(RoomId::neu(room_id)).await {
        Ok(Some(info)) => (StatusCode::OK, Json(info)).into_response(),
        Ok(None) => fehler(StatusCode::NOT_FOUND, "Raum nicht gefunden"),
        Err(e) => {
            tracing::error!(fehler = %e, "Raum-Abfrage fehlgeschlagen");
            fehler(StatusCode::SERVICE_UNAVAILABLE, "Signaling-Hub nicht verfuegbar")
        }
    }
}
