//! HTTP-Routen ohne Listener (tower::ServiceExt::oneshot)

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;
use tower::ServiceExt;
use treffpunkt_core::UserId;
use treffpunkt_observability::{HealthState, TreffpunktMetrics};
use treffpunkt_server::{config::ServerConfig, routes};
use treffpunkt_signaling::{SignalingState, Teilnehmer};

struct TestApp {
    router: Router,
    state: SignalingState,
    health: HealthState,
    _shutdown: watch::Sender<bool>,
}

fn app(config: ServerConfig) -> TestApp {
    let metriken = TreffpunktMetrics::neu().unwrap();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (state, _hub) = SignalingState::starten(config.signaling_config(), metriken.clone(), shutdown_rx);
    let health = HealthState::neu(metriken);
    let router = routes::app(&config, state.clone(), health.clone());
    TestApp {
        router,
        state,
        health,
        _shutdown: shutdown,
    }
}

async fn get(router: &Router, pfad: &str, user: Option<&str>) -> (StatusCode, String) {
    let mut anfrage = Request::builder().uri(pfad);
    if let Some(user) = user {
        anfrage = anfrage.header("x-user-id", user);
    }
    let antwort = router
        .clone()
        .oneshot(anfrage.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = antwort.status();
    let body = to_bytes(antwort.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn unbekannter_raum_ist_404() {
    let app = app(ServerConfig::default());
    let (status, body) = get(&app.router, "/v1/rooms/gibt-es-nicht", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"]["code"], 404);
}

#[tokio::test]
async fn raum_momentaufnahme() {
    let app = app(ServerConfig::default());
    let (teilnehmer, _rx) = Teilnehmer::neu("user-7".into(), UserId(7), "r1".into(), 8);
    app.state
        .hub
        .registrieren(teilnehmer, Duration::from_secs(1))
        .await
        .unwrap();

    let (status, body) = get(&app.router, "/v1/rooms/r1", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["room_id"], "r1");
    assert_eq!(json["participants_count"], 1);
    assert_eq!(json["participants"][0]["participant_id"], "user-7");
    assert_eq!(json["participants"][0]["user_id"], 7);
}

#[tokio::test]
async fn signaling_ohne_identitaet_ist_401() {
    let app = app(ServerConfig::default());
    let (status, _) = get(&app.router, "/ws/signaling/r1", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(&app.router, "/ws/signaling/r1", Some("kein-int")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signaling_ohne_upgrade_ist_400() {
    let app = app(ServerConfig::default());
    let (status, _) = get(&app.router, "/ws/signaling/r1", Some("1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn eigener_identitaets_header() {
    let mut config = ServerConfig::default();
    config.identitaet.user_header = "x-auth-user".into();
    let app = app(config);

    // Der Standard-Header zaehlt dann nicht mehr
    let (status, _) = get(&app.router, "/ws/signaling/r1", Some("1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_und_metrics() {
    let app = app(ServerConfig::default());

    let (status, body) = get(&app.router, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["hub_running"], true);

    let (status, body) = get(&app.router, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("treffpunkt_rooms_active"));
    // Die vorherige Anfrage wurde mit ihrem Routen-Muster gezaehlt
    assert!(body.contains(r#"path="/health""#));

    app.health.hub_status_setzen(false);
    let (status, _) = get(&app.router, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn observability_abschaltbar() {
    let mut config = ServerConfig::default();
    config.observability.aktiviert = false;
    let app = app(config);

    let (status, _) = get(&app.router, "/health", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app.router, "/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
