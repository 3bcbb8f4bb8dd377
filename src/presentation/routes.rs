// Router assembly
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_alarms, get_command_log, get_connection, get_robot, get_sensor, get_snapshot,
    get_temperature, handle_alarm, health_check, invoke_command, navigate, raise_alarm,
    stream_snapshots,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/robot", get(get_robot))
        .route("/api/sensor", get(get_sensor))
        .route("/api/alarms", get(get_alarms).post(raise_alarm))
        .route("/api/alarms/:id/handle", post(handle_alarm))
        .route("/api/temperature", get(get_temperature))
        .route("/api/commands/log", get(get_command_log))
        .route("/api/commands/:command", post(invoke_command))
        .route("/api/navigate", post(navigate))
        .route("/api/connection", get(get_connection))
        .route("/api/stream", get(stream_snapshots))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::connection_manager::ConnectionState;
    use crate::application::operator::{OperatorConsole, DEFAULT_ROUND_TRIP};
    use crate::application::store::{StoreActor, StoreHandle};
    use crate::domain::robot::{RobotMode, RobotStatePatch};
    use crate::domain::state_store::StateStore;
    use crate::domain::temperature::TemperatureHistory;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tokio::sync::watch;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        store: StoreHandle,
        _connection: watch::Sender<ConnectionState>,
    }

    fn harness() -> Harness {
        let (store, _task) = StoreActor::spawn(StateStore::new(TemperatureHistory::seeded_diurnal(24), 50));
        let (connection_tx, connection) = watch::channel(ConnectionState::Subscribed);
        let state = Arc::new(AppState {
            store: store.clone(),
            console: OperatorConsole::new(store.clone(), DEFAULT_ROUND_TRIP),
            connection,
        });

        Harness {
            router: build_router(state),
            store,
            _connection: connection_tx,
        }
    }

    async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn send_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health_check() {
        let h = harness();
        let response = h
            .router
            .clone()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_snapshot_reports_initial_state() {
        let h = harness();
        let (status, body) = send(&h.router, "GET", "/api/snapshot").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["robot"]["mode"], "inspecting");
        assert_eq!(body["robot"]["task"]["remainingTime"], 400);
        assert_eq!(body["unhandledAlarms"], 0);
        assert_eq!(body["temperature"]["samples"].as_array().unwrap().len(), 24);

        let (_, body) = send(&h.router, "GET", "/api/connection").await;
        assert_eq!(body["state"], "subscribed");
    }

    #[tokio::test]
    async fn test_immediate_command_then_conflict() {
        let h = harness();

        let (status, body) = send(&h.router, "POST", "/api/commands/pause").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "paused");

        let (status, body) = send(&h.router, "POST", "/api/commands/pause").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["reason"], "not_permitted");
        assert_eq!(body["mode"], "paused");

        let (status, body) = send(&h.router, "GET", "/api/commands/log").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert!(body["inFlight"].is_null());
    }

    #[tokio::test]
    async fn test_round_trip_command_accepted() {
        let h = harness();
        let (status, body) = send(&h.router, "POST", "/api/commands/emergency-stop").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["command"], "emergency-stop");
        assert_eq!(body["pending"], true);

        let (status, body) = send(&h.router, "POST", "/api/commands/pause").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["reason"], "in_flight");
    }

    #[tokio::test]
    async fn test_unknown_command_is_not_found() {
        let h = harness();
        let (status, body) = send(&h.router, "POST", "/api/commands/self-destruct").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("self-destruct"));
    }

    #[tokio::test]
    async fn test_handle_alarm_is_idempotent() {
        let h = harness();
        send(&h.router, "POST", "/api/commands/pause").await;

        let snapshot = h.store.snapshot().await.unwrap();
        let id = snapshot.alarms[0].id;
        assert_eq!(snapshot.unhandled_alarms, 1);

        let uri = format!("/api/alarms/{}/handle", id);
        let (status, _) = send(&h.router, "POST", &uri).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&h.router, "POST", &uri).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let snapshot = h.store.snapshot().await.unwrap();
        assert_eq!(snapshot.unhandled_alarms, 0);

        let (status, _) = send(&h.router, "POST", "/api/alarms/999/handle").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_raise_sensor_alarm() {
        let h = harness();
        let (status, _) = send_json(
            &h.router,
            "/api/alarms",
            serde_json::json!({"level": "warning", "message": "Noise above 60 dB", "sensor": "noise"}),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let snapshot = h.store.snapshot().await.unwrap();
        assert_eq!(snapshot.alarms[0].message, "Noise above 60 dB");
        assert_eq!(snapshot.alarms[0].sensor.as_deref(), Some("noise"));
        assert_eq!(snapshot.unhandled_alarms, 1);

        let (status, _) = send_json(
            &h.router,
            "/api/alarms",
            serde_json::json!({"level": "info", "message": "  "}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_navigate_then_blocked_in_emergency() {
        let h = harness();
        let (status, body) = send_json(
            &h.router,
            "/api/navigate",
            serde_json::json!({"area": "Cabinet Zone 3"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"]["name"], "Navigate to Cabinet Zone 3");
        assert_eq!(body["task"]["progress"], 0.0);

        h.store
            .merge_robot_state(RobotStatePatch::default().with_mode(RobotMode::Emergency))
            .unwrap();
        let (status, body) = send_json(
            &h.router,
            "/api/navigate",
            serde_json::json!({"area": "Cabinet Zone 1"}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["reason"], "navigation_blocked");

        let (status, _) = send_json(&h.router, "/api/navigate", serde_json::json!({"area": ""})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stream_is_event_stream() {
        let h = harness();
        let response = h
            .router
            .clone()
            .oneshot(Request::get("/api/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
    }
}
