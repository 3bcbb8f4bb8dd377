// HTTP request handlers
use crate::application::connection_manager::ConnectionState;
use crate::domain::alarm::{Alarm, AlarmId, AlarmLevel, NewAlarm};
use crate::domain::command::{Command, CommandLogEntry, CommandRejected};
use crate::domain::sensor::{SensorData, SensorLevels};
use crate::infrastructure::snapshot_stream::stream_from_watch;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Serialize)]
struct SensorBody<'a> {
    data: &'a SensorData,
    levels: SensorLevels,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlarmsBody<'a> {
    alarms: &'a [Alarm],
    unhandled: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandLogBody<'a> {
    in_flight: Option<Command>,
    entries: &'a [CommandLogEntry],
}

#[derive(Serialize)]
struct ConnectionBody {
    state: ConnectionState,
}

#[derive(Serialize)]
struct PendingBody {
    command: Command,
    pending: bool,
}

#[derive(Deserialize)]
pub struct RaiseAlarmRequest {
    pub level: AlarmLevel,
    pub message: String,
    #[serde(default)]
    pub handled: bool,
    #[serde(default)]
    pub sensor: Option<String>,
}

#[derive(Deserialize)]
pub struct NavigateRequest {
    pub area: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.store.current();
    Json(&*snapshot).into_response()
}

pub async fn get_robot(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.store.current();
    Json(&snapshot.robot).into_response()
}

pub async fn get_sensor(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.store.current();
    Json(SensorBody {
        data: &snapshot.sensor,
        levels: snapshot.sensor_levels,
    })
    .into_response()
}

pub async fn get_alarms(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.store.current();
    Json(AlarmsBody {
        alarms: &snapshot.alarms,
        unhandled: snapshot.unhandled_alarms,
    })
    .into_response()
}

pub async fn get_temperature(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.store.current();
    Json(&snapshot.temperature).into_response()
}

pub async fn get_command_log(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.store.current();
    Json(CommandLogBody {
        in_flight: state.console.in_flight(),
        entries: &snapshot.command_log,
    })
    .into_response()
}

pub async fn get_connection(State(state): State<Arc<AppState>>) -> Response {
    let current = *state.connection.borrow();
    Json(ConnectionBody { state: current }).into_response()
}

/// Raise an alarm from an external monitor.
pub async fn raise_alarm(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RaiseAlarmRequest>,
) -> Response {
    if request.message.trim().is_empty() {
        return bad_request("alarm message must not be empty");
    }

    let mut alarm = NewAlarm::new(request.level, request.message);
    if request.handled {
        alarm = alarm.handled();
    }
    if let Some(sensor) = request.sensor {
        alarm = alarm.from_sensor(sensor);
    }

    match state.store.add_alarm(alarm) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            warn!(error = %e, "Cannot raise alarm");
            unavailable(e.to_string())
        }
    }
}

/// Mark an alarm handled. Unknown and already handled ids still return 204.
pub async fn handle_alarm(Path(id): Path<u64>, State(state): State<Arc<AppState>>) -> Response {
    match state.store.handle_alarm(AlarmId(id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(alarm_id = id, error = %e, "Cannot handle alarm");
            unavailable(e.to_string())
        }
    }
}

/// Immediate commands answer 200 with their outcome, round-trip commands 202.
pub async fn invoke_command(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let command: Command = match name.parse() {
        Ok(command) => command,
        Err(e) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    error: format!("{}", e),
                }),
            )
                .into_response();
        }
    };

    let ticket = match state.console.invoke(command).await {
        Ok(ticket) => ticket,
        Err(rejected) => return rejection(rejected),
    };

    if ticket.round_trip {
        return (
            StatusCode::ACCEPTED,
            Json(PendingBody {
                command,
                pending: true,
            }),
        )
            .into_response();
    }

    match ticket.outcome().await {
        Ok(outcome) => {
            info!(command = %command, mode = %outcome.mode, "Command committed");
            Json(outcome).into_response()
        }
        Err(rejected) => rejection(rejected),
    }
}

pub async fn navigate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NavigateRequest>,
) -> Response {
    let area = request.area.trim();
    if area.is_empty() {
        return bad_request("navigation area must not be empty");
    }

    match state.console.navigate(area).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(rejected) => rejection(rejected),
    }
}

/// Server-sent events: `snapshot` on every store change, `connection` on
/// every transport state change.
pub async fn stream_snapshots(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    stream_from_watch(state.store.watch(), state.connection.clone())
}

fn rejection(rejected: CommandRejected) -> Response {
    match rejected {
        CommandRejected::StoreUnavailable | CommandRejected::ShuttingDown => {
            unavailable(rejected.to_string())
        }
        other => {
            info!(reason = %other, "Command rejected");
            (StatusCode::CONFLICT, Json(other)).into_response()
        }
    }
}

fn bad_request(error: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn unavailable(error: String) -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorBody { error })).into_response()
}
