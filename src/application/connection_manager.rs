// Connection manager - connect, subscribe, fixed-delay reconnect until stopped

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::transport::{
    BrokerAddress, ROBOT_SENSOR_TOPIC, ROBOT_STATE_TOPIC, SUBSCRIBED_TOPICS, TransportConnector,
    TransportEvent, TransportSession,
};
use crate::domain::robot::RobotStatePatch;
use crate::domain::sensor::SensorData;
use crate::infrastructure::telemetry_codec::{decode_robot_state, decode_sensor_data};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    Reconnecting,
}

type RobotStateSink = Box<dyn Fn(RobotStatePatch) + Send + Sync>;
type SensorDataSink = Box<dyn Fn(SensorData) + Send + Sync>;

/// Callbacks receiving decoded telemetry.
pub struct TelemetrySinks {
    on_robot_state: RobotStateSink,
    on_sensor_data: SensorDataSink,
}

impl TelemetrySinks {
    pub fn new<R, S>(on_robot_state: R, on_sensor_data: S) -> Self
    where
        R: Fn(RobotStatePatch) + Send + Sync + 'static,
        S: Fn(SensorData) + Send + Sync + 'static,
    {
        Self {
            on_robot_state: Box::new(on_robot_state),
            on_sensor_data: Box::new(on_sensor_data),
        }
    }

    pub fn robot_state(&self, patch: RobotStatePatch) {
        (self.on_robot_state)(patch)
    }

    pub fn sensor_data(&self, data: SensorData) {
        (self.on_sensor_data)(data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Stopped,
    Lost,
}

pub struct ConnectionManager {
    connector: Arc<dyn TransportConnector>,
    address: BrokerAddress,
    sinks: TelemetrySinks,
    reconnect_delay: Duration,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        address: BrokerAddress,
        sinks: TelemetrySinks,
        reconnect_delay: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            address,
            sinks,
            reconnect_delay,
            state,
        }
    }

    pub fn start(self) -> ConnectionHandle {
        let cancel = CancellationToken::new();
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run(cancel.clone()));

        ConnectionHandle {
            cancel,
            task,
            state,
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "Connection state changed");
        }
    }

    async fn run(self, cancel: CancellationToken) {
        info!(address = %self.address, "Connection manager starting");

        loop {
            self.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.connector.connect(&self.address) => result,
            };

            match connected {
                Ok(mut session) => {
                    let end = self.drive(session.as_mut(), &cancel).await;
                    session.close().await;
                    if end == SessionEnd::Stopped {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Broker connection failed");
                }
            }

            self.set_state(ConnectionState::Reconnecting);
            info!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "Connection lost, reconnecting after delay"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!("Connection manager stopped");
    }

    async fn drive(
        &self,
        session: &mut dyn TransportSession,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let mut subscribed = false;

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return SessionEnd::Stopped,
                event = session.next_event() => event,
            };

            match event {
                TransportEvent::Connected => {
                    // a fresh connection carries no subscriptions
                    for topic in SUBSCRIBED_TOPICS {
                        if let Err(e) = session.subscribe(topic).await {
                            warn!(error = %e, "Subscription failed");
                            return SessionEnd::Lost;
                        }
                    }
                    subscribed = true;
                    self.set_state(ConnectionState::Subscribed);
                    info!(topics = ?SUBSCRIBED_TOPICS, "Connected and subscribed");
                }
                TransportEvent::Message { topic, payload } => {
                    if !subscribed {
                        debug!(topic = %topic, "Dropping message received before subscribing");
                        continue;
                    }
                    self.dispatch(&topic, &payload);
                }
                TransportEvent::Disconnected => {
                    info!("Broker closed the connection");
                    return SessionEnd::Lost;
                }
                TransportEvent::Error(e) => {
                    warn!(error = %e, "Transport error");
                    return SessionEnd::Lost;
                }
            }
        }
    }

    fn dispatch(&self, topic: &str, payload: &[u8]) {
        match topic {
            ROBOT_STATE_TOPIC => match decode_robot_state(payload) {
                Ok(patch) => self.sinks.robot_state(patch),
                Err(e) => warn!(error = %e, "Dropping malformed telemetry"),
            },
            ROBOT_SENSOR_TOPIC => match decode_sensor_data(payload, Utc::now()) {
                Ok(data) => self.sinks.sensor_data(data),
                Err(e) => warn!(error = %e, "Dropping malformed telemetry"),
            },
            other => debug!(topic = other, "Ignoring message on unexpected topic"),
        }
    }
}

pub struct ConnectionHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Closes the session and cancels any pending reconnect. No sink is
    /// invoked after this returns.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Connection manager task failed");
        }
    }
}
