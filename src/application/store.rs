// State store actor - single writer queue publishing immutable snapshots

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::connection_manager::TelemetrySinks;
use crate::domain::alarm::{AlarmId, NewAlarm};
use crate::domain::command::{Command, CommandOutcome, CommandRejected, NavigationOutcome};
use crate::domain::robot::{RobotState, RobotStatePatch};
use crate::domain::sensor::SensorData;
use crate::domain::state_store::{DashboardSnapshot, StateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("state store actor has stopped")]
    Closed,
}

pub type PatchFn = Box<dyn FnOnce(&RobotState) -> Option<RobotStatePatch> + Send>;

// ============================================================================
// Commands
// ============================================================================

pub enum StoreCommand {
    MergeRobotState(RobotStatePatch),
    /// Derive a patch from the state as it is when this command is applied.
    MergeRobotStateWith(PatchFn),
    ReplaceSensorData(SensorData),
    AddAlarm(NewAlarm),
    HandleAlarm(AlarmId),
    ApplyCommand {
        command: Command,
        response_tx: oneshot::Sender<Result<CommandOutcome, CommandRejected>>,
    },
    Navigate {
        area: String,
        response_tx: oneshot::Sender<Result<NavigationOutcome, CommandRejected>>,
    },
    Snapshot {
        response_tx: oneshot::Sender<Arc<DashboardSnapshot>>,
    },
}

// ============================================================================
// Handle
// ============================================================================

#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::UnboundedSender<StoreCommand>,
    snapshots: watch::Receiver<Arc<DashboardSnapshot>>,
}

impl StoreHandle {
    fn send(&self, cmd: StoreCommand) -> Result<(), StoreError> {
        self.tx.send(cmd).map_err(|_| StoreError::Closed)
    }

    pub fn merge_robot_state(&self, patch: RobotStatePatch) -> Result<(), StoreError> {
        self.send(StoreCommand::MergeRobotState(patch))
    }

    pub fn merge_robot_state_with<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&RobotState) -> Option<RobotStatePatch> + Send + 'static,
    {
        self.send(StoreCommand::MergeRobotStateWith(Box::new(f)))
    }

    pub fn replace_sensor_data(&self, data: SensorData) -> Result<(), StoreError> {
        self.send(StoreCommand::ReplaceSensorData(data))
    }

    pub fn add_alarm(&self, alarm: NewAlarm) -> Result<(), StoreError> {
        self.send(StoreCommand::AddAlarm(alarm))
    }

    /// Unknown or already handled ids are ignored.
    pub fn handle_alarm(&self, id: AlarmId) -> Result<(), StoreError> {
        self.send(StoreCommand::HandleAlarm(id))
    }

    /// Queue a command commit. Legality is checked again when it is applied.
    pub fn apply_command(
        &self,
        command: Command,
    ) -> Result<oneshot::Receiver<Result<CommandOutcome, CommandRejected>>, StoreError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(StoreCommand::ApplyCommand {
            command,
            response_tx,
        })?;
        Ok(response_rx)
    }

    pub fn navigate(
        &self,
        area: impl Into<String>,
    ) -> Result<oneshot::Receiver<Result<NavigationOutcome, CommandRejected>>, StoreError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(StoreCommand::Navigate {
            area: area.into(),
            response_tx,
        })?;
        Ok(response_rx)
    }

    /// Snapshot taken after every previously queued write has been applied.
    pub async fn snapshot(&self) -> Result<Arc<DashboardSnapshot>, StoreError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(StoreCommand::Snapshot { response_tx })?;
        response_rx.await.map_err(|_| StoreError::Closed)
    }

    /// Last published snapshot. Never blocks.
    pub fn current(&self) -> Arc<DashboardSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.snapshots.clone()
    }

    /// Sinks that route decoded transport telemetry into this store.
    pub fn telemetry_sinks(&self) -> TelemetrySinks {
        let state_store = self.clone();
        let sensor_store = self.clone();

        TelemetrySinks::new(
            move |patch| {
                if let Err(e) = state_store.merge_robot_state(patch) {
                    warn!(error = %e, "Dropping robot state update");
                }
            },
            move |data| {
                if let Err(e) = sensor_store.replace_sensor_data(data) {
                    warn!(error = %e, "Dropping sensor update");
                }
            },
        )
    }
}

// ============================================================================
// Actor
// ============================================================================

pub struct StoreActor {
    store: StateStore,
    rx: mpsc::UnboundedReceiver<StoreCommand>,
    snapshots: watch::Sender<Arc<DashboardSnapshot>>,
}

impl StoreActor {
    pub fn new(store: StateStore) -> (Self, StoreHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshots, snapshot_rx) = watch::channel(Arc::new(store.snapshot()));

        let actor = Self {
            store,
            rx,
            snapshots,
        };
        let handle = StoreHandle {
            tx,
            snapshots: snapshot_rx,
        };

        (actor, handle)
    }

    pub fn spawn(store: StateStore) -> (StoreHandle, JoinHandle<()>) {
        let (actor, handle) = Self::new(store);
        let task = tokio::spawn(actor.run());
        (handle, task)
    }

    /// Runs until every handle has been dropped.
    pub async fn run(mut self) {
        info!("StoreActor starting");

        while let Some(cmd) = self.rx.recv().await {
            if self.apply(cmd) {
                self.publish();
            }
        }

        info!("StoreActor stopped");
    }

    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(self.store.snapshot()));
    }

    /// Returns whether the store changed and has not been published yet.
    fn apply(&mut self, cmd: StoreCommand) -> bool {
        let now = Utc::now();

        match cmd {
            StoreCommand::MergeRobotState(patch) => {
                if patch.is_empty() {
                    return false;
                }
                self.store.merge_robot_state(patch);
                true
            }
            StoreCommand::MergeRobotStateWith(f) => match f(self.store.robot()) {
                Some(patch) if !patch.is_empty() => {
                    self.store.merge_robot_state(patch);
                    true
                }
                _ => false,
            },
            StoreCommand::ReplaceSensorData(data) => {
                self.store.replace_sensor_data(data);
                true
            }
            StoreCommand::AddAlarm(alarm) => {
                let id = self.store.add_alarm(alarm, now);
                debug!(alarm_id = %id, "Alarm raised");
                true
            }
            StoreCommand::HandleAlarm(id) => {
                let changed = self.store.handle_alarm(id);
                if !changed {
                    debug!(alarm_id = %id, "Alarm unknown or already handled");
                }
                changed
            }
            StoreCommand::ApplyCommand {
                command,
                response_tx,
            } => {
                let result = self.store.apply_command(command, now);
                match &result {
                    Ok(outcome) => {
                        info!(command = %command, mode = %outcome.mode, "Command committed");
                        // publish before answering so the caller reads its own write
                        self.publish();
                    }
                    Err(e) => warn!(command = %command, error = %e, "Command rejected at commit"),
                }
                let _ = response_tx.send(result);
                false
            }
            StoreCommand::Navigate { area, response_tx } => {
                let result = self.store.navigate(&area, now);
                match &result {
                    Ok(_) => info!(area = %area, "Navigation target set"),
                    Err(e) => warn!(area = %area, error = %e, "Navigation refused"),
                }
                // a refusal raises an alarm too
                self.publish();
                let _ = response_tx.send(result);
                false
            }
            StoreCommand::Snapshot { response_tx } => {
                let _ = response_tx.send(Arc::new(self.store.snapshot()));
                false
            }
        }
    }
}
