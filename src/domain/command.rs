// Operator command domain model - legality table, transitions, command log
use super::alarm::{AlarmLevel, NewAlarm};
use super::robot::{RobotMode, RobotState, RobotStatePatch, Task, TaskPatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use thiserror::Error;

/// Charging is refused once the battery reaches this level.
pub const CHARGE_REFUSE_AT: f64 = 90.0;
const CHARGE_GAIN: f64 = 20.0;
const REBOOT_COST: f64 = 5.0;
const REBOOT_BATTERY_FLOOR: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    Charge,
    Pause,
    Resume,
    EmergencyStop,
    Reboot,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "charge" => Ok(Command::Charge),
            "pause" => Ok(Command::Pause),
            "resume" => Ok(Command::Resume),
            "emergency-stop" => Ok(Command::EmergencyStop),
            "reboot" => Ok(Command::Reboot),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CommandRejected {
    #[error("{command} is not permitted while {mode}")]
    NotPermitted { command: Command, mode: RobotMode },

    #[error("{pending} is still in flight")]
    InFlight { pending: Command },

    #[error("navigation is not available while {mode}")]
    NavigationBlocked { mode: RobotMode },

    #[error("state store is unavailable")]
    StoreUnavailable,

    #[error("operator console is shutting down")]
    ShuttingDown,
}

/// What a committed command did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    pub command: Command,
    pub mode: RobotMode,
    pub battery: f64,
}

/// The state change and alarm a command commits, computed from the state at
/// commit time.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub patch: RobotStatePatch,
    pub alarm: NewAlarm,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Charge => "charge",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::EmergencyStop => "emergency-stop",
            Command::Reboot => "reboot",
        }
    }

    /// Commands that wait on a simulated device round-trip before committing.
    pub fn is_round_trip(&self) -> bool {
        matches!(self, Command::Charge | Command::EmergencyStop | Command::Reboot)
    }

    pub fn is_permitted(&self, state: &RobotState) -> bool {
        use RobotMode::*;

        match self {
            Command::Charge => {
                !matches!(state.mode, Charging | Paused | Emergency)
                    && state.battery < CHARGE_REFUSE_AT
            }
            Command::Pause => !matches!(state.mode, Paused | Emergency | Charging),
            Command::Resume => !matches!(state.mode, Inspecting | Charging | Emergency),
            Command::EmergencyStop => state.mode != Emergency,
            Command::Reboot => state.mode == Emergency,
        }
    }

    pub fn check(&self, state: &RobotState) -> Result<(), CommandRejected> {
        if self.is_permitted(state) {
            Ok(())
        } else {
            Err(CommandRejected::NotPermitted {
                command: *self,
                mode: state.mode,
            })
        }
    }

    pub fn transition(&self, state: &RobotState) -> Transition {
        match self {
            Command::Charge => Transition {
                patch: RobotStatePatch::default()
                    .with_mode(RobotMode::Charging)
                    .with_battery((state.battery + CHARGE_GAIN).min(100.0)),
                alarm: NewAlarm::new(
                    AlarmLevel::Warning,
                    "Auto-recharge triggered, robot returning to the charging dock",
                )
                .handled(),
            },
            Command::Pause => Transition {
                patch: RobotStatePatch::default().with_mode(RobotMode::Paused),
                alarm: NewAlarm::new(AlarmLevel::Warning, "Inspection task paused"),
            },
            Command::Resume => Transition {
                patch: RobotStatePatch::default().with_mode(RobotMode::Inspecting),
                alarm: NewAlarm::new(AlarmLevel::Warning, "Inspection task resumed").handled(),
            },
            Command::EmergencyStop => Transition {
                patch: RobotStatePatch::default()
                    .with_mode(RobotMode::Emergency)
                    .with_progress(0.0),
                alarm: NewAlarm::new(
                    AlarmLevel::Emergency,
                    "Emergency stop triggered, all tasks halted",
                ),
            },
            Command::Reboot => Transition {
                patch: RobotStatePatch::default()
                    .with_mode(RobotMode::Inspecting)
                    .with_battery((state.battery - REBOOT_COST).max(REBOOT_BATTERY_FLOOR))
                    .with_progress(0.0),
                alarm: NewAlarm::new(
                    AlarmLevel::Warning,
                    "System reboot complete, starting a new inspection task",
                )
                .handled(),
            },
        }
    }
}

/// What a committed navigation request did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationOutcome {
    pub area: String,
    pub mode: RobotMode,
    pub task: Task,
}

/// Retargets the current task at `area` and restarts its progress. Refused
/// during an emergency stop; the `Err` carries the alarm raised for the refusal.
pub fn navigation(state: &RobotState, area: &str) -> Result<Transition, NewAlarm> {
    if state.mode == RobotMode::Emergency {
        return Err(NewAlarm::new(
            AlarmLevel::Warning,
            "Navigation unavailable during emergency stop",
        ));
    }

    Ok(Transition {
        patch: RobotStatePatch::default().with_task(TaskPatch {
            name: Some(format!("Navigate to {}", area)),
            progress: Some(0.0),
            remaining_time: None,
        }),
        alarm: NewAlarm::new(AlarmLevel::Info, format!("Navigation target set: {}", area))
            .handled(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandLogEntry {
    pub at: DateTime<Utc>,
    pub label: String,
}

impl std::fmt::Display for CommandLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.label)
    }
}

/// Most-recent-first operator command log, oldest entries dropped past capacity.
#[derive(Debug)]
pub struct CommandLog {
    entries: VecDeque<CommandLogEntry>,
    capacity: usize,
}

impl CommandLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, label: impl Into<String>, at: DateTime<Utc>) {
        self.entries.push_front(CommandLogEntry {
            at,
            label: label.into(),
        });
        self.entries.truncate(self.capacity);
    }

    pub fn to_vec(&self) -> Vec<CommandLogEntry> {
        self.entries.iter().cloned().collect()
    }
}
