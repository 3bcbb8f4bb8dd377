// Robot state domain model - canonical snapshot plus partial-update merge
use serde::{Deserialize, Serialize};

pub const BATTERY_RANGE: (f64, f64) = (0.0, 100.0);
pub const PROGRESS_RANGE: (f64, f64) = (0.0, 100.0);
pub const MAX_SIGNAL: u8 = 5;
/// Below this the dashboard flags the robot for recharging.
pub const LOW_BATTERY: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotMode {
    Inspecting,
    Charging,
    Paused,
    Emergency,
    Error,
}

impl RobotMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotMode::Inspecting => "inspecting",
            RobotMode::Charging => "charging",
            RobotMode::Paused => "paused",
            RobotMode::Emergency => "emergency",
            RobotMode::Error => "error",
        }
    }
}

impl std::fmt::Display for RobotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub area: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorStatus {
    Normal,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraStatus {
    pub normal: bool,
    pub infrared: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorModuleStatus {
    Normal,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorModule {
    pub calibrated: bool,
    pub status: SensorModuleStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hardware {
    pub motor: MotorStatus,
    pub camera: CameraStatus,
    pub sensor: SensorModule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub name: String,
    pub progress: f64,
    /// Seconds
    pub remaining_time: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub battery: f64,
    pub mode: RobotMode,
    pub position: Position,
    pub hardware: Hardware,
    pub signal: u8,
    pub task: Task,
}

impl Default for RobotState {
    fn default() -> Self {
        Self {
            battery: 80.0,
            mode: RobotMode::Inspecting,
            position: Position {
                x: 10.0,
                y: 20.0,
                area: "Cabinet Zone 1".to_string(),
            },
            hardware: Hardware {
                motor: MotorStatus::Normal,
                camera: CameraStatus {
                    normal: true,
                    infrared: true,
                },
                sensor: SensorModule {
                    calibrated: true,
                    status: SensorModuleStatus::Normal,
                },
            },
            signal: MAX_SIGNAL,
            task: Task {
                name: "Patrol inspection".to_string(),
                progress: 30.0,
                remaining_time: 400,
            },
        }
    }
}

/// Partial update to [`Task`]. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<u32>,
}

impl From<Task> for TaskPatch {
    fn from(task: Task) -> Self {
        Self {
            name: Some(task.name),
            progress: Some(task.progress),
            remaining_time: Some(task.remaining_time),
        }
    }
}

/// Partial update to [`RobotState`]. `task` is merged field by field; a
/// present `hardware` or `position` replaces the whole sub-record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotStatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RobotMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<Hardware>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskPatch>,
}

impl RobotStatePatch {
    pub fn is_empty(&self) -> bool {
        self.battery.is_none()
            && self.mode.is_none()
            && self.position.is_none()
            && self.hardware.is_none()
            && self.signal.is_none()
            && self.task.is_none()
    }

    pub fn with_mode(mut self, mode: RobotMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_battery(mut self, battery: f64) -> Self {
        self.battery = Some(battery);
        self
    }

    pub fn with_task(mut self, task: impl Into<TaskPatch>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_progress(self, progress: f64) -> Self {
        self.with_task(TaskPatch {
            progress: Some(progress),
            ..Default::default()
        })
    }
}

fn clamp_into(value: f64, (lo, hi): (f64, f64), current: f64) -> f64 {
    if value.is_nan() {
        current
    } else {
        value.clamp(lo, hi)
    }
}

impl RobotState {
    /// Merge present fields of `patch`, then clamp the ranged fields.
    pub fn merge(&mut self, patch: RobotStatePatch) {
        if let Some(battery) = patch.battery {
            self.battery = clamp_into(battery, BATTERY_RANGE, self.battery);
        }
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(hardware) = patch.hardware {
            self.hardware = hardware;
        }
        if let Some(signal) = patch.signal {
            self.signal = signal.min(MAX_SIGNAL);
        }
        if let Some(task) = patch.task {
            self.task.apply(task);
        }
    }

    pub fn needs_recharge(&self) -> bool {
        self.battery < LOW_BATTERY
    }
}

impl Task {
    fn apply(&mut self, patch: TaskPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(progress) = patch.progress {
            self.progress = clamp_into(progress, PROGRESS_RANGE, self.progress);
        }
        if let Some(remaining_time) = patch.remaining_time {
            self.remaining_time = remaining_time;
        }
    }
}

/// Local simulation of the robot draining battery and advancing its task
/// between telemetry pushes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegradationPolicy {
    pub battery_drain: f64,
    pub battery_floor: f64,
    pub progress_step: f64,
}

impl Default for DegradationPolicy {
    fn default() -> Self {
        Self {
            battery_drain: 0.5,
            battery_floor: 10.0,
            progress_step: 0.3,
        }
    }
}

impl DegradationPolicy {
    /// Patch for one tick, or `None` when the robot is not inspecting.
    pub fn patch_for(&self, state: &RobotState) -> Option<RobotStatePatch> {
        if state.mode != RobotMode::Inspecting {
            return None;
        }

        let progress = (state.task.progress + self.progress_step).min(PROGRESS_RANGE.1);
        let mut patch = RobotStatePatch::default().with_progress(progress);

        // never raise a battery that is already under the floor
        if state.battery > self.battery_floor {
            patch.battery = Some((state.battery - self.battery_drain).max(self.battery_floor));
        }

        Some(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_leaves_absent_fields_untouched() {
        let mut state = RobotState::default();
        let before = state.clone();

        state.merge(RobotStatePatch {
            signal: Some(3),
            ..Default::default()
        });

        assert_eq!(state.signal, 3);
        assert_eq!(state.battery, before.battery);
        assert_eq!(state.mode, before.mode);
        assert_eq!(state.position, before.position);
        assert_eq!(state.hardware, before.hardware);
        assert_eq!(state.task, before.task);
    }

    #[test]
    fn test_merge_clamps_ranged_fields() {
        let mut state = RobotState::default();
        state.merge(RobotStatePatch::default().with_battery(-12.0).with_progress(140.0));
        assert_eq!(state.battery, 0.0);
        assert_eq!(state.task.progress, 100.0);

        state.merge(RobotStatePatch {
            battery: Some(250.0),
            signal: Some(9),
            ..Default::default()
        });
        assert_eq!(state.battery, 100.0);
        assert_eq!(state.signal, 5);
    }

    #[test]
    fn test_merge_ignores_nan() {
        let mut state = RobotState::default();
        state.merge(RobotStatePatch::default().with_battery(f64::NAN));
        assert_eq!(state.battery, 80.0);
    }

    #[test]
    fn test_merge_full_task() {
        let mut state = RobotState::default();
        let task = Task {
            name: "Cooling aisle sweep".to_string(),
            progress: 5.0,
            remaining_time: 90,
        };
        state.merge(RobotStatePatch::default().with_task(task.clone()));
        assert_eq!(state.task, task);
    }

    #[test]
    fn test_merge_partial_task_keeps_other_fields() {
        let mut state = RobotState::default();
        state.merge(RobotStatePatch::default().with_progress(55.0));
        assert_eq!(state.task.name, "Patrol inspection");
        assert_eq!(state.task.remaining_time, 400);
        assert_eq!(state.task.progress, 55.0);
    }

    #[test]
    fn test_needs_recharge_below_thirty() {
        let mut state = RobotState::default();
        assert!(!state.needs_recharge());
        state.merge(RobotStatePatch::default().with_battery(29.5));
        assert!(state.needs_recharge());
        state.merge(RobotStatePatch::default().with_battery(30.0));
        assert!(!state.needs_recharge());
    }

    #[test]
    fn test_degradation_only_while_inspecting() {
        let policy = DegradationPolicy::default();
        let mut state = RobotState::default();

        let patch = policy.patch_for(&state).unwrap();
        assert_eq!(patch.battery, Some(79.5));
        let progress = patch.task.as_ref().and_then(|t| t.progress).unwrap();
        assert!((progress - 30.3).abs() < 1e-9);
        assert!(patch.mode.is_none());

        state.mode = RobotMode::Charging;
        assert!(policy.patch_for(&state).is_none());
    }

    #[test]
    fn test_degradation_respects_floor_and_ceiling() {
        let policy = DegradationPolicy::default();
        let mut state = RobotState::default();
        state.battery = 10.2;
        state.task.progress = 99.9;

        let patch = policy.patch_for(&state).unwrap();
        assert_eq!(patch.battery, Some(10.0));
        assert_eq!(patch.task.unwrap().progress, Some(100.0));

        state.battery = 4.0;
        let patch = policy.patch_for(&state).unwrap();
        assert!(patch.battery.is_none());
    }

    #[test]
    fn test_patch_decodes_camel_case() {
        let patch: RobotStatePatch = serde_json::from_str(
            r#"{"mode":"emergency","task":{"name":"t","progress":12.5,"remainingTime":30}}"#,
        )
        .unwrap();
        assert_eq!(patch.mode, Some(RobotMode::Emergency));
        assert_eq!(patch.task.unwrap().remaining_time, Some(30));
        assert!(patch.battery.is_none());
    }
}
