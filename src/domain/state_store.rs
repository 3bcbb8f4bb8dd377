// State store - canonical robot/sensor state, alarm ledger, command log
use super::alarm::{Alarm, AlarmId, AlarmLedger, NewAlarm};
use super::command::{
    navigation, Command, CommandLog, CommandLogEntry, CommandOutcome, CommandRejected,
    NavigationOutcome,
};
use super::robot::{RobotState, RobotStatePatch};
use super::sensor::{SensorData, SensorLevels};
use super::temperature::{TemperatureHistory, TemperatureSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Immutable copy of everything the dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub robot: RobotState,
    pub needs_recharge: bool,
    pub sensor: SensorData,
    pub sensor_levels: SensorLevels,
    pub alarms: Vec<Alarm>,
    pub unhandled_alarms: usize,
    pub command_log: Vec<CommandLogEntry>,
    pub temperature: TemperatureSnapshot,
}

pub struct StateStore {
    robot: RobotState,
    sensor: SensorData,
    alarms: AlarmLedger,
    command_log: CommandLog,
    temperature: TemperatureHistory,
}

impl StateStore {
    pub fn new(temperature: TemperatureHistory, command_log_capacity: usize) -> Self {
        Self {
            robot: RobotState::default(),
            sensor: SensorData::default(),
            alarms: AlarmLedger::new(),
            command_log: CommandLog::new(command_log_capacity),
            temperature,
        }
    }

    pub fn robot(&self) -> &RobotState {
        &self.robot
    }

    pub fn merge_robot_state(&mut self, patch: RobotStatePatch) {
        self.robot.merge(patch);
    }

    /// Sensor snapshot is replaced whole; the temperature window gets the new sample.
    pub fn replace_sensor_data(&mut self, data: SensorData) {
        self.temperature.push(data.temperature);
        self.sensor = data;
    }

    pub fn add_alarm(&mut self, alarm: NewAlarm, now: DateTime<Utc>) -> AlarmId {
        self.alarms.add(alarm, now)
    }

    pub fn handle_alarm(&mut self, id: AlarmId) -> bool {
        self.alarms.handle(id)
    }

    pub fn log_command(&mut self, label: impl Into<String>, now: DateTime<Utc>) {
        self.command_log.record(label, now);
    }

    /// Re-validates against the current state, then commits the transition,
    /// its alarm and a log entry together.
    pub fn apply_command(
        &mut self,
        command: Command,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome, CommandRejected> {
        command.check(&self.robot)?;

        let transition = command.transition(&self.robot);
        self.robot.merge(transition.patch);
        self.alarms.add(transition.alarm, now);
        self.log_command(command.as_str(), now);

        Ok(CommandOutcome {
            command,
            mode: self.robot.mode,
            battery: self.robot.battery,
        })
    }

    /// Points the current task at `area`. A refusal still raises its alarm,
    /// so the store changes either way.
    pub fn navigate(
        &mut self,
        area: &str,
        now: DateTime<Utc>,
    ) -> Result<NavigationOutcome, CommandRejected> {
        let transition = match navigation(&self.robot, area) {
            Ok(transition) => transition,
            Err(alarm) => {
                self.alarms.add(alarm, now);
                return Err(CommandRejected::NavigationBlocked {
                    mode: self.robot.mode,
                });
            }
        };

        self.robot.merge(transition.patch);
        self.alarms.add(transition.alarm, now);
        self.log_command(format!("navigate {}", area), now);

        Ok(NavigationOutcome {
            area: area.to_string(),
            mode: self.robot.mode,
            task: self.robot.task.clone(),
        })
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            robot: self.robot.clone(),
            needs_recharge: self.robot.needs_recharge(),
            sensor: self.sensor.clone(),
            sensor_levels: self.sensor.levels(),
            alarms: self.alarms.to_vec(),
            unhandled_alarms: self.alarms.unhandled_count(),
            command_log: self.command_log.to_vec(),
            temperature: self.temperature.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alarm::AlarmLevel;
    use crate::domain::robot::RobotMode;

    fn store() -> StateStore {
        StateStore::new(TemperatureHistory::default(), 50)
    }

    #[test]
    fn test_rejected_command_changes_nothing() {
        let mut store = store();
        store.merge_robot_state(RobotStatePatch::default().with_mode(RobotMode::Charging));
        let before = store.snapshot();

        let result = store.apply_command(Command::Charge, Utc::now());
        assert!(matches!(result, Err(CommandRejected::NotPermitted { .. })));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_reboot_from_emergency() {
        let mut store = store();
        store.merge_robot_state(RobotStatePatch::default().with_mode(RobotMode::Emergency));

        let outcome = store.apply_command(Command::Reboot, Utc::now()).unwrap();
        assert_eq!(outcome.mode, RobotMode::Inspecting);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.robot.task.progress, 0.0);
        assert_eq!(snapshot.alarms.len(), 1);
        assert_eq!(snapshot.command_log[0].label, "reboot");
    }

    #[test]
    fn test_pause_raises_unhandled_warning() {
        let mut store = store();
        store.apply_command(Command::Pause, Utc::now()).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.robot.mode, RobotMode::Paused);
        assert_eq!(snapshot.alarms[0].level, AlarmLevel::Warning);
        assert_eq!(snapshot.unhandled_alarms, 1);
    }

    #[test]
    fn test_sensor_replace_feeds_history() {
        let mut store = store();
        let data = SensorData::new(27.5, 41.0, 55.0, Utc::now());
        store.replace_sensor_data(data.clone());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.sensor, data);
        assert_eq!(snapshot.temperature.samples, vec![27.5]);
    }

    #[test]
    fn test_navigate_sets_target_and_logs() {
        let mut store = store();
        let outcome = store.navigate("Cabinet Zone 2", Utc::now()).unwrap();
        assert_eq!(outcome.task.name, "Navigate to Cabinet Zone 2");

        let snapshot = store.snapshot();
        assert_eq!(snapshot.robot.task.progress, 0.0);
        assert_eq!(snapshot.alarms[0].level, AlarmLevel::Info);
        assert!(snapshot.alarms[0].handled);
        assert_eq!(snapshot.command_log[0].label, "navigate Cabinet Zone 2");
    }

    #[test]
    fn test_navigate_refused_in_emergency_raises_alarm() {
        let mut store = store();
        store.merge_robot_state(RobotStatePatch::default().with_mode(RobotMode::Emergency));
        let task_before = store.robot().task.clone();

        let result = store.navigate("Cabinet Zone 2", Utc::now());
        assert_eq!(
            result.unwrap_err(),
            CommandRejected::NavigationBlocked {
                mode: RobotMode::Emergency
            }
        );

        let snapshot = store.snapshot();
        assert_eq!(snapshot.robot.task, task_before);
        assert_eq!(snapshot.alarms[0].level, AlarmLevel::Warning);
        assert_eq!(snapshot.unhandled_alarms, 1);
        assert!(snapshot.command_log.is_empty());
    }

    #[test]
    fn test_snapshot_flags_low_battery() {
        let mut store = store();
        assert!(!store.snapshot().needs_recharge);
        store.merge_robot_state(RobotStatePatch::default().with_battery(25.0));
        assert!(store.snapshot().needs_recharge);
    }
}
