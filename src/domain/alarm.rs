// Alarm ledger domain model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(pub u64);

impl std::fmt::Display for AlarmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmLevel {
    Emergency,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alarm {
    pub id: AlarmId,
    pub level: AlarmLevel,
    pub message: String,
    pub time: DateTime<Utc>,
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor: Option<String>,
}

/// Producer-side description of an alarm; id and time are assigned by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlarm {
    pub level: AlarmLevel,
    pub message: String,
    pub handled: bool,
    pub sensor: Option<String>,
}

impl NewAlarm {
    pub fn new(level: AlarmLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            handled: false,
            sensor: None,
        }
    }

    pub fn handled(mut self) -> Self {
        self.handled = true;
        self
    }

    pub fn from_sensor(mut self, sensor: impl Into<String>) -> Self {
        self.sensor = Some(sensor.into());
        self
    }
}

/// Most-recent-first alarm sequence. Entries are never removed or reordered.
#[derive(Debug, Default)]
pub struct AlarmLedger {
    entries: VecDeque<Alarm>,
    last_id: u64,
}

impl AlarmLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time-derived id that is still strictly increasing when two alarms
    /// land in the same millisecond.
    fn next_id(&mut self, now: DateTime<Utc>) -> AlarmId {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        self.last_id = millis.max(self.last_id + 1);
        AlarmId(self.last_id)
    }

    pub fn add(&mut self, alarm: NewAlarm, now: DateTime<Utc>) -> AlarmId {
        let id = self.next_id(now);
        self.entries.push_front(Alarm {
            id,
            level: alarm.level,
            message: alarm.message,
            time: now,
            handled: alarm.handled,
            sensor: alarm.sensor,
        });
        id
    }

    /// Returns true only when the flag actually flipped.
    pub fn handle(&mut self, id: AlarmId) -> bool {
        match self.entries.iter_mut().find(|a| a.id == id) {
            Some(alarm) if !alarm.handled => {
                alarm.handled = true;
                true
            }
            _ => false,
        }
    }

    pub fn unhandled_count(&self) -> usize {
        self.entries.iter().filter(|a| !a.handled).count()
    }

    pub fn to_vec(&self) -> Vec<Alarm> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_recent_first() {
        let mut ledger = AlarmLedger::new();
        let now = Utc::now();
        ledger.add(NewAlarm::new(AlarmLevel::Info, "A"), now);
        ledger.add(NewAlarm::new(AlarmLevel::Warning, "B"), now);
        ledger.add(NewAlarm::new(AlarmLevel::Emergency, "C"), now);

        let messages: Vec<String> = ledger.to_vec().into_iter().map(|a| a.message).collect();
        assert_eq!(messages, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_ids_unique_within_same_millisecond() {
        let mut ledger = AlarmLedger::new();
        let now = Utc::now();
        let a = ledger.add(NewAlarm::new(AlarmLevel::Info, "a"), now);
        let b = ledger.add(NewAlarm::new(AlarmLevel::Info, "b"), now);
        assert!(b > a);
        assert_eq!(a.0, u64::try_from(now.timestamp_millis()).unwrap());
    }

    #[test]
    fn test_handle_is_idempotent() {
        let mut ledger = AlarmLedger::new();
        let now = Utc::now();
        let id = ledger.add(NewAlarm::new(AlarmLevel::Warning, "motor hot"), now);
        ledger.add(NewAlarm::new(AlarmLevel::Info, "other"), now);

        assert!(ledger.handle(id));
        let once = ledger.to_vec();
        assert!(!ledger.handle(id));
        assert_eq!(ledger.to_vec(), once);
        assert_eq!(ledger.unhandled_count(), 1);
    }

    #[test]
    fn test_handle_unknown_id_is_noop() {
        let mut ledger = AlarmLedger::new();
        ledger.add(NewAlarm::new(AlarmLevel::Info, "x"), Utc::now());
        let before = ledger.to_vec();
        assert!(!ledger.handle(AlarmId(1)));
        assert_eq!(ledger.to_vec(), before);
    }

    #[test]
    fn test_created_handled() {
        let mut ledger = AlarmLedger::new();
        let id = ledger.add(
            NewAlarm::new(AlarmLevel::Warning, "recharge").handled(),
            Utc::now(),
        );
        let alarms = ledger.to_vec();
        assert_eq!(alarms[0].id, id);
        assert!(alarms[0].handled);
        assert_eq!(ledger.unhandled_count(), 0);
    }
}
