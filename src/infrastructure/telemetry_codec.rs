// JSON wire codec for robot telemetry topics
use crate::domain::robot::RobotStatePatch;
use crate::domain::sensor::SensorData;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed {topic} payload: {source}")]
    Malformed {
        topic: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Sensor record as published. Any timestamp the robot sends is ignored.
#[derive(Debug, Deserialize)]
struct SensorPayload {
    temperature: f64,
    humidity: f64,
    noise: f64,
}

pub fn decode_robot_state(payload: &[u8]) -> Result<RobotStatePatch, DecodeError> {
    serde_json::from_slice(payload).map_err(|source| DecodeError::Malformed {
        topic: "robot/state",
        source,
    })
}

pub fn decode_sensor_data(
    payload: &[u8],
    received_at: DateTime<Utc>,
) -> Result<SensorData, DecodeError> {
    let raw: SensorPayload =
        serde_json::from_slice(payload).map_err(|source| DecodeError::Malformed {
            topic: "robot/sensor",
            source,
        })?;

    Ok(SensorData::new(
        raw.temperature,
        raw.humidity,
        raw.noise,
        received_at,
    ))
}
