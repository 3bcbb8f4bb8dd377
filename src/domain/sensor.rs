// Environment sensor domain model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest environment snapshot. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorData {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    /// Decibels
    pub noise: f64,
    pub update_time: DateTime<Utc>,
}

impl SensorData {
    pub fn new(temperature: f64, humidity: f64, noise: f64, update_time: DateTime<Utc>) -> Self {
        Self {
            temperature,
            humidity,
            noise,
            update_time,
        }
    }

    pub fn temperature_level(&self) -> ReadingLevel {
        ReadingLevel::classify(self.temperature, Some(15.0), Some(30.0))
    }

    pub fn humidity_level(&self) -> ReadingLevel {
        ReadingLevel::classify(self.humidity, Some(30.0), Some(70.0))
    }

    pub fn noise_level(&self) -> ReadingLevel {
        ReadingLevel::classify(self.noise, None, Some(60.0))
    }

    pub fn levels(&self) -> SensorLevels {
        SensorLevels {
            temperature: self.temperature_level(),
            humidity: self.humidity_level(),
            noise: self.noise_level(),
        }
    }
}

impl Default for SensorData {
    fn default() -> Self {
        Self::new(25.0, 50.0, 40.0, Utc::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingLevel {
    Low,
    Normal,
    High,
}

impl ReadingLevel {
    fn classify(value: f64, low_below: Option<f64>, high_above: Option<f64>) -> Self {
        match (low_below, high_above) {
            (_, Some(high)) if value > high => ReadingLevel::High,
            (Some(low), _) if value < low => ReadingLevel::Low,
            _ => ReadingLevel::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorLevels {
    pub temperature: ReadingLevel,
    pub humidity: ReadingLevel,
    pub noise: ReadingLevel,
}
