// Temperature history - fixed-capacity rolling window feeding the chart
use serde::Serialize;
use std::collections::VecDeque;

pub const HISTORY_CAPACITY: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureBand {
    Cold,
    Cool,
    Normal,
    Elevated,
    Hot,
}

impl TemperatureBand {
    pub fn of(celsius: f64) -> Self {
        if celsius > 35.0 {
            TemperatureBand::Hot
        } else if celsius > 30.0 {
            TemperatureBand::Elevated
        } else if celsius < 15.0 {
            TemperatureBand::Cold
        } else if celsius < 18.0 {
            TemperatureBand::Cool
        } else {
            TemperatureBand::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureStats {
    pub current: f64,
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    pub band: TemperatureBand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureSnapshot {
    pub samples: Vec<f64>,
    pub stats: Option<TemperatureStats>,
}

#[derive(Debug, Clone)]
pub struct TemperatureHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl Default for TemperatureHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl TemperatureHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Window pre-filled with a smooth day curve so the chart is not empty
    /// before the first sensor push.
    pub fn seeded_diurnal(capacity: usize) -> Self {
        let mut history = Self::new(capacity);
        for i in 0..history.capacity {
            let angle = i as f64 * std::f64::consts::PI / 12.0;
            history.push(round_one_decimal(22.0 + angle.sin() * 3.0));
        }
        history
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Oldest first.
    pub fn samples(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn stats(&self) -> Option<TemperatureStats> {
        let current = *self.samples.back()?;
        let max = self.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = self.samples.iter().copied().fold(f64::INFINITY, f64::min);
        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;

        Some(TemperatureStats {
            current,
            max,
            min,
            mean: round_one_decimal(mean),
            band: TemperatureBand::of(current),
        })
    }

    pub fn snapshot(&self) -> TemperatureSnapshot {
        TemperatureSnapshot {
            samples: self.samples(),
            stats: self.stats(),
        }
    }
}
