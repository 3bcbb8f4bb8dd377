use crate::application::connection_manager::DEFAULT_RECONNECT_DELAY;
use crate::application::operator::DEFAULT_ROUND_TRIP;
use crate::application::ticker::DEFAULT_TICK_INTERVAL;
use crate::application::transport::BrokerAddress;
use crate::domain::robot::DegradationPolicy;
use crate::domain::temperature::HISTORY_CAPACITY;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub broker: BrokerSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub ticker: TickerSettings,
    #[serde(default)]
    pub commands: CommandSettings,
    #[serde(default)]
    pub history: HistorySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub address: BrokerAddress,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TickerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tick_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_battery_drain")]
    pub battery_drain: f64,
    #[serde(default = "default_battery_floor")]
    pub battery_floor: f64,
    #[serde(default = "default_progress_step")]
    pub progress_step: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommandSettings {
    #[serde(default = "default_round_trip_ms")]
    pub round_trip_ms: u64,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistorySettings {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
    #[serde(default = "default_true")]
    pub seed: bool,
}

fn default_client_id() -> String {
    format!("patrol-dashboard-{}", std::process::id())
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY.as_millis() as u64
}

fn default_channel_capacity() -> usize {
    10
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_true() -> bool {
    true
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL.as_millis() as u64
}

fn default_battery_drain() -> f64 {
    DegradationPolicy::default().battery_drain
}

fn default_battery_floor() -> f64 {
    DegradationPolicy::default().battery_floor
}

fn default_progress_step() -> f64 {
    DegradationPolicy::default().progress_step
}

fn default_round_trip_ms() -> u64 {
    DEFAULT_ROUND_TRIP.as_millis() as u64
}

fn default_log_capacity() -> usize {
    200
}

fn default_history_capacity() -> usize {
    HISTORY_CAPACITY
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for TickerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_tick_interval_ms(),
            battery_drain: default_battery_drain(),
            battery_floor: default_battery_floor(),
            progress_step: default_progress_step(),
        }
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            round_trip_ms: default_round_trip_ms(),
            log_capacity: default_log_capacity(),
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            seed: true,
        }
    }
}

impl BrokerSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl TickerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn policy(&self) -> DegradationPolicy {
        DegradationPolicy {
            battery_drain: self.battery_drain,
            battery_floor: self.battery_floor,
            progress_step: self.progress_step,
        }
    }
}

impl CommandSettings {
    pub fn round_trip(&self) -> Duration {
        Duration::from_millis(self.round_trip_ms)
    }
}

/// `config/dashboard.{toml,yaml,json}` if present, overridden by
/// `DASHBOARD__SECTION__KEY` environment variables.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    load_from("config/dashboard", dashboard_environment())
}

fn dashboard_environment() -> config::Environment {
    config::Environment::with_prefix("DASHBOARD")
        .separator("__")
        .try_parsing(true)
}

fn load_from(file: &str, environment: config::Environment) -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .set_default("broker.address", "wss://test.mosquitto.org:8081")?
        .add_source(config::File::with_name(file).required(false))
        .add_source(environment)
        .build()?;

    Ok(settings.try_deserialize()?)
}
