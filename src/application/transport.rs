// Telemetry transport abstraction - publish/subscribe client seam
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

pub const ROBOT_STATE_TOPIC: &str = "robot/state";
pub const ROBOT_SENSOR_TOPIC: &str = "robot/sensor";
pub const SUBSCRIBED_TOPICS: [&str; 2] = [ROBOT_STATE_TOPIC, ROBOT_SENSOR_TOPIC];

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {address} failed: {message}")]
    Connect { address: String, message: String },

    #[error("subscribe to {topic} failed: {message}")]
    Subscribe { topic: String, message: String },

    #[error("connection error: {0}")]
    Connection(String),
}

/// Connection-level events surfaced by a session.
#[derive(Debug)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Message { topic: String, payload: Bytes },
    Error(TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerScheme {
    Tcp,
    Ws,
    Wss,
}

/// Broker endpoint: `scheme://host:port[/path]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub scheme: BrokerScheme,
    pub host: String,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("missing scheme in broker address: {0}")]
    MissingScheme(String),

    #[error("unsupported broker scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing host in broker address: {0}")]
    MissingHost(String),

    #[error("missing or invalid port in broker address: {0}")]
    InvalidPort(String),
}

impl FromStr for BrokerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| AddressError::MissingScheme(s.to_string()))?;

        let scheme = match scheme {
            "mqtt" | "tcp" => BrokerScheme::Tcp,
            "ws" => BrokerScheme::Ws,
            "wss" => BrokerScheme::Wss,
            other => return Err(AddressError::UnsupportedScheme(other.to_string())),
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| AddressError::InvalidPort(s.to_string()))?;
        if host.is_empty() {
            return Err(AddressError::MissingHost(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(s.to_string()))?;

        let path = match (scheme, path) {
            (BrokerScheme::Tcp, _) => String::new(),
            (_, "") => "/mqtt".to_string(),
            (_, p) => p.to_string(),
        };

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path,
        })
    }
}

impl std::fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match self.scheme {
            BrokerScheme::Tcp => "mqtt",
            BrokerScheme::Ws => "ws",
            BrokerScheme::Wss => "wss",
        };
        write!(f, "{}://{}:{}{}", scheme, self.host, self.port, self.path)
    }
}

impl<'de> Deserialize<'de> for BrokerAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Opens sessions against a broker. A fresh session is opened on every
/// reconnect, so implementations must not assume subscriptions survive.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(
        &self,
        address: &BrokerAddress,
    ) -> Result<Box<dyn TransportSession>, TransportError>;
}

#[async_trait]
pub trait TransportSession: Send {
    /// Idempotent.
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Next connection event. Must be cancel-safe.
    async fn next_event(&mut self) -> TransportEvent;

    /// Idempotent.
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wss_default_path() {
        let address: BrokerAddress = "wss://test.mosquitto.org:8081".parse().unwrap();
        assert_eq!(address.scheme, BrokerScheme::Wss);
        assert_eq!(address.host, "test.mosquitto.org");
        assert_eq!(address.port, 8081);
        assert_eq!(address.path, "/mqtt");
        assert_eq!(address.to_string(), "wss://test.mosquitto.org:8081/mqtt");
    }

    #[test]
    fn test_parse_tcp() {
        let address: BrokerAddress = "mqtt://10.0.0.7:1883".parse().unwrap();
        assert_eq!(address.scheme, BrokerScheme::Tcp);
        assert_eq!(address.path, "");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "localhost:1883".parse::<BrokerAddress>(),
            Err(AddressError::MissingScheme(_))
        ));
        assert!(matches!(
            "http://localhost:80".parse::<BrokerAddress>(),
            Err(AddressError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            "mqtt://localhost".parse::<BrokerAddress>(),
            Err(AddressError::InvalidPort(_))
        ));
        assert!(matches!(
            "ws://:8080".parse::<BrokerAddress>(),
            Err(AddressError::MissingHost(_))
        ));
    }
}
