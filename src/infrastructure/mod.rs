// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod mqtt_transport;
pub mod snapshot_stream;
pub mod telemetry_codec;
