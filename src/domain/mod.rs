// Domain layer - robot telemetry model and pure state transitions
pub mod alarm;
pub mod command;
pub mod robot;
pub mod sensor;
pub mod state_store;
pub mod temperature;
