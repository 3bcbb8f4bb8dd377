// Application layer - Store actor, background tasks and transport seam
pub mod connection_manager;
pub mod operator;
pub mod store;
pub mod ticker;
pub mod transport;
