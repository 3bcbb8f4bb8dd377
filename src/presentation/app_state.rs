// Application state for HTTP handlers
use crate::application::connection_manager::ConnectionState;
use crate::application::operator::OperatorConsole;
use crate::application::store::StoreHandle;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
    pub console: OperatorConsole,
    pub connection: watch::Receiver<ConnectionState>,
}
