// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::application::connection_manager::ConnectionManager;
use crate::application::operator::OperatorConsole;
use crate::application::store::StoreActor;
use crate::application::ticker::DegradationTicker;
use crate::domain::state_store::StateStore;
use crate::domain::temperature::TemperatureHistory;
use crate::infrastructure::config::load_dashboard_config;
use crate::infrastructure::mqtt_transport::MqttConnector;
use crate::presentation::app_state::AppState;
use crate::presentation::routes::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_dashboard_config()?;

    // State store (single writer queue)
    let history = if config.history.seed {
        TemperatureHistory::seeded_diurnal(config.history.capacity)
    } else {
        TemperatureHistory::new(config.history.capacity)
    };
    let (store, store_task) =
        StoreActor::spawn(StateStore::new(history, config.commands.log_capacity));

    // Broker connection
    let connector = Arc::new(MqttConnector::new(
        config.broker.client_id.clone(),
        config.broker.keep_alive(),
        config.broker.channel_capacity,
    ));
    let connection = ConnectionManager::new(
        connector,
        config.broker.address.clone(),
        store.telemetry_sinks(),
        config.broker.reconnect_delay(),
    )
    .start();

    // Local simulation between telemetry pushes
    let ticker = config.ticker.enabled.then(|| {
        DegradationTicker::new(store.clone(), config.ticker.policy(), config.ticker.interval())
            .start()
    });

    let console = OperatorConsole::new(store.clone(), config.commands.round_trip());

    let state = Arc::new(AppState {
        store: store.clone(),
        console: console.clone(),
        connection: connection.watch(),
    });
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind).await?;
    info!(addr = %config.server.bind, broker = %config.broker.address, "Starting patrol-telemetry service");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    info!("Shutting down");
    console.shutdown().await;
    if let Some(ticker) = ticker {
        ticker.stop().await;
    }
    connection.stop().await;

    store_task.abort();

    Ok(())
}
