// Server-sent event stream of dashboard snapshots and connection state
use crate::application::connection_manager::ConnectionState;
use crate::domain::state_store::DashboardSnapshot;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Snapshot(Arc<DashboardSnapshot>),
    Connection(ConnectionState),
}

enum Wake {
    Snapshot,
    Connection,
    ConnectionClosed,
    Closed,
}

impl StreamUpdate {
    fn into_event(self) -> Result<Event, axum::Error> {
        match self {
            StreamUpdate::Snapshot(snapshot) => {
                Event::default().event("snapshot").json_data(&*snapshot)
            }
            StreamUpdate::Connection(state) => Event::default().event("connection").json_data(state),
        }
    }
}

/// Current snapshot and connection state first, then one update per change.
/// Intermediate snapshots may be coalesced. Ends when the store goes away;
/// a stopped connection manager only ends the connection updates.
pub fn watch_updates(
    mut snapshots: watch::Receiver<Arc<DashboardSnapshot>>,
    mut connection: watch::Receiver<ConnectionState>,
) -> impl Stream<Item = StreamUpdate> {
    async_stream::stream! {
        let initial = snapshots.borrow_and_update().clone();
        yield StreamUpdate::Snapshot(initial);
        let state = *connection.borrow_and_update();
        yield StreamUpdate::Connection(state);

        let mut connection_open = true;
        loop {
            let wake = if connection_open {
                tokio::select! {
                    changed = snapshots.changed() => match changed {
                        Ok(()) => Wake::Snapshot,
                        Err(_) => Wake::Closed,
                    },
                    changed = connection.changed() => match changed {
                        Ok(()) => Wake::Connection,
                        Err(_) => Wake::ConnectionClosed,
                    },
                }
            } else {
                match snapshots.changed().await {
                    Ok(()) => Wake::Snapshot,
                    Err(_) => Wake::Closed,
                }
            };

            match wake {
                Wake::Snapshot => {
                    let snapshot = snapshots.borrow_and_update().clone();
                    yield StreamUpdate::Snapshot(snapshot);
                }
                Wake::Connection => {
                    let state = *connection.borrow_and_update();
                    yield StreamUpdate::Connection(state);
                }
                // manager stopped; report its final state and keep serving snapshots
                Wake::ConnectionClosed => {
                    connection_open = false;
                    let state = *connection.borrow();
                    yield StreamUpdate::Connection(state);
                }
                Wake::Closed => break,
            }
        }
    }
}

pub fn stream_from_watch(
    snapshots: watch::Receiver<Arc<DashboardSnapshot>>,
    connection: watch::Receiver<ConnectionState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = watch_updates(snapshots, connection).map(StreamUpdate::into_event);
    Sse::new(events).keep_alive(KeepAlive::default())
}
