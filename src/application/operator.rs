// Operator console - command handlers with legality checks and in-flight marker
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::application::store::StoreHandle;
use crate::domain::command::{Command, CommandOutcome, CommandRejected, NavigationOutcome};

pub const DEFAULT_ROUND_TRIP: Duration = Duration::from_millis(1500);

type Marker = Arc<watch::Sender<Option<Command>>>;

/// Holds the in-flight slot; clears it on drop.
struct InFlightGuard {
    marker: Marker,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.marker.send_replace(None);
    }
}

/// Pending result of an accepted command.
#[derive(Debug)]
pub struct CommandTicket {
    pub round_trip: bool,
    outcome: oneshot::Receiver<Result<CommandOutcome, CommandRejected>>,
}

impl CommandTicket {
    fn resolved(result: Result<CommandOutcome, CommandRejected>) -> Self {
        let (outcome_tx, outcome) = oneshot::channel();
        let _ = outcome_tx.send(result);
        Self {
            round_trip: false,
            outcome,
        }
    }

    /// Resolves once the command is committed or rejected at commit time.
    pub async fn outcome(self) -> Result<CommandOutcome, CommandRejected> {
        self.outcome
            .await
            .unwrap_or(Err(CommandRejected::StoreUnavailable))
    }
}

async fn commit(store: &StoreHandle, command: Command) -> Result<CommandOutcome, CommandRejected> {
    match store.apply_command(command) {
        Ok(rx) => rx.await.unwrap_or(Err(CommandRejected::StoreUnavailable)),
        Err(_) => Err(CommandRejected::StoreUnavailable),
    }
}

#[derive(Clone)]
pub struct OperatorConsole {
    store: StoreHandle,
    in_flight: Marker,
    round_trip: Duration,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl OperatorConsole {
    pub fn new(store: StoreHandle, round_trip: Duration) -> Self {
        let (in_flight, _) = watch::channel(None);
        Self {
            store,
            in_flight: Arc::new(in_flight),
            round_trip,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Command currently holding the console, if any.
    pub fn in_flight(&self) -> Option<Command> {
        *self.in_flight.borrow()
    }

    /// Claims the console, checks legality against the latest queued state,
    /// then commits immediately or after the round-trip delay. The claim is
    /// held until the commit lands, so every other command is rejected
    /// meanwhile.
    pub async fn invoke(&self, command: Command) -> Result<CommandTicket, CommandRejected> {
        if self.shutdown.is_cancelled() {
            return Err(CommandRejected::ShuttingDown);
        }

        let guard = self.claim(command)?;

        let snapshot = self
            .store
            .snapshot()
            .await
            .map_err(|_| CommandRejected::StoreUnavailable)?;
        command.check(&snapshot.robot)?;

        if !command.is_round_trip() {
            let result = commit(&self.store, command).await;
            drop(guard);
            return Ok(CommandTicket::resolved(result));
        }

        info!(command = %command, delay_ms = self.round_trip.as_millis() as u64, "Command in flight");

        let (outcome_tx, outcome) = oneshot::channel();
        let store = self.store.clone();
        let shutdown = self.shutdown.clone();
        let delay = self.round_trip;

        self.tasks.spawn(async move {
            let result = tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(command = %command, "Abandoning command on shutdown");
                    Err(CommandRejected::ShuttingDown)
                }
                _ = tokio::time::sleep(delay) => commit(&store, command).await,
            };
            // release before reporting so the caller may issue the next command
            drop(guard);
            let _ = outcome_tx.send(result);
        });

        Ok(CommandTicket {
            round_trip: true,
            outcome,
        })
    }

    /// Retargets the current task. Refused while a command holds the console.
    pub async fn navigate(&self, area: &str) -> Result<NavigationOutcome, CommandRejected> {
        if self.shutdown.is_cancelled() {
            return Err(CommandRejected::ShuttingDown);
        }
        if let Some(pending) = self.in_flight() {
            return Err(CommandRejected::InFlight { pending });
        }

        // queued with no await after the check, so a later claim sees its effect
        let response = self
            .store
            .navigate(area)
            .map_err(|_| CommandRejected::StoreUnavailable)?;
        response
            .await
            .unwrap_or(Err(CommandRejected::StoreUnavailable))
    }

    fn claim(&self, command: Command) -> Result<InFlightGuard, CommandRejected> {
        let mut pending = None;
        self.in_flight.send_if_modified(|slot| match slot {
            Some(other) => {
                pending = Some(*other);
                false
            }
            None => {
                *slot = Some(command);
                true
            }
        });

        match pending {
            Some(pending) => {
                debug!(command = %command, pending = %pending, "Rejecting command, another is in flight");
                Err(CommandRejected::InFlight { pending })
            }
            None => Ok(InFlightGuard {
                marker: self.in_flight.clone(),
            }),
        }
    }

    /// Abandons commands still waiting on their round-trip and waits for
    /// their tasks to finish. Later commands are refused.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }
}
