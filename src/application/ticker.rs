// Degradation ticker - simulates battery drain and task progress between pushes
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::store::StoreHandle;
use crate::domain::robot::DegradationPolicy;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(3);

pub struct DegradationTicker {
    store: StoreHandle,
    policy: DegradationPolicy,
    interval: Duration,
}

impl DegradationTicker {
    pub fn new(store: StoreHandle, policy: DegradationPolicy, interval: Duration) -> Self {
        Self {
            store,
            policy,
            interval,
        }
    }

    pub fn start(self) -> TickerHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        TickerHandle { cancel, task }
    }

    async fn run(self, cancel: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "Degradation ticker starting");

        // first tick one full period after start
        let mut ticks = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticks.tick() => {}
            }

            let policy = self.policy;
            // evaluated against the state at apply time, inside the store queue
            if let Err(e) = self
                .store
                .merge_robot_state_with(move |state| policy.patch_for(state))
            {
                warn!(error = %e, "Store gone, stopping degradation ticker");
                break;
            }
        }

        info!("Degradation ticker stopped");
    }
}

pub struct TickerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TickerHandle {
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Degradation ticker task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::store::StoreActor;
    use crate::domain::robot::{RobotMode, RobotStatePatch};
    use crate::domain::state_store::StateStore;
    use crate::domain::temperature::TemperatureHistory;

    fn spawn_store() -> StoreHandle {
        let (handle, _task) = StoreActor::spawn(StateStore::new(TemperatureHistory::default(), 50));
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn test_ten_ticks_while_inspecting() {
        let store = spawn_store();
        let ticker = DegradationTicker::new(
            store.clone(),
            DegradationPolicy::default(),
            DEFAULT_TICK_INTERVAL,
        )
        .start();

        // ten periods plus slack, short of the eleventh tick
        tokio::time::sleep(Duration::from_millis(31_500)).await;
        ticker.stop().await;

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.robot.battery, 75.0);
        assert!((snapshot.robot.task.progress - 33.0).abs() < 1e-9);
        assert!(snapshot.alarms.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_effect_outside_inspecting() {
        let store = spawn_store();
        store
            .merge_robot_state(RobotStatePatch::default().with_mode(RobotMode::Paused))
            .unwrap();
        let ticker = DegradationTicker::new(
            store.clone(),
            DegradationPolicy::default(),
            DEFAULT_TICK_INTERVAL,
        )
        .start();

        tokio::time::sleep(Duration::from_secs(30)).await;
        ticker.stop().await;

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.robot.battery, 80.0);
        assert_eq!(snapshot.robot.task.progress, 30.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_ticks() {
        let store = spawn_store();
        let ticker = DegradationTicker::new(
            store.clone(),
            DegradationPolicy::default(),
            DEFAULT_TICK_INTERVAL,
        )
        .start();

        tokio::time::sleep(Duration::from_millis(3_100)).await;
        ticker.stop().await;
        let after_stop = store.snapshot().await.unwrap().robot.battery;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(after_stop, 79.5);
        assert_eq!(store.snapshot().await.unwrap().robot.battery, after_stop);
    }
}
