//! Timer that drives a Crash table
//!
//! The driver owns no round state. It polls on a tokio interval and advances the
//! shared table by the elapsed time, so cancelling it freezes the round exactly
//! where it was and a new driver picks it up again.

use crate::games::types::{CrashPhaseKind, RoundEvent};
use crate::tables::CrashTable;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Shared handle to a table the driver advances
pub type SharedCrashTable = Arc<Mutex<CrashTable>>;

pub struct CrashDriver {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CrashDriver {
    /// Start polling `table` every `poll`
    pub fn spawn(table: SharedCrashTable, poll: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = interval(poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = Instant::now();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let dt = now - last;
                        last = now;

                        let mut table = table.lock().await;
                        match table.advance(dt) {
                            Ok(events) => {
                                for event in events {
                                    if let RoundEvent::PhaseChanged { round, phase: CrashPhaseKind::Crashed } = event {
                                        tracing::info!(round, multiplier = table.round().phase.multiplier(), "Crash round ended");
                                    }
                                }
                            }
                            Err(e) => tracing::warn!("Crash driver tick failed: {}", e),
                        }
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Crash driver stopped");
        });

        Self { stop, task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the timer and wait for the task to exit. Round state is left as is.
    pub async fn cancel(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("Crash driver task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::Repository;
    use crate::common::types::{current_timestamp, Account, Money};
    use crate::games::crash::CrashTiming;
    use crate::games::rng::GameRng;
    use crate::ledger::Ledger;
    use crate::memory_store::MemoryRepository;
    use crate::settlement::SettlementDesk;

    fn shared_table() -> SharedCrashTable {
        let repo = Arc::new(MemoryRepository::new());
        repo.insert_account(&Account {
            name: "ana".to_string(),
            password_hash: String::new(),
            balance: Money::from_units(100),
            referral_code: "ANA001".to_string(),
            created_at: current_timestamp(),
        })
        .unwrap();
        let desk = Arc::new(SettlementDesk::new(Arc::new(Ledger::new(repo))));
        Arc::new(Mutex::new(CrashTable::new(
            "ana",
            desk,
            Box::new(GameRng::seeded(1)),
            CrashTiming::default(),
            10,
        )))
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_counts_down_and_starts_round() {
        let table = shared_table();
        let driver = CrashDriver::spawn(Arc::clone(&table), Duration::from_millis(30));
        assert!(driver.is_running());

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_ne!(table.lock().await.snapshot().phase, CrashPhaseKind::Waiting);

        driver.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_freezes_round() {
        let table = shared_table();
        table.lock().await.place_bet(Money::from_units(10)).unwrap();

        let driver = CrashDriver::spawn(Arc::clone(&table), Duration::from_millis(30));
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        driver.cancel().await;

        let frozen = table.lock().await.snapshot();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(table.lock().await.snapshot(), frozen);
        assert!(table.lock().await.open_handle().is_some());
    }
}
