//! Periodic ledger rebuilds owned by the process lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::DrillError;
use crate::ledger::ScoreLedger;

/// A background task rebuilding the ledger on a fixed interval.
///
/// Failed rebuilds are logged and retried at the next tick. Dropping the
/// scheduler without calling [`RebuildScheduler::shutdown`] also stops the
/// task, at its next wake-up.
pub struct RebuildScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RebuildScheduler {
    /// Start rebuilding every `period`. With `run_on_start`, the first
    /// rebuild runs as soon as the task starts, before any stop signal is
    /// looked at, instead of after one period.
    pub fn spawn(ledger: Arc<ScoreLedger>, period: Duration, run_on_start: bool) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            if run_on_start {
                rebuild(&ledger).await;
            }

            loop {
                tokio::select! {
                    biased;
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => rebuild(&ledger).await,
                }
            }
            tracing::debug!("rebuild scheduler stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("rebuild scheduler panicked: {e}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn rebuild(ledger: &ScoreLedger) {
    match ledger.rebuild_from_history().await {
        Ok(_) => {}
        Err(DrillError::Store(e)) if e.is_transient() => {
            tracing::warn!("leaderboard rebuild failed, retrying next interval: {e}");
        }
        Err(e) => tracing::error!("leaderboard rebuild failed: {e}"),
    }
}
