//! The lease reaper as a detached periodic task (spec.md §4.5): one pass at
//! startup, then one every `ReaperInterval`, until the shutdown signal fires.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::JobEngine;
use crate::storage::JobStore;

/// Handle to the running reaper task. Dropping it does not stop the task —
/// call `shutdown` (or drop the paired sender) for a graceful stop.
pub struct ReaperHandle {
    join: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl ReaperHandle {
    /// Signal the reaper to stop after its current pass and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}

/// Spawns the reaper loop on the current tokio runtime.
pub fn spawn<S: JobStore>(engine: JobEngine<S>, interval: Duration) -> ReaperHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        run_pass(&engine);

        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; we already ran a pass above

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_pass(&engine);
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    ReaperHandle { join, shutdown_tx }
}

fn run_pass<S: JobStore>(engine: &JobEngine<S>) {
    let summary = engine.reap_once();
    if summary.reaped_requeued > 0 || summary.reaped_dead > 0 {
        tracing::info!(
            requeued = summary.reaped_requeued,
            dead = summary.reaped_dead,
            skipped_contended = summary.skipped_contended,
            "reaper pass completed"
        );
    } else if summary.skipped_contended > 0 {
        tracing::debug!(
            skipped_contended = summary.skipped_contended,
            "reaper pass completed, nothing reaped"
        );
    }
}
