//! # Sync Runner
//!
//! Background task that turns the engine's schedule into batches.
//!
//! ## Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            SyncRunner::run                              │
//! │                                                                         │
//! │   tokio::select! {                                                      │
//! │       network_rx.changed()     → engine.set_online(value)               │
//! │       engine.changed()         → recompute the deadline                 │
//! │       sleep(next_sync_time)    → engine.run_batch()   (online only)     │
//! │       shutdown_rx.recv()       → break                                  │
//! │   }                                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The deadline is re-read from the engine on every iteration, so a new
//! operation, a reconnect or a manual trigger takes effect immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{BatchOutcome, SkipReason, SyncEngine};
use crate::error::{SyncError, SyncResult};

/// Drives an engine from a network reachability watch.
pub struct SyncRunner {
    engine: Arc<SyncEngine>,
    network_rx: watch::Receiver<bool>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling a spawned runner.
pub struct SyncRunnerHandle {
    engine: Arc<SyncEngine>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SyncRunnerHandle {
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Requests a batch now.
    pub fn trigger_sync(&self) {
        self.engine.trigger_sync();
    }

    /// Stops the loop and waits for it to exit.
    ///
    /// A batch in flight is allowed to finish first.
    pub async fn shutdown(self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Sync runner already stopped".into()))?;

        self.task
            .await
            .map_err(|e| SyncError::Internal(format!("Sync runner panicked: {e}")))
    }
}

impl SyncRunner {
    /// Spawns the loop on the current tokio runtime.
    ///
    /// The watch's current value is applied before the first iteration.
    pub fn spawn(engine: Arc<SyncEngine>, network_rx: watch::Receiver<bool>) -> SyncRunnerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let runner = SyncRunner {
            engine: engine.clone(),
            network_rx,
            shutdown_rx,
        };
        let task = tokio::spawn(runner.run());

        SyncRunnerHandle {
            engine,
            shutdown_tx,
            task,
        }
    }

    async fn run(mut self) {
        info!("Sync runner starting");

        let online = *self.network_rx.borrow_and_update();
        self.engine.set_online(online);
        let mut network_open = true;

        loop {
            let delay = self.delay_until_next_sync();
            let armed = delay.is_some() && self.engine.is_online();
            let deadline = tokio::time::sleep(delay.unwrap_or(Duration::ZERO));

            tokio::select! {
                // Reachability changes
                changed = self.network_rx.changed(), if network_open => {
                    match changed {
                        Ok(()) => {
                            let online = *self.network_rx.borrow_and_update();
                            self.engine.set_online(online);
                        }
                        Err(_) => {
                            warn!("Network watch closed, keeping last known state");
                            network_open = false;
                        }
                    }
                }

                // Schedule changed
                _ = self.engine.changed() => {}

                // Deadline reached
                _ = deadline, if armed => {
                    if self.engine.run_batch().await
                        == BatchOutcome::Skipped(SkipReason::AlreadySyncing)
                    {
                        debug!("Batch started elsewhere, waiting for it");
                        self.engine.changed().await;
                    }
                }

                // Shutdown
                _ = self.shutdown_rx.recv() => {
                    info!("Sync runner shutting down");
                    break;
                }
            }
        }

        info!("Sync runner stopped");
    }

    fn delay_until_next_sync(&self) -> Option<Duration> {
        let next = self.engine.next_sync_time()?;
        Some((next - self.engine.now()).to_std().unwrap_or(Duration::ZERO))
    }
}
