//! Background drain worker.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::batch_processor::{BatchProcessor, DrainReason};

/// Spawns the background drain worker onto the current Tokio runtime.
///
/// The worker runs a pass on a fixed interval and whenever a trigger arrives
/// on `rx`. Closing the trigger channel shuts the worker down; it runs one
/// final pass first so queued deltas survive an orderly stop.
pub fn spawn_drain_worker(
    processor: Arc<BatchProcessor>,
    mut rx: mpsc::UnboundedReceiver<DrainReason>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Drain worker started (interval: {:?})", interval);
        let mut tick = tokio::time::interval(interval);
        // The first tick fires immediately; consume it so the worker waits
        // a full interval before its first timer pass.
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    run_pass(&processor, DrainReason::Timer).await;
                }
                trigger = rx.recv() => {
                    match trigger {
                        Some(reason) => {
                            // Triggers that piled up while a pass ran are
                            // served by the same pass.
                            while rx.try_recv().is_ok() {}
                            run_pass(&processor, reason).await;
                        }
                        None => {
                            info!("Trigger channel closed, draining before shutdown");
                            run_pass(&processor, DrainReason::Shutdown).await;
                            return;
                        }
                    }
                }
            }
        }
    })
}

async fn run_pass(processor: &BatchProcessor, reason: DrainReason) {
    if let Err(err) = processor.run_pass(reason).await {
        error!("Drain pass ({}) failed: {}", reason, err);
    }
}
