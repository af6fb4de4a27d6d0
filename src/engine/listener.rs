//! Consumer loop for processed-job messages.

use super::GuardedEngine;
use crate::queue::ResultMessage;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drains the result channel and feeds each decoded message to the engine.
///
/// Runs as its own task for the lifetime of the process. A message that
/// does not decode is logged and skipped; the producer owns redelivery, not
/// this side.
pub struct ResultListener {
    engine: GuardedEngine,
    receiver: UnboundedReceiver<Vec<u8>>,
    shutdown: CancellationToken,
}

impl ResultListener {
    pub fn new(
        engine: GuardedEngine,
        receiver: UnboundedReceiver<Vec<u8>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            receiver,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!("Result listener started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Result listener shutting down");
                    return;
                }
                body = self.receiver.recv() => {
                    let Some(body) = body else {
                        info!("Result channel closed, listener exiting");
                        return;
                    };
                    match serde_json::from_slice::<ResultMessage>(&body) {
                        Ok(message) => self.engine.record_job_result(message).await,
                        Err(e) => warn!("Discarding undecodable result message: {}", e),
                    }
                }
            }
        }
    }
}
