//! Driver task that pumps a provider through a pipeline

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::pipeline::Pipeline;
use crate::provider::Provider;
use crate::{Result, TimingError};

/// Why a driver task stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The provider reported end of stream
    EndOfStream,
    /// [`DriverHandle::stop`] was called
    Cancelled,
}

/// Everything a finished driver task hands back
#[derive(Debug)]
pub struct DriverOutcome<P> {
    /// The provider, positioned after the last update read
    pub provider: P,
    /// The pipeline with all decoded state
    pub pipeline: Pipeline,
    /// Updates fed during this run
    pub updates: u64,
    pub reason: StopReason,
}

/// Handle to a running driver task
#[derive(Debug)]
pub struct DriverHandle<P> {
    cancel: CancellationToken,
    join: JoinHandle<Result<DriverOutcome<P>>>,
}

impl<P> DriverHandle<P> {
    /// Ask the task to stop.
    ///
    /// An update already fed to the pipeline is finished first. A read still waiting
    /// on the provider is abandoned; providers keep anything they already pulled.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task to finish.
    ///
    /// Malformed payloads, running-order violations and provider errors end the
    /// task and are returned here; nothing is retried.
    pub async fn wait(self) -> Result<DriverOutcome<P>> {
        self.join.await.map_err(|e| TimingError::Task { reason: e.to_string() })?
    }
}

/// Driver spawns the task that owns a provider and its pipeline
///
/// Reading from the provider is the only suspension point; decoding and fan-out
/// run synchronously between reads.
pub struct Driver;

impl Driver {
    /// Spawn a task feeding every update from `provider` into `pipeline`
    pub fn spawn<P>(provider: P, pipeline: Pipeline) -> DriverHandle<P>
    where
        P: Provider,
    {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move { Self::run(provider, pipeline, task_cancel).await });
        DriverHandle { cancel, join }
    }

    async fn run<P>(
        mut provider: P,
        mut pipeline: Pipeline,
        cancel: CancellationToken,
    ) -> Result<DriverOutcome<P>>
    where
        P: Provider,
    {
        info!("Driver task started");
        let mut updates = 0u64;

        let reason = loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(updates, "Driver cancelled");
                    break StopReason::Cancelled;
                }
                next = provider.next_update() => next,
            };

            let update = match next {
                Ok(Some(update)) => update,
                Ok(None) => {
                    info!(updates, "Provider ended");
                    break StopReason::EndOfStream;
                }
                Err(e) => {
                    error!(updates, "Provider failed: {}", e);
                    return Err(e);
                }
            };

            match pipeline.feed(&update) {
                Ok(events) => {
                    trace!(sequence = update.sequence, events, "Update processed");
                }
                Err(e) => {
                    error!(
                        sequence = update.sequence,
                        category = %update.category,
                        "Pipeline failed: {}", e
                    );
                    return Err(e);
                }
            }
            updates += 1;
        };

        debug!(?reason, updates, "Driver task finished");
        Ok(DriverOutcome { provider, pipeline, updates, reason })
    }
}
