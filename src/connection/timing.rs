//! Timing connection over any update provider

use std::path::Path;
use std::sync::{Arc, Weak};

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::driver::Driver;
use crate::pipeline::{Pipeline, Subscriber, event_stream};
use crate::provider::Provider;
use crate::providers::{CaptureProvider, ReplayOptions, ReplayProvider};
use crate::stream::ThrottleExt;
use crate::tracker::{PositionTracker, TimingLine};
use crate::types::{DomainEvent, UpdateRate};

/// Running order, leader first, unplaced drivers last
pub type Standings = Arc<Vec<TimingLine>>;

/// Lifecycle of a connection's driver task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Running,
    /// The source ended or the connection was stopped
    Finished { updates: u64 },
    /// Decoding, tracking or the source failed
    Failed { reason: String },
}

/// Keeps the running order and publishes it whenever a line changes
struct StandingsPublisher {
    tracker: PositionTracker,
    standings: watch::Sender<Standings>,
}

impl Subscriber for StandingsPublisher {
    fn on_event(&mut self, event: &DomainEvent) -> Result<()> {
        let changes = self.tracker.apply(event)?;
        let changed = match event {
            DomainEvent::Roster(_)
            | DomainEvent::LapTiming(_)
            | DomainEvent::IntervalTiming(_) => true,
            DomainEvent::DriverStatus(status) => status.retired.is_some(),
            DomainEvent::DriverPosition(_) => !changes.is_empty(),
            _ => false,
        };
        if changed {
            self.standings.send_replace(Arc::new(self.tracker.running_order()));
        }
        Ok(())
    }
}

/// Connection streaming decoded events and live standings from a provider
pub struct TimingConnection {
    standings: watch::Receiver<Standings>,
    state: watch::Receiver<ConnectionState>,
    events: Weak<broadcast::Sender<Arc<DomainEvent>>>,
    cancel: CancellationToken,
}

impl TimingConnection {
    /// Decode a capture file as fast as it can be read
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let provider = CaptureProvider::open(path).await?;
        Ok(Self::from_provider(provider, Pipeline::new()))
    }

    /// Replay a capture file with its original pacing
    pub async fn replay<P: AsRef<Path>>(path: P, options: ReplayOptions) -> Result<Self> {
        let provider = ReplayProvider::with_options(CaptureProvider::open(path).await?, options);
        Ok(Self::from_provider(provider, Pipeline::new()))
    }

    /// Start a driver task feeding `provider` into `pipeline`.
    ///
    /// A position tracker is added as the pipeline's last subscriber to maintain
    /// the standings.
    pub fn from_provider<P: Provider>(provider: P, mut pipeline: Pipeline) -> Self {
        let (standings_tx, standings) = watch::channel(Standings::default());
        pipeline.subscribe(StandingsPublisher {
            tracker: PositionTracker::new(),
            standings: standings_tx,
        });
        let events = pipeline.event_source();

        let handle = Driver::spawn(provider, pipeline);
        let cancel = handle.cancellation_token();

        let (state_tx, state) = watch::channel(ConnectionState::Running);
        tokio::spawn(async move {
            let final_state = match handle.wait().await {
                Ok(outcome) => {
                    info!(
                        updates = outcome.updates,
                        reason = ?outcome.reason,
                        "Timing connection finished"
                    );
                    ConnectionState::Finished { updates: outcome.updates }
                }
                Err(e) => {
                    warn!("Timing connection failed: {}", e);
                    ConnectionState::Failed { reason: e.to_string() }
                }
            };
            // The pipeline is gone by now, which ends every event stream
            let _ = state_tx.send(final_state);
        });

        info!("Timing connection opened");
        Self { standings, state, events, cancel }
    }

    /// Stream of events decoded after this call. Ends when the source does.
    pub fn events(&self) -> impl Stream<Item = Arc<DomainEvent>> + Send + 'static {
        match self.events.upgrade() {
            Some(sender) => event_stream(sender.subscribe()).boxed(),
            None => stream::empty().boxed(),
        }
    }

    /// Running order after each change, starting with the current one
    pub fn standings(&self, rate: UpdateRate) -> BoxStream<'static, Standings> {
        let standings = WatchStream::new(self.standings.clone());
        match rate.throttle_interval() {
            None => standings.boxed(),
            Some(interval) => standings.throttle(interval).boxed(),
        }
    }

    pub fn current_standings(&self) -> Standings {
        self.standings.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Wait for the driver task to finish
    pub async fn finished(&self) -> ConnectionState {
        let mut state = self.state.clone();
        match state.wait_for(|s| *s != ConnectionState::Running).await {
            Ok(state) => state.clone(),
            Err(_) => self.state.borrow().clone(),
        }
    }

    /// Stop reading from the source
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TimingConnection {
    fn drop(&mut self) {
        debug!("Dropping timing connection");
        self.cancel.cancel();
    }
}
