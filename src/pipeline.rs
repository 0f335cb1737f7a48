//! Decode-and-fan-out stage between a provider and its consumers.
//!
//! A [`Pipeline`] owns the session's [`Decoder`] and an ordered list of
//! [`Subscriber`]s. For every update it:
//!
//! 1. hands the raw update to every subscriber's [`Subscriber::on_update`]
//! 2. decodes it
//! 3. delivers each event, in decode order, to every subscriber's
//!    [`Subscriber::on_event`] and then to the broadcast channel behind
//!    [`Pipeline::events`]
//!
//! Step 1 always completes before step 3 starts, so a subscriber that needs to know
//! which update an event came from (such as the interval recorder) sees the update
//! first regardless of registration order.

use std::sync::{Arc, Mutex, Weak};

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::decoder::Decoder;
use crate::tracker::PositionTracker;
use crate::types::{DomainEvent, Update};
use crate::{Result, TimingError};

/// Default capacity of the event broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 4096;

/// Synchronous consumer of decoded events
pub trait Subscriber: Send {
    /// Called with each raw update before any of its events are delivered.
    fn on_update(&mut self, _update: &Update) -> Result<()> {
        Ok(())
    }

    /// Called once per decoded event. An error halts the pipeline.
    fn on_event(&mut self, event: &DomainEvent) -> Result<()>;
}

/// Shared subscribers, so callers can read state the pipeline is updating
impl<S: Subscriber> Subscriber for Arc<Mutex<S>> {
    fn on_update(&mut self, update: &Update) -> Result<()> {
        self.lock().map_err(|_| poisoned())?.on_update(update)
    }

    fn on_event(&mut self, event: &DomainEvent) -> Result<()> {
        self.lock().map_err(|_| poisoned())?.on_event(event)
    }
}

fn poisoned() -> TimingError {
    TimingError::Subscriber { details: "shared subscriber lock poisoned".into() }
}

impl Subscriber for PositionTracker {
    fn on_event(&mut self, event: &DomainEvent) -> Result<()> {
        self.apply(event).map(|_| ())
    }
}

/// Adapt a broadcast receiver into an event stream that skips lagged events
pub(crate) fn event_stream(
    receiver: broadcast::Receiver<Arc<DomainEvent>>,
) -> impl Stream<Item = Arc<DomainEvent>> + Send + 'static {
    BroadcastStream::new(receiver).filter_map(|result| async move {
        match result {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Event stream receiver lagged");
                None
            }
        }
    })
}

/// Decoder plus ordered fan-out for one session
pub struct Pipeline {
    decoder: Decoder,
    subscribers: Vec<Box<dyn Subscriber>>,
    events: Arc<broadcast::Sender<Arc<DomainEvent>>>,
    updates_fed: u64,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a pipeline whose event stream buffers up to `capacity` events per
    /// receiver before lagging receivers start losing events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            decoder: Decoder::new(),
            subscribers: Vec::new(),
            events: Arc::new(events),
            updates_fed: 0,
        }
    }

    /// Register a subscriber. Subscribers are called in registration order.
    pub fn subscribe(&mut self, subscriber: impl Subscriber + 'static) -> &mut Self {
        self.subscribers.push(Box::new(subscriber));
        self
    }

    /// Stream of every event decoded after this call.
    ///
    /// Events a slow receiver misses are skipped with a warning.
    pub fn events(&self) -> impl Stream<Item = Arc<DomainEvent>> + Send + 'static {
        event_stream(self.events.subscribe())
    }

    /// Handle for subscribing to events without keeping the channel open.
    /// Streams end once the pipeline is dropped.
    pub(crate) fn event_source(&self) -> Weak<broadcast::Sender<Arc<DomainEvent>>> {
        Arc::downgrade(&self.events)
    }

    /// Process one update. Returns the number of events decoded.
    pub fn feed(&mut self, update: &Update) -> Result<usize> {
        for subscriber in &mut self.subscribers {
            subscriber.on_update(update)?;
        }

        let events = self.decoder.decode(update)?;
        for event in &events {
            for subscriber in &mut self.subscribers {
                subscriber.on_event(event)?;
            }
        }

        let count = events.len();
        for event in events {
            // No receivers is fine
            let _ = self.events.send(Arc::new(event));
        }
        self.updates_fed += 1;
        Ok(count)
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Number of updates fed so far
    pub fn updates_fed(&self) -> u64 {
        self.updates_fed
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("decoder", &self.decoder)
            .field("subscribers", &self.subscribers.len())
            .field("updates_fed", &self.updates_fed)
            .finish()
    }
}
