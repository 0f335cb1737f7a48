//! Recorded update history and interval snapshot timeline.
//!
//! A [`History`] is a shared, append-only record of every update that passed
//! through a [`HistoryProvider`](crate::providers::HistoryProvider), plus a
//! timeline of per-driver interval snapshots written by an [`IntervalRecorder`]
//! subscribed to the same pipeline.
//!
//! Each snapshot is a full copy of its predecessor with one driver's interval
//! replaced. That costs memory proportional to session length times field size,
//! which for a single session (a few thousand interval changes over twenty cars)
//! stays in the low megabytes.
//!
//! Resynchronization searches the timeline for the point that best matches an
//! observed, possibly partial, set of intervals:
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use livetiming::history::History;
//! use livetiming::types::Interval;
//!
//! let history = History::new();
//! history.record_interval(3, 44, Interval::from_millis(687));
//! history.record_interval(4, 16, Interval::from_millis(1_203));
//!
//! let observed =
//!     BTreeMap::from([(44, Interval::from_millis(687)), (16, Interval::from_millis(1_203))]);
//! let found = history.find(&observed)?;
//! assert_eq!((found.sequence, found.score), (4, 2));
//! # Ok::<(), livetiming::TimingError>(())
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{debug, trace};

use crate::pipeline::Subscriber;
use crate::types::{DomainEvent, Interval, Update};
use crate::{Result, TimingError};

/// Intervals to the car ahead, by driver number
pub type Intervals = BTreeMap<u32, Interval>;

/// Interval state as of one sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub sequence: u64,
    pub intervals: Arc<Intervals>,
}

/// Best timeline entry for an observed sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResyncMatch {
    pub sequence: u64,
    /// Number of observed drivers whose interval matched exactly
    pub score: usize,
    /// Size of the observed sample
    pub observed: usize,
}

impl ResyncMatch {
    /// Every observed driver matched
    pub fn is_exact(&self) -> bool {
        self.score == self.observed
    }
}

#[derive(Debug, Default)]
struct HistoryLog {
    updates: Vec<Update>,
    timeline: Vec<Snapshot>,
}

/// Cloneable handle to a shared history.
///
/// One writer appends, any number of readers search. Entries are never modified
/// once a later sequence has been written.
#[derive(Debug, Clone, Default)]
pub struct History {
    log: Arc<RwLock<HistoryLog>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    // Every write is a single push or insert, so a poisoned log is still consistent
    fn read(&self) -> RwLockReadGuard<'_, HistoryLog> {
        self.log.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HistoryLog> {
        self.log.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an update. Sequences must be strictly increasing.
    pub(crate) fn record(&self, update: Update) {
        trace!(sequence = update.sequence, category = %update.category, "Recorded update");
        self.write().updates.push(update);
    }

    /// Write a snapshot at `sequence`: the latest snapshot with `driver` set to
    /// `interval`.
    ///
    /// Several writes at the same sequence supersede each other, leaving one entry.
    /// Writes older than the latest snapshot are ignored, since that point in the
    /// timeline is already final.
    pub fn record_interval(&self, sequence: u64, driver: u32, interval: Interval) {
        let mut log = self.write();
        let timeline = &mut log.timeline;
        match timeline.last().map(|tail| tail.sequence) {
            Some(latest) if latest > sequence => {
                trace!(sequence, latest, "Ignoring stale interval write");
            }
            Some(latest) if latest == sequence => {
                if let Some(tail) = timeline.last_mut() {
                    Arc::make_mut(&mut tail.intervals).insert(driver, interval);
                }
            }
            _ => {
                let mut intervals = timeline
                    .last()
                    .map(|tail| Intervals::clone(&tail.intervals))
                    .unwrap_or_default();
                intervals.insert(driver, interval);
                timeline.push(Snapshot { sequence, intervals: Arc::new(intervals) });
            }
        }
    }

    /// Find the snapshot matching the most observed intervals exactly.
    ///
    /// Drivers missing from a snapshot score nothing. The scan stops at the first
    /// perfect match; otherwise the earliest of the best-scoring snapshots wins.
    /// Fails with [`TimingError::NoMatch`] when nothing matches at all.
    pub fn find(&self, observed: &Intervals) -> Result<ResyncMatch> {
        let log = self.read();
        let mut best: Option<ResyncMatch> = None;

        for snapshot in &log.timeline {
            let score = observed
                .iter()
                .filter(|(driver, interval)| snapshot.intervals.get(*driver) == Some(*interval))
                .count();

            if score > best.map_or(0, |b| b.score) {
                best = Some(ResyncMatch {
                    sequence: snapshot.sequence,
                    score,
                    observed: observed.len(),
                });
                if score == observed.len() {
                    break;
                }
            }
        }

        match best {
            Some(found) => {
                debug!(
                    sequence = found.sequence,
                    score = found.score,
                    observed = observed.len(),
                    "Resync match"
                );
                Ok(found)
            }
            None => Err(TimingError::NoMatch { snapshots: log.timeline.len() }),
        }
    }

    /// Interval state as of `sequence` (the latest snapshot at or before it)
    pub fn snapshot_at(&self, sequence: u64) -> Option<Arc<Intervals>> {
        let log = self.read();
        let after = log.timeline.partition_point(|s| s.sequence <= sequence);
        after.checked_sub(1).map(|index| Arc::clone(&log.timeline[index].intervals))
    }

    /// Recorded updates with sequence at or before `sequence`, in order
    pub fn updates_through(&self, sequence: u64) -> Vec<Update> {
        let log = self.read();
        let end = log.updates.partition_point(|u| u.sequence <= sequence);
        log.updates[..end].to_vec()
    }

    /// Recorded updates after `sequence`, in order
    pub fn updates_after(&self, sequence: u64) -> Vec<Update> {
        let log = self.read();
        let start = log.updates.partition_point(|u| u.sequence <= sequence);
        log.updates[start..].to_vec()
    }

    /// Highest recorded sequence
    pub fn last_sequence(&self) -> Option<u64> {
        self.read().updates.last().map(|u| u.sequence)
    }

    pub fn contains(&self, sequence: u64) -> bool {
        let log = self.read();
        log.updates.binary_search_by_key(&sequence, |u| u.sequence).is_ok()
    }

    /// Number of recorded updates
    pub fn len(&self) -> usize {
        self.read().updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().updates.is_empty()
    }

    /// Number of snapshots in the timeline
    pub fn snapshot_count(&self) -> usize {
        self.read().timeline.len()
    }

    /// Subscriber that writes interval events into this history's timeline
    pub fn interval_recorder(&self) -> IntervalRecorder {
        IntervalRecorder { history: self.clone(), sequence: None }
    }
}

/// Pipeline subscriber feeding the snapshot timeline.
///
/// Snapshots are stamped with the sequence of the update being decoded, which the
/// recorder learns from [`Subscriber::on_update`] before any event of that update
/// arrives.
#[derive(Debug, Clone)]
pub struct IntervalRecorder {
    history: History,
    sequence: Option<u64>,
}

impl Subscriber for IntervalRecorder {
    fn on_update(&mut self, update: &Update) -> Result<()> {
        self.sequence = Some(update.sequence);
        Ok(())
    }

    fn on_event(&mut self, event: &DomainEvent) -> Result<()> {
        if let (DomainEvent::IntervalTiming(gap), Some(sequence)) = (event, self.sequence) {
            self.history.record_interval(sequence, gap.driver_id, gap.interval);
        }
        Ok(())
    }
}
