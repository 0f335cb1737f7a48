//! Recording provider with resume support
//!
//! [`HistoryProvider`] numbers every update it pulls from the wrapped provider,
//! appends it to a shared [`History`] and forwards it unchanged, without pacing.
//! [`HistoryProvider::resume_from`] splits the recording at a sequence: everything
//! up to it is returned for rebuilding state, and a continuation provider yields
//! the rest followed by whatever the wrapped provider produces next.

use std::collections::VecDeque;

use tracing::{info, trace};

use crate::history::History;
use crate::provider::Provider;
use crate::types::Update;
use crate::{Result, TimingError};

/// Provider wrapper that records everything it forwards
pub struct HistoryProvider<P> {
    inner: P,
    history: History,
    next_sequence: u64,
    /// Recorded updates still to be handed out after a resume
    backlog: VecDeque<Update>,
}

impl<P: Provider> HistoryProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner, history: History::new(), next_sequence: 0, backlog: VecDeque::new() }
    }

    /// Shared handle to the recording
    pub fn history(&self) -> History {
        self.history.clone()
    }

    /// Split the recording at `sequence`.
    ///
    /// Returns the recorded updates up to and including `sequence`, in order, and a
    /// provider that continues at `sequence + 1`. Feed the former into a fresh
    /// pipeline before attaching the latter.
    pub fn resume_from(self, sequence: u64) -> Result<(Vec<Update>, HistoryProvider<P>)> {
        if !self.history.contains(sequence) {
            let recorded = self.history.last_sequence();
            return Err(TimingError::SequenceNotFound { sequence, recorded });
        }

        let replay = self.history.updates_through(sequence);
        let backlog: VecDeque<Update> = self.history.updates_after(sequence).into();
        info!(
            sequence,
            replay = replay.len(),
            backlog = backlog.len(),
            "Resuming from recorded sequence"
        );

        let continuation = HistoryProvider {
            inner: self.inner,
            history: self.history,
            next_sequence: self.next_sequence,
            backlog,
        };
        Ok((replay, continuation))
    }
}

#[async_trait::async_trait]
impl<P: Provider> Provider for HistoryProvider<P> {
    async fn next_update(&mut self) -> Result<Option<Update>> {
        if let Some(update) = self.backlog.pop_front() {
            return Ok(Some(update));
        }

        let Some(update) = self.inner.next_update().await? else {
            return Ok(None);
        };

        let update = update.with_sequence(self.next_sequence);
        self.next_sequence += 1;
        self.history.record(update.clone());
        trace!(sequence = update.sequence, "Forwarding recorded update");
        Ok(Some(update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryProvider;
    use serde_json::json;

    fn source(count: u64) -> MemoryProvider {
        // Source sequences are deliberately not the ones the recorder assigns
        MemoryProvider::new((0..count).map(|i| {
            Update::new("Heartbeat", json!({"n": i}), i * 100).with_sequence(1000 + i)
        }))
    }

    async fn drain<P: Provider>(provider: &mut P) -> Vec<u64> {
        let mut sequences = Vec::new();
        while let Some(update) = provider.next_update().await.unwrap() {
            sequences.push(update.sequence);
        }
        sequences
    }

    #[tokio::test]
    async fn assigns_sequences_and_records() {
        let mut provider = HistoryProvider::new(source(3));
        assert_eq!(drain(&mut provider).await, vec![0, 1, 2]);

        let history = provider.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history.updates_through(0)[0].payload, json!({"n": 0}));
    }

    #[tokio::test]
    async fn resume_splits_at_sequence() {
        let mut provider = HistoryProvider::new(source(6));
        for _ in 0..4 {
            provider.next_update().await.unwrap();
        }

        let (replay, mut continuation) = provider.resume_from(2).unwrap();
        assert_eq!(replay.iter().map(|u| u.sequence).collect::<Vec<_>>(), vec![0, 1, 2]);

        // Recorded backlog first, then the still-pending live updates
        assert_eq!(drain(&mut continuation).await, vec![3, 4, 5]);
        assert_eq!(continuation.history().len(), 6);
    }

    #[tokio::test]
    async fn resume_requires_a_recorded_sequence() {
        let mut provider = HistoryProvider::new(source(2));
        provider.next_update().await.unwrap();

        let err = provider.resume_from(5).err().unwrap();
        assert!(matches!(err, TimingError::SequenceNotFound { sequence: 5, recorded: Some(0) }));
    }
}
