//! Time-faithful replay of a recorded update stream
//!
//! [`ReplayProvider`] wraps any provider and hands its updates out with the spacing
//! of their original receipt timestamps, scaled by a speed multiplier and capped so
//! one long stoppage cannot stall playback. Time spent downstream between two
//! updates is subtracted from the next wait, so playback tracks the original
//! timeline instead of drifting late.
//!
//! An update pulled from the wrapped provider is held by the replay until it is
//! handed out, so a `next_update` call dropped mid-wait loses nothing: the next
//! call waits out the remainder of the same deadline.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::Result;
use crate::provider::Provider;
use crate::types::Update;

/// Slowest playback allowed; anything lower is raised to this
const MIN_MULTIPLIER: f64 = 0.01;

/// Replay pacing configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayOptions {
    /// Playback speed (1.0 = real time, 2.0 = double speed)
    pub multiplier: f64,

    /// Longest single wait between two updates
    pub max_wait: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self { multiplier: 1.0, max_wait: Duration::from_secs(5) }
    }
}

impl ReplayOptions {
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Real time to wait for a gap in source timestamps, before overhead is deducted
    pub fn wait_for(&self, gap: Duration) -> Duration {
        let scaled = gap.as_secs_f64() / self.effective_multiplier();
        Duration::from_secs_f64(scaled.min(self.max_wait.as_secs_f64()))
    }

    fn effective_multiplier(&self) -> f64 {
        if self.multiplier.is_finite() { self.multiplier.max(MIN_MULTIPLIER) } else { 1.0 }
    }
}

/// Provider wrapper that paces updates by their receipt timestamps
pub struct ReplayProvider<P> {
    inner: P,
    options: ReplayOptions,
    cancel: CancellationToken,

    /// Receipt timestamp of the last update handed out
    last_timestamp: Option<u64>,

    /// When the last update was handed out
    handed_out_at: Option<Instant>,

    /// Update pulled from the inner provider but not yet handed out, with its deadline
    pending: Option<(Update, Instant)>,
}

impl<P: Provider> ReplayProvider<P> {
    /// Replay at real-time speed
    pub fn new(inner: P) -> Self {
        Self::with_options(inner, ReplayOptions::default())
    }

    pub fn with_options(inner: P, options: ReplayOptions) -> Self {
        if !options.multiplier.is_finite() || options.multiplier < MIN_MULTIPLIER {
            warn!(multiplier = options.multiplier, "Replay multiplier out of range, clamping");
        }
        debug!(multiplier = options.multiplier, max_wait = ?options.max_wait, "Replay configured");

        Self {
            inner,
            options,
            cancel: CancellationToken::new(),
            last_timestamp: None,
            handed_out_at: None,
            pending: None,
        }
    }

    /// Abort pacing waits when `token` is cancelled. A cancelled replay ends its stream.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> ReplayOptions {
        self.options
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P> ReplayProvider<P> {
    /// When `update` is due, given the previous hand-out
    fn deadline_for(&self, update: &Update) -> Instant {
        let now = Instant::now();
        let (Some(last), Some(handed_out_at)) = (self.last_timestamp, self.handed_out_at) else {
            return now;
        };

        let gap = Duration::from_nanos(update.received_at.saturating_sub(last));
        let overhead = now.saturating_duration_since(handed_out_at);
        let wait = self.options.wait_for(gap).saturating_sub(overhead);
        trace!(gap = ?gap, overhead = ?overhead, wait = ?wait, "Replay pacing");
        now + wait
    }
}

#[async_trait::async_trait]
impl<P: Provider> Provider for ReplayProvider<P> {
    async fn next_update(&mut self) -> Result<Option<Update>> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        if self.pending.is_none() {
            let Some(update) = self.inner.next_update().await? else {
                return Ok(None);
            };
            let deadline = self.deadline_for(&update);
            self.pending = Some((update, deadline));
        }

        if let Some(deadline) = self.pending.as_ref().map(|(_, deadline)| *deadline) {
            if deadline > Instant::now() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        info!("Replay cancelled during wait");
                        return Ok(None);
                    }
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
        }

        let Some((update, _)) = self.pending.take() else {
            return Ok(None);
        };
        self.last_timestamp = Some(update.received_at);
        self.handed_out_at = Some(Instant::now());
        Ok(Some(update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryProvider;
    use serde_json::json;

    fn updates(timestamps: &[u64]) -> MemoryProvider {
        MemoryProvider::new(timestamps.iter().enumerate().map(|(i, ts)| {
            Update::new("Heartbeat", json!({}), *ts).with_sequence(i as u64)
        }))
    }

    /// Wall-clock gaps between consecutive updates
    async fn gaps(mut replay: ReplayProvider<MemoryProvider>) -> Vec<Duration> {
        let mut last = None;
        let mut gaps = Vec::new();
        while let Some(_) = replay.next_update().await.unwrap() {
            let now = Instant::now();
            if let Some(last) = last {
                gaps.push(now - last);
            }
            last = Some(now);
        }
        gaps
    }

    #[tokio::test(start_paused = true)]
    async fn preserves_original_spacing() {
        let replay = ReplayProvider::new(updates(&[0, 1_000_000_000, 1_100_000_000]));
        assert_eq!(gaps(replay).await, vec![Duration::from_secs(1), Duration::from_millis(100)]);
    }

    #[tokio::test(start_paused = true)]
    async fn first_update_is_immediate() {
        let start = Instant::now();
        let mut replay = ReplayProvider::new(updates(&[50_000_000_000]));
        replay.next_update().await.unwrap().unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn long_gaps_are_capped() {
        let replay = ReplayProvider::new(updates(&[0, 3_600_000_000_000]));
        assert_eq!(gaps(replay).await, vec![Duration::from_secs(5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn multiplier_scales_waits() {
        let options = ReplayOptions::default().with_multiplier(4.0);
        let replay = ReplayProvider::with_options(updates(&[0, 2_000_000_000]), options);
        assert_eq!(gaps(replay).await, vec![Duration::from_millis(500)]);
    }

    #[tokio::test(start_paused = true)]
    async fn downstream_time_is_deducted() {
        let mut replay = ReplayProvider::new(updates(&[0, 1_000_000_000]));
        replay.next_update().await.unwrap().unwrap();
        let start = Instant::now();

        // Slow consumer
        tokio::time::sleep(Duration::from_millis(300)).await;
        replay.next_update().await.unwrap().unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_wait() {
        let cancel = CancellationToken::new();
        let mut replay =
            ReplayProvider::new(updates(&[0, 4_000_000_000])).with_cancellation(cancel.clone());
        replay.next_update().await.unwrap().unwrap();

        let start = Instant::now();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
        assert!(replay.next_update().await.unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_wait_keeps_the_update() {
        let mut replay = ReplayProvider::new(updates(&[0, 2_000_000_000]));
        replay.next_update().await.unwrap().unwrap();

        let interrupted =
            tokio::time::timeout(Duration::from_millis(500), replay.next_update()).await;
        assert!(interrupted.is_err());

        // Same update, same deadline
        let start = Instant::now();
        let update = replay.next_update().await.unwrap().unwrap();
        assert_eq!(update.sequence, 1);
        assert_eq!(start.elapsed(), Duration::from_millis(1_500));
    }

    #[test]
    fn waits_never_exceed_cap_even_when_slowed() {
        let options = ReplayOptions::default().with_multiplier(0.1);
        assert_eq!(options.wait_for(Duration::from_secs(2)), Duration::from_secs(5));
        let broken = ReplayOptions::default().with_multiplier(f64::NAN);
        assert_eq!(broken.wait_for(Duration::from_secs(2)), Duration::from_secs(2));
    }
}
