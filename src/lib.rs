//! Type-safe decoding, replay and resynchronization of live motorsport timing feeds.
//!
//! The live timing feed is a stream of loosely-typed JSON messages whose shape
//! depends on context: collections arrive as lists on full snapshots and as
//! index-keyed mappings on deltas, unchanged fields are omitted, and meaning is
//! carried by which keys are present. This crate turns that stream into typed
//! [`DomainEvent`]s and a running order that stays consistent update after update.
//!
//! # Features
//!
//! - **Decoding**: [`decoder::Decoder`] normalizes every payload shape into ordered, typed events
//! - **Running order**: [`tracker::PositionTracker`] rebuilds positions from single-driver updates
//! - **Replay**: [`providers::ReplayProvider`] re-emits captures with their original pacing
//! - **Resynchronization**: [`providers::HistoryProvider`] and [`history::History`] locate an
//!   observed interval snapshot in a recording and resume from it
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use livetiming::{LiveTiming, ReplayOptions, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> livetiming::Result<()> {
//!     let connection = LiveTiming::replay("race.txt", ReplayOptions::default()).await?;
//!     let mut standings = connection.standings(UpdateRate::Max(2));
//!
//!     while let Some(order) = standings.next().await {
//!         let leader = order.first().map(|line| line.broadcast_name.as_str());
//!         println!("Leader: {}", leader.unwrap_or("-"));
//!     }
//!     Ok(())
//! }
//! ```

mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoding and derived state
pub mod decoder;
pub mod history;
pub mod pipeline;
pub mod tracker;

// Stream-based source architecture
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use connection::{ConnectionState, Standings, TimingConnection};
pub use decoder::Decoder;
pub use history::{History, ResyncMatch};
pub use pipeline::{Pipeline, Subscriber};
pub use provider::Provider;
pub use providers::ReplayOptions;
pub use tracker::{PositionChange, PositionTracker, TimingLine};

/// Unified entry point for timing connections.
///
/// # Examples
///
/// ## Decode a capture as fast as possible
/// ```rust,no_run
/// use livetiming::LiveTiming;
///
/// #[tokio::main]
/// async fn main() -> livetiming::Result<()> {
///     let connection = LiveTiming::open("race.txt").await?;
///     connection.finished().await;
///     for line in connection.current_standings().iter() {
///         println!("{:?} {}", line.position, line.broadcast_name);
///     }
///     Ok(())
/// }
/// ```
///
/// ## Replay at double speed
/// ```rust,no_run
/// use livetiming::{LiveTiming, ReplayOptions};
///
/// #[tokio::main]
/// async fn main() -> livetiming::Result<()> {
///     let options = ReplayOptions::default().with_multiplier(2.0);
///     let connection = LiveTiming::replay("race.txt", options).await?;
///     Ok(())
/// }
/// ```
pub struct LiveTiming;

impl LiveTiming {
    /// Open a capture file and decode it without pacing.
    ///
    /// `"-"` reads the capture from standard input.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or is not readable.
    pub async fn open<P: AsRef<std::path::Path>>(path: P) -> Result<TimingConnection> {
        TimingConnection::open(path).await
    }

    /// Open a capture file and replay it with its original pacing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or is not readable.
    pub async fn replay<P: AsRef<std::path::Path>>(
        path: P,
        options: ReplayOptions,
    ) -> Result<TimingConnection> {
        TimingConnection::replay(path, options).await
    }
}
