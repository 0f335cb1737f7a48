//! Core types for timing feed representation.
//!
//! This module provides the data structures that cross component boundaries:
//!
//! - [`Update`] is the raw unit every source yields: category tag, JSON payload,
//!   receipt timestamp and sequence number
//! - [`DomainEvent`] and its payload structs are the typed vocabulary the decoder emits
//! - [`Interval`] holds a gap-to-car-ahead exactly, in milliseconds
//! - [`StatusBits`] carries the feed's undocumented status flags through unresolved
//! - [`UpdateRate`] controls how often derived-state streams publish
//!
//! ## Usage Example
//!
//! ```rust
//! use livetiming::types::{Category, Update};
//! use serde_json::json;
//!
//! let update = Update::new("TrackStatus", json!({"Status": "4", "Message": "SCDeployed"}), 0);
//! assert_eq!(update.kind(), Category::TrackStatus);
//! ```

mod bitfield;
mod event;
mod interval;
mod update;
mod update_rate;

pub use bitfield::StatusBits;
pub use event::{
    ClockEvent, DomainEvent, Driver, DriverPositionUpdate, DriverStatusUpdate, EventKind,
    IntervalTimingDatum, LapTimingDatum, RaceControlMessage, SectorTimingDatum,
    SegmentTimingDatum, SessionChange, SessionConfig, SessionProgress, SessionStatusEvent,
    StintChange, TrackStatusEvent,
};
pub use interval::{Interval, InvalidInterval};
pub use update::{Category, Update};
pub use update_rate::UpdateRate;
