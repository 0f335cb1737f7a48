//! Translation of raw feed updates into typed domain events.
//!
//! The feed encodes the same logical collection as either an ordered list (full
//! snapshots) or an index-keyed mapping (incremental updates), omits fields that did
//! not change, and signals meaning through which keys are present. [`Decoder`]
//! normalizes all of that into [`DomainEvent`]s emitted in a fixed order.
//!
//! Decoding is synchronous. The only state a decoder keeps across updates is the set
//! of drivers already announced, the highest stint seen per driver and the current
//! track layout; everything else is a pure function of the payload.
//!
//! ```rust
//! use livetiming::decoder::Decoder;
//! use livetiming::types::{DomainEvent, Update};
//! use serde_json::json;
//!
//! let mut decoder = Decoder::new();
//! let update = Update::new("TimingData", json!({"Lines": {"44": {"Position": "3"}}}), 0);
//! let events = decoder.decode(&update)?;
//! assert!(matches!(
//!     events[0],
//!     DomainEvent::DriverPosition(ref p) if p.driver_id == 44 && p.position == 3
//! ));
//! # Ok::<(), livetiming::TimingError>(())
//! ```

mod roster;
mod session;
mod shape;
mod timing;

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::Result;
use crate::types::{Category, DomainEvent, SessionConfig, Update};
use shape::Shape;

/// Stateful decoder for one session's updates.
///
/// Create a fresh decoder per session; reusing one across sessions would suppress
/// the new session's roster for any driver number already seen.
#[derive(Debug, Default)]
pub struct Decoder {
    /// Driver numbers already announced in a roster event
    roster: BTreeSet<u32>,
    /// Highest stint number seen per driver
    stints: HashMap<u32, u32>,
    layout: Option<SessionConfig>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one update into zero or more events.
    ///
    /// Unrecognized categories yield an empty list. A recognized category whose
    /// payload does not match its wire shape fails with
    /// [`TimingError::Malformed`](crate::TimingError::Malformed).
    pub fn decode(&mut self, update: &Update) -> Result<Vec<DomainEvent>> {
        let category = update.kind();
        let payload = &update.payload;
        let mut events = Vec::new();

        match category {
            Category::Init => self.decode_init(payload, &mut events)?,
            Category::DriverList => self.decode_roster(payload, &mut events)?,
            Category::SessionInfo => session::session_info(payload, &mut events)?,
            Category::SessionData => session::session_data(payload, &mut events)?,
            Category::RaceControlMessages => session::race_control(payload, &mut events)?,
            Category::SessionStatus => session::session_status(payload, &mut events)?,
            Category::TrackStatus => session::track_status(payload, &mut events)?,
            Category::ExtrapolatedClock => session::clock(payload, &mut events)?,
            Category::TimingData => {
                self.decode_layout(Shape::of(category), payload, &mut events)?;
                timing::timing_data(payload, &mut events)?;
            }
            Category::TimingAppData | Category::TimingStats => {
                self.decode_stints(Shape::of(category), payload, &mut events)?
            }
            Category::Unrecognized => {
                trace!(category = %update.category, "Ignoring unrecognized category");
            }
        }

        trace!(
            category = %update.category,
            sequence = update.sequence,
            events = events.len(),
            "Decoded update"
        );
        Ok(events)
    }

    /// Track layout derived so far, if any
    pub fn session_config(&self) -> Option<&SessionConfig> {
        self.layout.as_ref()
    }

    /// Whether any roster has been decoded yet
    pub fn is_roster_seeded(&self) -> bool {
        !self.roster.is_empty()
    }

    /// Highest stint number seen for a driver
    pub fn highest_stint(&self, driver: u32) -> Option<u32> {
        self.stints.get(&driver).copied()
    }

    /// The composite snapshot sent once on subscription.
    ///
    /// Parts are decoded in a fixed order: roster, session, stints, progress, race
    /// control (when present), layout, then session status, track status and clock
    /// when present.
    fn decode_init(
        &mut self,
        payload: &serde_json::Value,
        events: &mut Vec<DomainEvent>,
    ) -> Result<()> {
        let shape = Shape::of(Category::Init);
        let parts = shape.object(payload, "init snapshot")?;

        self.decode_roster(shape.field(parts, "DriverList")?, events)?;
        session::session_info(shape.field(parts, "SessionInfo")?, events)?;
        let stints = shape.field(parts, "TimingAppData")?;
        self.decode_stints(Shape::of(Category::TimingAppData), stints, events)?;
        session::session_data(shape.field(parts, "SessionData")?, events)?;
        if let Some(messages) = parts.get("RaceControlMessages") {
            session::race_control(messages, events)?;
        }
        let sample = shape.field(parts, "TimingData")?;
        self.decode_layout(Shape::of(Category::TimingData), sample, events)?;

        if let Some(status) = parts.get("SessionStatus") {
            session::session_status(status, events)?;
        }
        if let Some(status) = parts.get("TrackStatus") {
            session::track_status(status, events)?;
        }
        if let Some(clock) = parts.get("ExtrapolatedClock") {
            session::clock(clock, events)?;
        }
        Ok(())
    }

    fn decode_layout(
        &mut self,
        shape: Shape,
        payload: &serde_json::Value,
        events: &mut Vec<DomainEvent>,
    ) -> Result<()> {
        // Derived once per session, from the first well-formed sample
        if self.layout.is_some() {
            return Ok(());
        }
        let Some(config) = timing::derive_layout(shape, payload)? else {
            return Ok(());
        };

        debug!(layout = ?config.layout, "Track layout derived");
        self.layout = Some(config.clone());
        events.push(DomainEvent::SessionConfig(config));
        Ok(())
    }
}
