//! Raw feed updates and the capture record format

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, TimingError};

/// Feed category of an [`Update`].
///
/// The wire carries categories as opaque strings. Anything the decoder has no rules
/// for (heartbeats, weather, team radio, car telemetry) maps to
/// [`Category::Unrecognized`] and is dropped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// One-time composite snapshot sent on subscription
    Init,
    SessionInfo,
    DriverList,
    SessionData,
    RaceControlMessages,
    TimingData,
    TimingAppData,
    TimingStats,
    SessionStatus,
    TrackStatus,
    ExtrapolatedClock,
    Unrecognized,
}

impl Category {
    /// Map a wire category tag onto a known category.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "init" => Category::Init,
            "SessionInfo" => Category::SessionInfo,
            "DriverList" => Category::DriverList,
            "SessionData" => Category::SessionData,
            "RaceControlMessages" => Category::RaceControlMessages,
            "TimingData" => Category::TimingData,
            "TimingAppData" => Category::TimingAppData,
            "TimingStats" => Category::TimingStats,
            "SessionStatus" => Category::SessionStatus,
            "TrackStatus" => Category::TrackStatus,
            "ExtrapolatedClock" => Category::ExtrapolatedClock,
            _ => Category::Unrecognized,
        }
    }

    /// Wire tag for this category
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Init => "init",
            Category::SessionInfo => "SessionInfo",
            Category::DriverList => "DriverList",
            Category::SessionData => "SessionData",
            Category::RaceControlMessages => "RaceControlMessages",
            Category::TimingData => "TimingData",
            Category::TimingAppData => "TimingAppData",
            Category::TimingStats => "TimingStats",
            Category::SessionStatus => "SessionStatus",
            Category::TrackStatus => "TrackStatus",
            Category::ExtrapolatedClock => "ExtrapolatedClock",
            Category::Unrecognized => "unrecognized",
        }
    }
}

/// A single message crossing the boundary from any source.
///
/// This is the fundamental data unit that flows through the system. Everything
/// else (domain events, running order, interval snapshots) is derived from it.
///
/// `Update` owns its payload, so every clone is value-independent: a consumer
/// mutating its copy can never disturb the copy a provider retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Opaque category tag (see [`Category::parse`])
    pub category: String,

    /// Loosely-typed JSON payload
    pub payload: Value,

    /// Receipt timestamp in nanoseconds
    pub received_at: u64,

    /// Position in the source's stream, assigned nearest the ingestion boundary
    pub sequence: u64,
}

impl Update {
    /// Create a new update with sequence 0
    pub fn new(category: impl Into<String>, payload: Value, received_at: u64) -> Self {
        Self { category: category.into(), payload, received_at, sequence: 0 }
    }

    /// Replace the sequence number
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Parsed category tag
    pub fn kind(&self) -> Category {
        Category::parse(&self.category)
    }

    /// Parse one capture record of the form `<timestamp_ns>:<category>:<json-payload>`.
    ///
    /// Returns `Ok(None)` for a record with an empty body, which marks end of stream.
    /// `line` is only used for error reporting.
    pub fn parse_record(record: &str, line: usize) -> Result<Option<Self>> {
        let record = record.trim_end_matches(['\r', '\n']);
        if record.trim().is_empty() {
            return Ok(None);
        }

        let mut parts = record.splitn(3, ':');
        let (Some(timestamp), Some(category), Some(body)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(TimingError::capture(line, "expected <timestamp_ns>:<category>:<json>"));
        };

        let received_at = timestamp
            .parse::<u64>()
            .map_err(|e| TimingError::capture(line, format!("bad timestamp '{timestamp}': {e}")))?;

        let payload = serde_json::from_str(body)
            .map_err(|e| TimingError::capture(line, format!("bad {category} payload: {e}")))?;

        Ok(Some(Self::new(category, payload, received_at)))
    }

    /// Format this update as a capture record (without trailing newline)
    pub fn to_record(&self) -> String {
        format!("{}:{}:{}", self.received_at, self.category, self.payload)
    }
}
