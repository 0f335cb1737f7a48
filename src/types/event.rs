//! Typed domain events decoded from feed updates

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Interval, StatusBits};

/// The session being broadcast changed (or its archive status did)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SessionChange {
    pub meeting: String,
    pub session: String,
    pub archive_status: String,
}

/// How far through the session we are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum SessionProgress {
    /// Current lap of a race or sprint
    Lap(u32),
    /// Qualifying part, 1 to 3
    Qualifying(u32),
}

/// A message from race control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct RaceControlMessage {
    pub category: String,
    pub flag: Option<String>,
    pub scope: Option<String>,
    pub message: String,
    pub lap: Option<u32>,
    pub sector: Option<u32>,
}

/// Session lifecycle status ("Started", "Finished", "Finalised", ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SessionStatusEvent {
    pub status: String,
}

/// Track condition (green, yellow, safety car, red)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TrackStatusEvent {
    pub id: u32,
    pub message: String,
}

/// Remaining session time as published by the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ClockEvent {
    pub remaining: String,
}

/// One entry of the driver roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Driver {
    pub number: u32,
    pub broadcast_name: String,
    pub team_name: Option<String>,
    /// Hex code for the team's primary color
    pub team_color: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Status of a driver in one mini-sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SegmentTimingDatum {
    pub driver_id: u32,
    /// 1-based
    pub sector: u32,
    /// 1-based within the sector
    pub segment: u32,
    pub status: StatusBits,
}

/// A completed sector time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SectorTimingDatum {
    pub driver_id: u32,
    /// 1-based
    pub sector: u32,
    pub personal_fastest: bool,
    /// Set while the driver holds the sector's fastest time, even from an earlier lap
    pub overall_fastest: bool,
    /// Seconds
    pub time: f64,
}

/// A completed lap time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct LapTimingDatum {
    pub driver_id: u32,
    pub lap: u32,
    pub personal_fastest: bool,
    pub overall_fastest: bool,
    /// Seconds
    pub time: f64,
}

/// Gap to the car immediately ahead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct IntervalTimingDatum {
    pub driver_id: u32,
    pub interval: Interval,
}

/// Partial status change for a driver. `None` fields were not part of the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DriverStatusUpdate {
    pub driver_id: u32,
    /// 1-based sector the status applies to, when sector-specific
    pub sector: Option<u32>,
    pub retired: Option<bool>,
    pub stopped: Option<bool>,
    pub status: Option<StatusBits>,
}

/// A single driver's new running position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DriverPositionUpdate {
    pub driver_id: u32,
    /// 1-based
    pub position: u32,
}

/// A driver's tyre stint started, or an earlier stint was corrected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct StintChange {
    pub driver_id: u32,
    /// 1-based
    pub stint: u32,
    pub compound: String,
    /// False when this restates or corrects a stint already seen
    pub is_new: bool,
}

/// Track layout: number of segments in each 1-based sector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SessionConfig {
    pub layout: BTreeMap<u32, usize>,
}

/// Discriminant of a [`DomainEvent`], for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum EventKind {
    SessionChange,
    SessionProgress,
    RaceControl,
    SessionStatus,
    TrackStatus,
    Clock,
    Roster,
    SegmentTiming,
    SectorTiming,
    LapTiming,
    IntervalTiming,
    DriverStatus,
    DriverPosition,
    StintChange,
    SessionConfig,
}

/// Everything the decoder can tell a subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum DomainEvent {
    SessionChange(SessionChange),
    SessionProgress(SessionProgress),
    RaceControl(RaceControlMessage),
    SessionStatus(SessionStatusEvent),
    TrackStatus(TrackStatusEvent),
    Clock(ClockEvent),
    /// Drivers not previously seen this session
    Roster(Vec<Driver>),
    SegmentTiming(SegmentTimingDatum),
    SectorTiming(SectorTimingDatum),
    LapTiming(LapTimingDatum),
    IntervalTiming(IntervalTimingDatum),
    DriverStatus(DriverStatusUpdate),
    DriverPosition(DriverPositionUpdate),
    StintChange(StintChange),
    SessionConfig(SessionConfig),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::SessionChange(_) => EventKind::SessionChange,
            DomainEvent::SessionProgress(_) => EventKind::SessionProgress,
            DomainEvent::RaceControl(_) => EventKind::RaceControl,
            DomainEvent::SessionStatus(_) => EventKind::SessionStatus,
            DomainEvent::TrackStatus(_) => EventKind::TrackStatus,
            DomainEvent::Clock(_) => EventKind::Clock,
            DomainEvent::Roster(_) => EventKind::Roster,
            DomainEvent::SegmentTiming(_) => EventKind::SegmentTiming,
            DomainEvent::SectorTiming(_) => EventKind::SectorTiming,
            DomainEvent::LapTiming(_) => EventKind::LapTiming,
            DomainEvent::IntervalTiming(_) => EventKind::IntervalTiming,
            DomainEvent::DriverStatus(_) => EventKind::DriverStatus,
            DomainEvent::DriverPosition(_) => EventKind::DriverPosition,
            DomainEvent::StintChange(_) => EventKind::StintChange,
            DomainEvent::SessionConfig(_) => EventKind::SessionConfig,
        }
    }

    /// The driver a per-driver event is about
    pub fn driver_id(&self) -> Option<u32> {
        match self {
            DomainEvent::SegmentTiming(d) => Some(d.driver_id),
            DomainEvent::SectorTiming(d) => Some(d.driver_id),
            DomainEvent::LapTiming(d) => Some(d.driver_id),
            DomainEvent::IntervalTiming(d) => Some(d.driver_id),
            DomainEvent::DriverStatus(d) => Some(d.driver_id),
            DomainEvent::DriverPosition(d) => Some(d.driver_id),
            DomainEvent::StintChange(d) => Some(d.driver_id),
            _ => None,
        }
    }
}
