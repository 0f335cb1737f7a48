//! Session-level categories: info, progress, race control, status and clock

use serde::Deserialize;
use serde_json::Value;

use super::shape::Shape;
use crate::Result;
use crate::types::{
    Category, ClockEvent, DomainEvent, RaceControlMessage, SessionChange, SessionProgress,
    SessionStatusEvent, TrackStatusEvent,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Archive {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireSessionInfo {
    meeting: Named,
    name: String,
    archive_status: Archive,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireMessage {
    category: String,
    flag: Option<String>,
    scope: Option<String>,
    message: String,
    lap: Option<u32>,
    sector: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireTrackStatus {
    status: String,
    message: String,
}

pub(super) fn session_info(payload: &Value, events: &mut Vec<DomainEvent>) -> Result<()> {
    let shape = Shape::of(Category::SessionInfo);
    let info: WireSessionInfo = shape.record(payload, "SessionInfo")?;
    events.push(DomainEvent::SessionChange(SessionChange {
        meeting: info.meeting.name,
        session: info.name,
        archive_status: info.archive_status.status,
    }));
    Ok(())
}

/// Only the newest entry of the progress series matters.
pub(super) fn session_data(payload: &Value, events: &mut Vec<DomainEvent>) -> Result<()> {
    let shape = Shape::of(Category::SessionData);
    let data = shape.object(payload, "SessionData")?;
    let Some(series) = data.get("Series") else {
        return Ok(());
    };
    let Some((_, latest)) = shape.indexed(series, "Series")?.pop() else {
        return Ok(());
    };

    let latest = shape.object(latest, "Series entry")?;
    let progress = if let Some(lap) = latest.get("Lap") {
        SessionProgress::Lap(shape.number(lap, "Lap")?)
    } else if let Some(part) = latest.get("QualifyingPart") {
        SessionProgress::Qualifying(shape.number(part, "QualifyingPart")?)
    } else {
        return Err(shape.malformed("Series entry has neither Lap nor QualifyingPart"));
    };
    events.push(DomainEvent::SessionProgress(progress));
    Ok(())
}

/// Messages arrive as a list first and as a mapping keyed by increasing numbers
/// afterwards; both are emitted in ascending index order.
pub(super) fn race_control(payload: &Value, events: &mut Vec<DomainEvent>) -> Result<()> {
    let shape = Shape::of(Category::RaceControlMessages);
    let container = shape.object(payload, "RaceControlMessages")?;
    let messages = shape.field(container, "Messages")?;

    for (_, message) in shape.indexed(messages, "Messages")? {
        let message: WireMessage = shape.record(message, "race control message")?;
        events.push(DomainEvent::RaceControl(RaceControlMessage {
            category: message.category,
            flag: message.flag,
            scope: message.scope,
            message: message.message,
            lap: message.lap,
            sector: message.sector,
        }));
    }
    Ok(())
}

pub(super) fn session_status(payload: &Value, events: &mut Vec<DomainEvent>) -> Result<()> {
    let shape = Shape::of(Category::SessionStatus);
    let object = shape.object(payload, "SessionStatus")?;
    let status = shape.string(shape.field(object, "Status")?, "Status")?;
    events.push(DomainEvent::SessionStatus(SessionStatusEvent { status: status.to_string() }));
    Ok(())
}

pub(super) fn track_status(payload: &Value, events: &mut Vec<DomainEvent>) -> Result<()> {
    let shape = Shape::of(Category::TrackStatus);
    let status: WireTrackStatus = shape.record(payload, "TrackStatus")?;
    let id = status
        .status
        .trim()
        .parse()
        .map_err(|_| shape.malformed(format!("Status is not numeric: '{}'", status.status)))?;
    events.push(DomainEvent::TrackStatus(TrackStatusEvent { id, message: status.message }));
    Ok(())
}

pub(super) fn clock(payload: &Value, events: &mut Vec<DomainEvent>) -> Result<()> {
    let shape = Shape::of(Category::ExtrapolatedClock);
    let object = shape.object(payload, "ExtrapolatedClock")?;
    // Clock updates that only toggle `Extrapolating` carry no remaining time
    let Some(remaining) = object.get("Remaining") else {
        return Ok(());
    };
    let remaining = shape.string(remaining, "Remaining")?;
    events.push(DomainEvent::Clock(ClockEvent { remaining: remaining.to_string() }));
    Ok(())
}
