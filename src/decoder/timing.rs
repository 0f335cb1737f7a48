//! Per-driver timing lines: positions, intervals, laps, sectors and segments
//!
//! A sector sub-record says what it is through which keys are present. Each one is
//! classified into a [`SectorRecord`] before any event is built, in this priority:
//! stopped marker, superseded value, plain time, segment breakdown.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::shape::{Shape, parse_seconds};
use crate::Result;
use crate::types::{
    Category, DomainEvent, DriverPositionUpdate, DriverStatusUpdate, Interval, IntervalTimingDatum,
    LapTimingDatum, SectorTimingDatum, SegmentTimingDatum, SessionConfig, StatusBits,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireLapTime {
    #[serde(default)]
    value: String,
    #[serde(default)]
    personal_fastest: bool,
    #[serde(default)]
    overall_fastest: bool,
}

/// What one sector sub-record of a timing line carries
#[derive(Debug, PartialEq)]
enum SectorRecord<'a> {
    /// Car stopped on track in this sector
    Stopped,
    /// Restates the previous lap's time as it is replaced; carries nothing new
    Superseded,
    /// A completed sector time
    Time { seconds: f64, personal_fastest: bool, overall_fastest: bool },
    /// Mini-sector statuses, by 0-based segment index
    Segments(Vec<(usize, &'a Value)>),
    /// Nothing decodable (cleared value, or flags alone)
    Empty,
}

impl<'a> SectorRecord<'a> {
    fn classify(shape: &Shape, record: &'a Map<String, Value>) -> Result<Self> {
        // The marker's presence is the tag, whatever its value
        if record.contains_key("Stopped") {
            return Ok(SectorRecord::Stopped);
        }
        if record.contains_key("PreviousValue") {
            return Ok(SectorRecord::Superseded);
        }
        match record.get("Segments") {
            Some(segments) => Ok(SectorRecord::Segments(shape.indexed(segments, "Segments")?)),
            None => {
                let value = match record.get("Value") {
                    Some(value) => shape.string(value, "sector Value")?,
                    None => "",
                };
                Ok(match parse_seconds(shape, value, "sector Value")? {
                    Some(seconds) => SectorRecord::Time {
                        seconds,
                        personal_fastest: record.contains_key("PersonalFastest"),
                        overall_fastest: record.contains_key("OverallFastest"),
                    },
                    None => SectorRecord::Empty,
                })
            }
        }
    }
}

/// Decode every driver line of a timing message, in ascending driver order.
///
/// Per line the order is position, interval, lap, then sectors (or the line-level
/// status when no sectors are present).
pub(super) fn timing_data(payload: &Value, events: &mut Vec<DomainEvent>) -> Result<()> {
    let shape = Shape::of(Category::TimingData);
    let timing = shape.object(payload, "TimingData")?;
    let Some(lines) = timing.get("Lines") else {
        return Ok(());
    };

    for (driver_id, line) in shape.by_driver(lines, "Lines")? {
        let line = shape.object(line, "timing line")?;
        decode_line(&shape, driver_id, line, events)?;
    }
    Ok(())
}

fn decode_line(
    shape: &Shape,
    driver_id: u32,
    line: &Map<String, Value>,
    events: &mut Vec<DomainEvent>,
) -> Result<()> {
    if let Some(position) = line.get("Position") {
        if let Some(position) = shape.optional_number(position, "Position")? {
            events.push(DomainEvent::DriverPosition(DriverPositionUpdate { driver_id, position }));
        }
    }

    if let Some(interval) = line.get("IntervalToPositionAhead") {
        let interval = shape.object(interval, "IntervalToPositionAhead")?;
        // Leader and lapped cars carry text ("LAP 52", "1L") instead of a gap
        if let Some(value) = interval.get("Value") {
            if let Some(interval) = Interval::parse_wire(shape.string(value, "interval Value")?) {
                let datum = IntervalTimingDatum { driver_id, interval };
                events.push(DomainEvent::IntervalTiming(datum));
            }
        }
    }

    if let (Some(lap_time), Some(laps)) = (line.get("LastLapTime"), line.get("NumberOfLaps")) {
        let lap_time: WireLapTime = shape.record(lap_time, "LastLapTime")?;
        let lap = shape.number(laps, "NumberOfLaps")?;
        if let Some(time) = parse_seconds(shape, &lap_time.value, "LastLapTime")? {
            events.push(DomainEvent::LapTiming(LapTimingDatum {
                driver_id,
                lap,
                personal_fastest: lap_time.personal_fastest,
                overall_fastest: lap_time.overall_fastest,
                time,
            }));
        }
    }

    match line.get("Sectors") {
        Some(sectors) => decode_sectors(shape, driver_id, sectors, events),
        None => decode_line_status(shape, driver_id, line, events),
    }
}

fn decode_sectors(
    shape: &Shape,
    driver_id: u32,
    sectors: &Value,
    events: &mut Vec<DomainEvent>,
) -> Result<()> {
    for (index, record) in shape.indexed(sectors, "Sectors")? {
        let sector = index as u32 + 1;
        let record = shape.object(record, "sector")?;

        match SectorRecord::classify(shape, record)? {
            SectorRecord::Stopped => events.push(DomainEvent::DriverStatus(DriverStatusUpdate {
                driver_id,
                sector: Some(sector),
                retired: None,
                stopped: Some(true),
                status: None,
            })),
            SectorRecord::Superseded | SectorRecord::Empty => {}
            SectorRecord::Time { seconds, personal_fastest, overall_fastest } => {
                events.push(DomainEvent::SectorTiming(SectorTimingDatum {
                    driver_id,
                    sector,
                    personal_fastest,
                    overall_fastest,
                    time: seconds,
                }))
            }
            SectorRecord::Segments(segments) => {
                for (segment, status) in segments {
                    let status = shape.object(status, "segment")?;
                    let Some(bits) = status.get("Status") else {
                        continue;
                    };
                    events.push(DomainEvent::SegmentTiming(SegmentTimingDatum {
                        driver_id,
                        sector,
                        segment: segment as u32 + 1,
                        status: StatusBits::new(shape.number(bits, "segment Status")?),
                    }));
                }
            }
        }
    }
    Ok(())
}

fn decode_line_status(
    shape: &Shape,
    driver_id: u32,
    line: &Map<String, Value>,
    events: &mut Vec<DomainEvent>,
) -> Result<()> {
    let retired = line.get("Retired").map(|v| shape.boolean(v, "Retired")).transpose()?;
    let stopped = line.get("Stopped").map(|v| shape.boolean(v, "Stopped")).transpose()?;
    let status = line
        .get("Status")
        .map(|v| shape.number(v, "Status").map(StatusBits::new))
        .transpose()?;

    if retired.is_none() && stopped.is_none() && status.is_none() {
        return Ok(());
    }
    events.push(DomainEvent::DriverStatus(DriverStatusUpdate {
        driver_id,
        sector: None,
        retired,
        stopped,
        status,
    }));
    Ok(())
}

/// Sectors a lap is split into
const SECTORS: usize = 3;

/// Derive the track layout from the first line whose sectors arrive as a full list
/// of three, each with a non-empty segment list. Partial (mapping-shaped) updates
/// never qualify.
pub(super) fn derive_layout(shape: Shape, payload: &Value) -> Result<Option<SessionConfig>> {
    let timing = shape.object(payload, "TimingData")?;
    let Some(lines) = timing.get("Lines") else {
        return Ok(None);
    };

    'lines: for (_, line) in shape.by_driver(lines, "Lines")? {
        let Some(Value::Array(sectors)) = line.get("Sectors") else {
            continue;
        };
        if sectors.len() != SECTORS {
            continue;
        }

        let mut layout = BTreeMap::new();
        for (index, sector) in sectors.iter().enumerate() {
            match sector.get("Segments") {
                Some(Value::Array(segments)) if !segments.is_empty() => {
                    layout.insert(index as u32 + 1, segments.len());
                }
                _ => continue 'lines,
            }
        }
        return Ok(Some(SessionConfig { layout }));
    }
    Ok(None)
}
