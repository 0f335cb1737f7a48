//! Driver roster and stint table decoding

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::Decoder;
use super::shape::Shape;
use crate::Result;
use crate::types::{Category, DomainEvent, Driver, DriverPositionUpdate, StintChange};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireDriver {
    racing_number: Option<Value>,
    broadcast_name: Option<String>,
    team_name: Option<String>,
    team_colour: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl Decoder {
    /// Decode a roster delivered as a mapping keyed by driver number or as a list
    /// whose entries carry `RacingNumber`.
    ///
    /// Only drivers not previously announced are emitted, in ascending number order.
    /// Entries without a broadcast name are skipped.
    pub(super) fn decode_roster(
        &mut self,
        payload: &Value,
        events: &mut Vec<DomainEvent>,
    ) -> Result<()> {
        let shape = Shape::of(Category::DriverList);

        let entries: Vec<(Option<u32>, &Value)> = match payload {
            Value::Array(list) => list.iter().map(|entry| (None, entry)).collect(),
            _ => shape
                .by_driver(payload, "DriverList")?
                .into_iter()
                .map(|(n, e)| (Some(n), e))
                .collect(),
        };

        let mut drivers = Vec::new();
        for (key, entry) in entries {
            let wire: WireDriver = shape.record(entry, "driver entry")?;
            let Some(broadcast_name) = wire.broadcast_name else {
                continue;
            };
            let number = match (key, &wire.racing_number) {
                (Some(number), _) => number,
                (None, Some(number)) => shape.number(number, "RacingNumber")?,
                (None, None) => return Err(shape.malformed("driver entry without RacingNumber")),
            };
            drivers.push(Driver {
                number,
                broadcast_name,
                team_name: wire.team_name,
                team_color: wire.team_colour,
                first_name: wire.first_name,
                last_name: wire.last_name,
            });
        }

        drivers.sort_by_key(|d| d.number);
        drivers.dedup_by_key(|d| d.number);
        drivers.retain(|d| !self.roster.contains(&d.number));
        if drivers.is_empty() {
            return Ok(());
        }

        self.roster.extend(drivers.iter().map(|d| d.number));
        debug!(new_drivers = drivers.len(), roster_size = self.roster.len(), "Roster seeded");
        events.push(DomainEvent::Roster(drivers));
        Ok(())
    }

    /// Decode the timing-app (or timing-stats) table: stints and grid/line positions.
    pub(super) fn decode_stints(
        &mut self,
        shape: Shape,
        payload: &Value,
        events: &mut Vec<DomainEvent>,
    ) -> Result<()> {
        let table = shape.object(payload, "payload")?;
        let Some(lines) = table.get("Lines") else {
            return Ok(());
        };

        for (driver_id, line) in shape.by_driver(lines, "Lines")? {
            let line = shape.object(line, "driver line")?;

            if let Some(stints) = line.get("Stints") {
                for (index, stint) in shape.indexed(stints, "Stints")? {
                    let stint = shape.object(stint, "stint")?;
                    let Some(compound) = stint.get("Compound") else {
                        continue;
                    };
                    let compound = shape.string(compound, "Compound")?.to_string();
                    let number = index as u32 + 1;

                    let highest = self.stints.entry(driver_id).or_insert(0);
                    let is_new = number > *highest;
                    if is_new {
                        *highest = number;
                    } else {
                        debug!(driver = driver_id, stint = number, %compound, "Stint corrected");
                    }
                    events.push(DomainEvent::StintChange(StintChange {
                        driver_id,
                        stint: number,
                        compound,
                        is_new,
                    }));
                }
            }

            let seeded = match line.get("GridPos") {
                Some(grid) => shape.optional_number(grid, "GridPos")?,
                None => None,
            };
            let seeded = match (seeded, line.get("Line")) {
                (Some(position), _) => Some(position),
                (None, Some(row)) => shape.optional_number(row, "Line")?,
                (None, None) => None,
            };
            if let Some(position) = seeded.filter(|p| *p > 0) {
                let seed = DriverPositionUpdate { driver_id, position };
                events.push(DomainEvent::DriverPosition(seed));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Update;
    use serde_json::json;

    fn roster(events: &[DomainEvent]) -> Vec<u32> {
        events
            .iter()
            .filter_map(|e| match e {
                DomainEvent::Roster(drivers) => {
                    Some(drivers.iter().map(|d| d.number).collect::<Vec<_>>())
                }
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn keyframe_marker_and_nameless_entries_are_skipped() {
        let mut decoder = Decoder::new();
        let payload = json!({
            "_kf": true,
            "44": {"RacingNumber": "44", "BroadcastName": "L HAMILTON", "TeamName": "Ferrari"},
            "16": {"RacingNumber": "16", "BroadcastName": "C LECLERC"},
            "99": {"Line": 20}
        });
        let events = decoder.decode(&Update::new("DriverList", payload, 0)).unwrap();
        assert_eq!(roster(&events), vec![16, 44]);

        let DomainEvent::Roster(drivers) = &events[0] else { panic!("expected roster") };
        assert_eq!(drivers[1].team_name.as_deref(), Some("Ferrari"));
    }

    #[test]
    fn list_roster_uses_racing_number() {
        let mut decoder = Decoder::new();
        let payload = json!([
            {"RacingNumber": "63", "BroadcastName": "G RUSSELL", "TeamColour": "27F4D2"},
            {"RacingNumber": "1", "BroadcastName": "M VERSTAPPEN"}
        ]);
        let events = decoder.decode(&Update::new("DriverList", payload, 0)).unwrap();
        assert_eq!(roster(&events), vec![1, 63]);
    }

    #[test]
    fn repeated_roster_only_announces_new_drivers() {
        let mut decoder = Decoder::new();
        let first =
            json!({"4": {"BroadcastName": "L NORRIS"}, "81": {"BroadcastName": "O PIASTRI"}});
        decoder.decode(&Update::new("DriverList", first.clone(), 0)).unwrap();

        let events = decoder.decode(&Update::new("DriverList", first, 1)).unwrap();
        assert!(events.is_empty());

        let grown =
            json!({"4": {"BroadcastName": "L NORRIS"}, "5": {"BroadcastName": "G BORTOLETO"}});
        let events = decoder.decode(&Update::new("DriverList", grown, 2)).unwrap();
        assert_eq!(roster(&events), vec![5]);
    }

    #[test]
    fn stint_corrections_are_not_new() {
        let mut decoder = Decoder::new();
        let stints = json!([{"Compound": "MEDIUM"}, {"Compound": "HARD"}]);
        let opening = json!({"Lines": {"14": {"Stints": stints}}});
        let events = decoder.decode(&Update::new("TimingAppData", opening, 0)).unwrap();
        let flags: Vec<(u32, bool)> = events
            .iter()
            .filter_map(|e| match e {
                DomainEvent::StintChange(s) => Some((s.stint, s.is_new)),
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![(1, true), (2, true)]);

        let correction = json!({"Lines": {"14": {"Stints": {"1": {"Compound": "SOFT"}}}}});
        let events = decoder.decode(&Update::new("TimingAppData", correction, 1)).unwrap();
        assert_eq!(
            events,
            vec![DomainEvent::StintChange(StintChange {
                driver_id: 14,
                stint: 2,
                compound: "SOFT".into(),
                is_new: false,
            })]
        );
        assert_eq!(decoder.highest_stint(14), Some(2));
    }

    #[test]
    fn stint_updates_without_compound_are_ignored() {
        let mut decoder = Decoder::new();
        let laps_only = json!({"Lines": {"14": {"Stints": {"0": {"TotalLaps": 12}}}}});
        let events = decoder.decode(&Update::new("TimingAppData", laps_only, 0)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn grid_position_wins_over_line() {
        let mut decoder = Decoder::new();
        let payload = json!({"Lines": {
            "4": {"GridPos": "3", "Line": 7},
            "81": {"GridPos": "", "Line": 2},
            "63": {"Line": 5}
        }});
        let events = decoder.decode(&Update::new("TimingAppData", payload, 0)).unwrap();
        let positions: Vec<(u32, u32)> = events
            .iter()
            .filter_map(|e| match e {
                DomainEvent::DriverPosition(p) => Some((p.driver_id, p.position)),
                _ => None,
            })
            .collect();
        assert_eq!(positions, vec![(4, 3), (63, 5), (81, 2)]);
    }
}
