//! Test utilities for capture fixture discovery and synthetic sessions
//!
//! Real captures live under `test-data/captures/` and are stored with Git LFS.
//! Synthetic sessions cover everything that does not need a real race.

#![cfg(any(test, feature = "benchmark"))]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

/// Guidance shown when capture fixtures are missing from the repository checkout.
pub const FIXTURE_INSTALL_GUIDANCE: &str = "Capture fixtures are stored under test-data/captures. \
    Install Git LFS and run `git lfs pull` to download them.";

/// Capture of the 2025 Hungarian Grand Prix race
pub const HUNGARY_2025_RACE: &str = "2025-hungary-race.txt";

/// Error returned when a required capture fixture cannot be located.
#[derive(Debug, Clone)]
pub struct FixtureError {
    message: String,
}

impl FixtureError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for FixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FixtureError {}

/// Require that a specific fixture exists on disk.
pub fn require_fixture<P: AsRef<Path>>(path: P) -> Result<PathBuf, FixtureError> {
    let path_ref = path.as_ref();
    if path_ref.exists() {
        Ok(path_ref.to_path_buf())
    } else {
        Err(FixtureError::new(format!(
            "Missing capture fixture: {}. {}",
            path_ref.display(),
            FIXTURE_INSTALL_GUIDANCE
        )))
    }
}

/// The `test-data/captures` directory of this crate
pub fn captures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test-data").join("captures")
}

/// All capture files (`*.txt`) under `test-data/captures`, sorted by name.
/// Empty when the directory is missing.
pub fn get_capture_files() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(captures_dir()) else {
        return vec![];
    };

    let mut captures: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    captures.sort();
    captures
}

/// Require a named capture within `test-data/captures` and return its path.
pub fn require_capture_fixture(file_name: &str) -> Result<PathBuf, FixtureError> {
    require_fixture(captures_dir().join(file_name))
}

/// Capture text for a synthetic race.
///
/// `drivers` start on the grid in the given order. Every lap, the car in last place
/// passes the car ahead of it, and every car reports a lap time, an interval and
/// three sectors of `segments` mini-sectors each. Records are one second apart.
pub fn synthetic_race(drivers: &[u32], laps: u32, segments: [usize; 3]) -> String {
    let mut records = String::new();
    let mut timestamp = 0u64;
    let mut push = |category: &str, payload: Value| {
        let _ = writeln!(records, "{timestamp}:{category}:{payload}");
        timestamp += 1_000_000_000;
    };

    let roster: serde_json::Map<String, Value> = drivers
        .iter()
        .map(|n| {
            let entry =
                json!({"RacingNumber": n.to_string(), "BroadcastName": format!("DRIVER {n}")});
            (n.to_string(), entry)
        })
        .collect();
    let grid: serde_json::Map<String, Value> = drivers
        .iter()
        .enumerate()
        .map(|(i, n)| {
            let entry = json!({"GridPos": (i + 1).to_string(), "Stints": [{"Compound": "MEDIUM"}]});
            (n.to_string(), entry)
        })
        .collect();
    let sectors: Vec<Value> = segments
        .iter()
        .map(|count| json!({"Value": "", "Segments": vec![json!({"Status": 0}); *count]}))
        .collect();
    let sample = match drivers.first() {
        Some(first) => keyed(*first, json!({"Sectors": sectors})),
        None => json!({}),
    };

    push(
        "init",
        json!({
            "DriverList": roster,
            "SessionInfo": {
                "Meeting": {"Name": "Synthetic Grand Prix"},
                "Name": "Race",
                "ArchiveStatus": {"Status": "Generating"}
            },
            "TimingAppData": {"Lines": grid},
            "SessionData": {"Series": [{"Lap": 1}]},
            "TimingData": {"Lines": sample},
            "SessionStatus": {"Status": "Started"}
        }),
    );

    let mut order = drivers.to_vec();
    for lap in 1..=laps {
        push("SessionData", json!({"Series": keyed(lap, json!({"Lap": lap}))}));

        if order.len() > 1 {
            let last = order.len() - 1;
            order.swap(last - 1, last);
            let mover = order[last - 1];
            let moved = keyed(mover, json!({"Position": last.to_string()}));
            push("TimingData", json!({"Lines": moved}));
        }

        let mut lines = serde_json::Map::new();
        for (i, driver) in order.iter().enumerate() {
            let gap = if i == 0 {
                format!("LAP {lap}")
            } else {
                format!("+{}.{:03}", i, (lap * 37 + *driver) % 1000)
            };
            let sector_times: serde_json::Map<String, Value> = (0..3)
                .map(|s| {
                    let time = format!("{}.{:03}", 25 + s, (lap + *driver) % 1000);
                    (s.to_string(), json!({"Value": time}))
                })
                .collect();
            lines.insert(
                driver.to_string(),
                json!({
                    "NumberOfLaps": lap,
                    "LastLapTime": {
                        "Value": format!("1:{:02}.{:03}", 20 + i, lap % 1000),
                        "PersonalFastest": false
                    },
                    "IntervalToPositionAhead": {"Value": gap},
                    "Sectors": sector_times
                }),
            );
        }
        push("TimingData", json!({"Lines": lines}));
        push("Heartbeat", json!({"Utc": "2025-08-03T13:03:00Z"}));
    }
    records
}

/// A single-entry mapping keyed by a number, the shape deltas use
fn keyed(key: u32, value: Value) -> Value {
    let mut entry = serde_json::Map::new();
    entry.insert(key.to_string(), value);
    Value::Object(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Update;

    #[test]
    fn captures_dir_is_under_the_crate() {
        assert!(captures_dir().ends_with("test-data/captures"));
        // Listing never fails, even without fixtures
        let _ = get_capture_files();
    }

    #[test]
    fn missing_fixture_explains_how_to_fetch_it() {
        let err = require_capture_fixture("no-such-capture.txt").unwrap_err();
        assert!(err.to_string().contains("git lfs pull"));
    }

    #[test]
    fn synthetic_race_is_a_valid_capture() {
        let capture = synthetic_race(&[1, 4, 16], 2, [7, 8, 6]);
        let updates: Vec<Update> = capture
            .lines()
            .enumerate()
            .map(|(i, line)| Update::parse_record(line, i + 1).unwrap().unwrap())
            .collect();

        assert_eq!(updates[0].category, "init");
        // init, then per lap: progress, overtake, timing, heartbeat
        assert_eq!(updates.len(), 1 + 2 * 4);
        assert!(updates.windows(2).all(|w| w[0].received_at < w[1].received_at));
    }
}
