//! Running order reconstruction from single-driver position updates.
//!
//! The feed only ever reports the driver whose position changed. [`PositionTracker`]
//! infers who was displaced and keeps the assigned positions a permutation of
//! `1..=N`; when an update cannot be reconciled with that invariant it fails with
//! [`TimingError::PositionInvariant`] instead of guessing.
//!
//! ```rust
//! use livetiming::tracker::PositionTracker;
//! use livetiming::types::DriverPositionUpdate;
//!
//! let mut tracker = PositionTracker::new();
//! for (driver_id, position) in [(4, 1), (81, 2), (63, 3)] {
//!     tracker.observe(&DriverPositionUpdate { driver_id, position })?;
//! }
//!
//! // 63 passes 81: both positions change
//! let changes = tracker.observe(&DriverPositionUpdate { driver_id: 63, position: 2 })?;
//! assert_eq!(changes.len(), 2);
//! assert_eq!(tracker.position_of(81), Some(3));
//! # Ok::<(), livetiming::TimingError>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::types::{DomainEvent, Driver, DriverPositionUpdate, Interval};
use crate::{Result, TimingError};

/// One row of the timing tower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TimingLine {
    pub number: u32,
    pub broadcast_name: String,
    /// `None` until the driver's first position arrives
    pub position: Option<u32>,
    /// Last completed lap time in seconds
    pub last_lap: Option<f64>,
    pub laps: Option<u32>,
    /// Gap to the car ahead
    pub interval: Option<Interval>,
    pub retired: bool,
}

impl TimingLine {
    fn new(number: u32, broadcast_name: impl Into<String>) -> Self {
        Self {
            number,
            broadcast_name: broadcast_name.into(),
            position: None,
            last_lap: None,
            laps: None,
            interval: None,
            retired: false,
        }
    }
}

/// A driver's position changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct PositionChange {
    pub driver: u32,
    /// `None` when this was the driver's first placement
    pub from: Option<u32>,
    pub to: u32,
}

/// Authoritative running order for one session
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    lines: BTreeMap<u32, TimingLine>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add roster drivers as unplaced. Drivers already tracked are left untouched.
    pub fn seed(&mut self, drivers: &[Driver]) {
        for driver in drivers {
            self.lines
                .entry(driver.number)
                .or_insert_with(|| TimingLine::new(driver.number, driver.broadcast_name.as_str()));
        }
    }

    /// Apply one driver's new position and shift everyone it displaced.
    ///
    /// Returns a change for every driver whose position moved: displaced drivers in
    /// slot order, then the mover. A first placement is recorded as-is.
    pub fn observe(&mut self, update: &DriverPositionUpdate) -> Result<Vec<PositionChange>> {
        let DriverPositionUpdate { driver_id, position: new } = *update;
        let old = match self.lines.get(&driver_id) {
            Some(line) => line.position,
            None => {
                warn!(driver = driver_id, "Position update for driver missing from roster");
                self.lines.insert(driver_id, TimingLine::new(driver_id, driver_id.to_string()));
                None
            }
        };

        let Some(old) = old else {
            self.place(driver_id, new);
            return Ok(vec![PositionChange { driver: driver_id, from: None, to: new }]);
        };
        if old == new {
            return Ok(Vec::new());
        }

        // Gained places: everyone in new..old drops one. Lost places: old+1..=new gains one.
        // The walk stops at the first empty slot, so a wild position fails fast.
        let (first, last, shift): (u32, u32, i64) =
            if new < old { (new, old - 1, 1) } else { (old + 1, new, -1) };

        let occupants = self.occupants();
        let mut displaced = Vec::new();
        for slot in first..=last {
            match occupants.get(&slot) {
                Some(&other) if other != driver_id => displaced.push((other, slot)),
                _ => {
                    return Err(TimingError::PositionInvariant {
                        driver: driver_id,
                        position: new,
                        missing_slot: slot,
                    });
                }
            }
        }

        let mut changes = Vec::with_capacity(displaced.len() + 1);
        for (other, slot) in displaced {
            let to = (slot as i64 + shift) as u32;
            self.place(other, to);
            changes.push(PositionChange { driver: other, from: Some(slot), to });
        }
        self.place(driver_id, new);
        changes.push(PositionChange { driver: driver_id, from: Some(old), to: new });

        trace!(
            driver = driver_id,
            from = old,
            to = new,
            displaced = changes.len() - 1,
            "Position change"
        );
        Ok(changes)
    }

    /// Fold any domain event into the tracked state.
    ///
    /// Only position updates can fail or produce changes.
    pub fn apply(&mut self, event: &DomainEvent) -> Result<Vec<PositionChange>> {
        match event {
            DomainEvent::Roster(drivers) => self.seed(drivers),
            DomainEvent::DriverPosition(update) => return self.observe(update),
            DomainEvent::LapTiming(lap) => {
                if let Some(line) = self.lines.get_mut(&lap.driver_id) {
                    line.last_lap = Some(lap.time);
                    line.laps = Some(lap.lap);
                }
            }
            DomainEvent::IntervalTiming(gap) => {
                if let Some(line) = self.lines.get_mut(&gap.driver_id) {
                    line.interval = Some(gap.interval);
                }
            }
            DomainEvent::DriverStatus(status) => {
                let line = self.lines.get_mut(&status.driver_id);
                if let (Some(retired), Some(line)) = (status.retired, line) {
                    line.retired = retired;
                }
            }
            _ => {}
        }
        Ok(Vec::new())
    }

    pub fn position_of(&self, driver: u32) -> Option<u32> {
        self.lines.get(&driver).and_then(|line| line.position)
    }

    pub fn line(&self, driver: u32) -> Option<&TimingLine> {
        self.lines.get(&driver)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All drivers by position, unplaced drivers last in number order
    pub fn running_order(&self) -> Vec<TimingLine> {
        let mut order: Vec<TimingLine> = self.lines.values().cloned().collect();
        order.sort_by_key(|line| (line.position.is_none(), line.position, line.number));
        order
    }

    /// Running order of drivers still classified
    pub fn classified(&self) -> Vec<TimingLine> {
        self.running_order().into_iter().filter(|line| !line.retired).collect()
    }

    /// Drivers flagged as retired
    pub fn not_classified(&self) -> Vec<TimingLine> {
        self.running_order().into_iter().filter(|line| line.retired).collect()
    }

    fn place(&mut self, driver: u32, position: u32) {
        if let Some(line) = self.lines.get_mut(&driver) {
            line.position = Some(position);
        }
    }

    fn occupants(&self) -> BTreeMap<u32, u32> {
        self.lines
            .values()
            .filter_map(|line| line.position.map(|position| (position, line.number)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DriverStatusUpdate, LapTimingDatum};
    use proptest::prelude::*;

    fn driver(number: u32) -> Driver {
        Driver {
            number,
            broadcast_name: format!("DRIVER {number}"),
            team_name: None,
            team_color: None,
            first_name: None,
            last_name: None,
        }
    }

    fn grid(order: &[u32]) -> PositionTracker {
        let mut tracker = PositionTracker::new();
        tracker.seed(&order.iter().copied().map(driver).collect::<Vec<_>>());
        for (slot, &driver_id) in order.iter().enumerate() {
            let update = DriverPositionUpdate { driver_id, position: slot as u32 + 1 };
            tracker.observe(&update).unwrap();
        }
        tracker
    }

    fn order(tracker: &PositionTracker) -> Vec<u32> {
        tracker.running_order().iter().map(|line| line.number).collect()
    }

    fn moves(
        tracker: &mut PositionTracker,
        driver_id: u32,
        position: u32,
    ) -> Result<Vec<PositionChange>> {
        tracker.observe(&DriverPositionUpdate { driver_id, position })
    }

    #[test]
    fn seeded_drivers_start_unplaced() {
        let mut tracker = PositionTracker::new();
        tracker.seed(&[driver(1), driver(44)]);
        assert_eq!(tracker.position_of(1), None);
        assert_eq!(tracker.len(), 2);

        let changes = moves(&mut tracker, 44, 1).unwrap();
        assert_eq!(changes, vec![PositionChange { driver: 44, from: None, to: 1 }]);
        assert_eq!(order(&tracker), vec![44, 1]);
    }

    #[test]
    fn gaining_places_pushes_others_back() {
        let mut tracker = grid(&[1, 2, 3, 4, 5]);
        let changes = moves(&mut tracker, 5, 2).unwrap();
        assert_eq!(
            changes,
            vec![
                PositionChange { driver: 2, from: Some(2), to: 3 },
                PositionChange { driver: 3, from: Some(3), to: 4 },
                PositionChange { driver: 4, from: Some(4), to: 5 },
                PositionChange { driver: 5, from: Some(5), to: 2 },
            ]
        );
        assert_eq!(order(&tracker), vec![1, 5, 2, 3, 4]);
    }

    #[test]
    fn losing_places_pulls_others_forward() {
        let mut tracker = grid(&[1, 2, 3, 4, 5]);
        let changes = moves(&mut tracker, 1, 3).unwrap();
        assert_eq!(changes.len(), 3);
        assert_eq!(order(&tracker), vec![2, 3, 1, 4, 5]);
    }

    #[test]
    fn unchanged_position_emits_nothing() {
        let mut tracker = grid(&[1, 2, 3]);
        assert!(moves(&mut tracker, 2, 2).unwrap().is_empty());
    }

    #[test]
    fn gap_in_running_order_is_fatal() {
        let mut tracker = PositionTracker::new();
        tracker.seed(&[driver(1), driver(2), driver(3)]);
        moves(&mut tracker, 1, 1).unwrap();
        moves(&mut tracker, 3, 3).unwrap();

        let err = moves(&mut tracker, 3, 1).unwrap_err();
        assert!(matches!(
            err,
            TimingError::PositionInvariant { driver: 3, position: 1, missing_slot: 2 }
        ));
        // Nothing moved
        assert_eq!(tracker.position_of(1), Some(1));
        assert_eq!(tracker.position_of(3), Some(3));
    }

    #[test]
    fn out_of_range_position_fails_at_first_empty_slot() {
        let mut tracker = grid(&[1, 2, 3]);
        let err = moves(&mut tracker, 1, 4_000_000_000).unwrap_err();
        assert!(matches!(err, TimingError::PositionInvariant { driver: 1, missing_slot: 4, .. }));

        // A wild first placement is kept, but moving on from it cannot succeed
        moves(&mut tracker, 9, u32::MAX).unwrap();
        let err = moves(&mut tracker, 9, 1).unwrap_err();
        assert!(matches!(err, TimingError::PositionInvariant { driver: 9, missing_slot: 4, .. }));
        assert_eq!(order(&tracker), vec![1, 2, 3, 9]);
    }

    #[test]
    fn unknown_driver_is_added() {
        let mut tracker = PositionTracker::new();
        moves(&mut tracker, 30, 1).unwrap();
        assert_eq!(tracker.line(30).map(|l| l.broadcast_name.as_str()), Some("30"));
    }

    #[test]
    fn apply_tracks_laps_and_retirements() {
        let mut tracker = grid(&[4, 87]);
        tracker
            .apply(&DomainEvent::LapTiming(LapTimingDatum {
                driver_id: 4,
                lap: 10,
                personal_fastest: false,
                overall_fastest: false,
                time: 81.2,
            }))
            .unwrap();
        tracker
            .apply(&DomainEvent::DriverStatus(DriverStatusUpdate {
                driver_id: 87,
                sector: None,
                retired: Some(true),
                stopped: None,
                status: None,
            }))
            .unwrap();

        assert_eq!(tracker.line(4).and_then(|l| l.last_lap), Some(81.2));
        assert_eq!(tracker.classified().iter().map(|l| l.number).collect::<Vec<_>>(), vec![4]);
        assert_eq!(tracker.not_classified().iter().map(|l| l.number).collect::<Vec<_>>(), vec![87]);
    }

    fn grid_and_moves() -> impl Strategy<Value = (Vec<u32>, Vec<(usize, u32)>)> {
        (2usize..20).prop_flat_map(|n| {
            let grid = Just((1..=n as u32).collect::<Vec<_>>()).prop_shuffle();
            let moves = prop::collection::vec((0..n, 1..=n as u32), 0..50);
            (grid, moves)
        })
    }

    proptest! {
        #[test]
        fn positions_stay_a_permutation((order, updates) in grid_and_moves()) {
            let drivers: Vec<u32> = order.iter().map(|slot| slot * 10).collect();
            let mut tracker = grid(&drivers);
            let n = drivers.len() as u32;

            for (index, position) in updates {
                let update = DriverPositionUpdate { driver_id: drivers[index], position };
                tracker.observe(&update).unwrap();

                let mut assigned: Vec<u32> =
                    drivers.iter().filter_map(|d| tracker.position_of(*d)).collect();
                assigned.sort_unstable();
                prop_assert_eq!(assigned, (1..=n).collect::<Vec<_>>());
            }
        }
    }
}
