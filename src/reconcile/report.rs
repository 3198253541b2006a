//! The per-cycle reconciliation report.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::identifiers::{RouteId, TripId, VehicleId};
use crate::realtime::ObservedVehicle;
use crate::reconcile::progress::NextStop;
use crate::schedule::ActiveTrip;

/// An active trip and the vehicle running it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TripMatch {
    pub active: ActiveTrip,
    pub vehicle: ObservedVehicle,
    /// Positive = late. `None` when progress is unknown or the trip is
    /// contested by several vehicles.
    pub delay_seconds: Option<i64>,
    pub next_stop: NextStop,
}

/// One active trip claimed by several vehicles in the same cycle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DuplicateTrip {
    pub active: ActiveTrip,
    /// Sorted; the first one is the vehicle kept in `matched`.
    pub vehicles: Vec<VehicleId>,
}

/// One vehicle claiming several different trips in the same cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DuplicateVehicle {
    pub vehicle_id: VehicleId,
    pub trip_ids: Vec<TripId>,
}

/// Classified outcome of one polling cycle. Every active trip is in exactly
/// one of `matched` and `absent`, except those listed in `superseded`.
/// All lists are sorted by trip id, or by vehicle id where no trip applies.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub generated_at: NaiveDateTime,
    pub matched: Vec<TripMatch>,
    pub absent: Vec<ActiveTrip>,
    pub duplicate_trips: Vec<DuplicateTrip>,
    pub duplicate_vehicles: Vec<DuplicateVehicle>,
    /// Vehicles claiming a trip that is not active right now.
    pub orphans: Vec<ObservedVehicle>,
    /// Vehicles not claiming any trip.
    pub unassigned: Vec<ObservedVehicle>,
    /// Active trips replaced by the same trip on a later service date.
    pub superseded: Vec<ActiveTrip>,
    /// Distinct vehicle ids seen in the snapshot.
    pub vehicles_seen: usize,
}

impl ReconciliationReport {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicate_trips.is_empty() || !self.duplicate_vehicles.is_empty()
    }

    /// Matches carrying a delay, keyed by the scheduled route.
    pub fn route_delays(&self) -> impl Iterator<Item = (&RouteId, i64)> {
        self.matched
            .iter()
            .filter_map(|m| Some((&m.active.trip.route_id, m.delay_seconds?)))
    }

    /// Absent trips, duplicates, or a vehicle off schedule by more than
    /// `delay_threshold_secs` in either direction.
    pub fn needs_attention(&self, delay_threshold_secs: i64) -> bool {
        !self.absent.is_empty()
            || self.has_duplicates()
            || self.route_delays().any(|(_, d)| d.abs() > delay_threshold_secs)
    }

    /// Mean of all delays in this cycle, for the stats row.
    pub fn mean_delay(&self) -> Option<f64> {
        let (count, sum) = self
            .route_delays()
            .fold((0u64, 0i64), |(c, s), (_, d)| (c + 1, s + d));
        (count > 0).then(|| sum as f64 / count as f64)
    }
}
