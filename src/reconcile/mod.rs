//! Reconciliation Engine: matches observed vehicles to active trips.
//!
//! `reconcile` is a pure function of its inputs. Input order never matters:
//! active trips are keyed by trip id, observations are grouped by vehicle id,
//! and every output list is built from ordered maps.

pub mod progress;
pub mod report;

use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::identifiers::{TripId, VehicleId};
use crate::realtime::ObservedVehicle;
use crate::schedule::ActiveTrip;

pub use progress::NextStop;
pub use report::{DuplicateTrip, DuplicateVehicle, ReconciliationReport, TripMatch};

/// Cross-references `active_trips` with `observed` vehicles at `now`.
pub fn reconcile(
    active_trips: &[ActiveTrip],
    observed: &[ObservedVehicle],
    now: NaiveDateTime,
) -> ReconciliationReport {
    let (by_trip, superseded) = index_active(active_trips);

    let mut by_vehicle: BTreeMap<&VehicleId, Vec<&ObservedVehicle>> = BTreeMap::new();
    for vehicle in observed {
        by_vehicle.entry(&vehicle.vehicle_id).or_default().push(vehicle);
    }
    let vehicles_seen = by_vehicle.len();

    let mut claims: BTreeMap<&TripId, Vec<&ObservedVehicle>> = BTreeMap::new();
    let mut duplicate_vehicles = Vec::new();
    let mut orphans = Vec::new();
    let mut unassigned = Vec::new();

    for (vehicle_id, observations) in by_vehicle {
        let claimed: Vec<&TripId> = observations
            .iter()
            .filter_map(|o| o.trip_id.as_ref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        match claimed.as_slice() {
            [] => unassigned.push(latest(&observations).clone()),
            [trip_id] => {
                let claiming: Vec<_> = observations
                    .iter()
                    .copied()
                    .filter(|o| o.trip_id.is_some())
                    .collect();
                let vehicle = latest(&claiming);
                match by_trip.get_key_value(*trip_id) {
                    Some((trip_id, _)) => claims.entry(trip_id).or_default().push(vehicle),
                    None => {
                        debug!(vehicle = %vehicle_id, trip = %trip_id, "Vehicle claims a trip that is not active");
                        orphans.push(vehicle.clone());
                    }
                }
            }
            _ => {
                let trip_ids: Vec<TripId> = claimed.iter().map(|id| (*id).clone()).collect();
                warn!(vehicle = %vehicle_id, trips = ?trip_ids, "Vehicle claims several trips");
                duplicate_vehicles.push(DuplicateVehicle {
                    vehicle_id: vehicle_id.clone(),
                    trip_ids,
                });
            }
        }
    }

    let mut matched = Vec::new();
    let mut absent = Vec::new();
    let mut duplicate_trips = Vec::new();

    for (trip_id, active) in &by_trip {
        let Some(vehicles) = claims.get(trip_id) else {
            absent.push(active.clone());
            continue;
        };

        // vehicles arrive in vehicle-id order
        let first = vehicles[0];
        let stops = &active.trip.stops;
        let delay_seconds = if vehicles.len() == 1 {
            let at = first.observed_at.unwrap_or(now);
            progress::delay_seconds(active, &first.progress, at)
        } else {
            let ids: Vec<VehicleId> = vehicles.iter().map(|v| v.vehicle_id.clone()).collect();
            warn!(trip = %trip_id, vehicles = ?ids, "Trip claimed by several vehicles");
            duplicate_trips.push(DuplicateTrip {
                active: active.clone(),
                vehicles: ids,
            });
            None
        };

        matched.push(TripMatch {
            active: active.clone(),
            vehicle: first.clone(),
            delay_seconds,
            next_stop: progress::next_stop(stops, &first.progress),
        });
    }

    debug!(
        active = by_trip.len(),
        matched = matched.len(),
        absent = absent.len(),
        orphans = orphans.len(),
        "Cycle reconciled"
    );

    ReconciliationReport {
        generated_at: now,
        matched,
        absent,
        duplicate_trips,
        duplicate_vehicles,
        orphans,
        unassigned,
        superseded,
        vehicles_seen,
    }
}

/// Keys active trips by trip id. When a trip id occurs twice, the later
/// service date wins and the other one is returned as superseded.
fn index_active(active_trips: &[ActiveTrip]) -> (BTreeMap<TripId, ActiveTrip>, Vec<ActiveTrip>) {
    let mut by_trip: BTreeMap<TripId, ActiveTrip> = BTreeMap::new();
    let mut superseded = Vec::new();

    for active in active_trips {
        match by_trip.entry(active.trip.trip_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(active.clone());
            }
            Entry::Occupied(mut slot) => {
                let loser = if active.service_date > slot.get().service_date {
                    slot.insert(active.clone())
                } else {
                    active.clone()
                };
                warn!(
                    trip = %loser.trip.trip_id,
                    service_date = %loser.service_date,
                    "Trip active on two service dates, keeping the later one"
                );
                superseded.push(loser);
            }
        }
    }

    superseded.sort_by(|a, b| {
        a.trip
            .trip_id
            .cmp(&b.trip.trip_id)
            .then_with(|| a.service_date.cmp(&b.service_date))
    });
    (by_trip, superseded)
}

fn compare_observations(a: &ObservedVehicle, b: &ObservedVehicle) -> Ordering {
    a.observed_at
        .cmp(&b.observed_at)
        .then_with(|| a.progress.cmp(&b.progress))
        .then_with(|| a.label.cmp(&b.label))
        .then_with(|| a.route_id.cmp(&b.route_id))
        .then_with(|| a.status.cmp(&b.status))
        .then_with(|| a.occupancy.cmp(&b.occupancy))
}

/// Most recent of several reports for one vehicle.
fn latest<'a>(observations: &[&'a ObservedVehicle]) -> &'a ObservedVehicle {
    observations
        .iter()
        .copied()
        .max_by(|a, b| compare_observations(a, b))
        .unwrap_or_else(|| unreachable!("vehicle groups are never empty"))
}
