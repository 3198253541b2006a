//! Realtime snapshot: the vehicles observed in one feed fetch.
//!
//! A snapshot is replaced wholesale every cycle. Nothing carries over between
//! cycles except the vehicle identifier itself.

pub mod decode;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::identifiers::{RouteId, StopId, TripId, VehicleId};

/// Where a vehicle is along its trip, as reported by the feed.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct StopProgress {
    pub stop_sequence: Option<u32>,
    pub stop_id: Option<StopId>,
}

impl StopProgress {
    pub fn at_sequence(stop_sequence: u32) -> Self {
        Self {
            stop_sequence: Some(stop_sequence),
            stop_id: None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.stop_sequence.is_some() || self.stop_id.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum VehicleStatus {
    IncomingAt,
    StoppedAt,
    InTransitTo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Occupancy {
    Empty,
    ManySeatsAvailable,
    FewSeatsAvailable,
    StandingRoomOnly,
    CrushedStandingRoomOnly,
    Full,
    NotAcceptingPassengers,
    NoDataAvailable,
    NotBoardable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObservedVehicle {
    pub vehicle_id: VehicleId,
    /// Rider-facing label (fleet number), when the feed has one.
    pub label: Option<String>,
    /// The trip the vehicle claims to run; `None` when unassigned.
    pub trip_id: Option<TripId>,
    /// Route as reported by the feed, for display only.
    pub route_id: Option<RouteId>,
    pub progress: StopProgress,
    /// Agency-local wall-clock time of the position fix.
    pub observed_at: Option<NaiveDateTime>,
    pub status: Option<VehicleStatus>,
    pub occupancy: Option<Occupancy>,
}

impl ObservedVehicle {
    pub fn new(vehicle_id: impl Into<VehicleId>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            label: None,
            trip_id: None,
            route_id: None,
            progress: StopProgress::default(),
            observed_at: None,
            status: None,
            occupancy: None,
        }
    }

    pub fn on_trip(mut self, trip_id: impl Into<TripId>) -> Self {
        self.trip_id = Some(trip_id.into());
        self
    }

    pub fn at_progress(mut self, progress: StopProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn observed_at(mut self, at: NaiveDateTime) -> Self {
        self.observed_at = Some(at);
        self
    }

    /// Label when present, otherwise the vehicle id.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(self.vehicle_id.as_str())
    }
}

/// Vehicles decoded from one feed fetch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RealtimeSnapshot {
    pub fetched_at: NaiveDateTime,
    pub feed_timestamp: Option<NaiveDateTime>,
    pub vehicles: Vec<ObservedVehicle>,
}

impl RealtimeSnapshot {
    /// A snapshot with no vehicles, used when the feed could not be read.
    /// Reconciling it reports every active trip absent.
    pub fn empty(fetched_at: NaiveDateTime) -> Self {
        Self {
            fetched_at,
            feed_timestamp: None,
            vehicles: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
