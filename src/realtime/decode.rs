//! Conversion from GTFS-RT vehicle positions to [`ObservedVehicle`]s.

use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use tracing::debug;

use crate::gtfs_rt::vehicle_position::{OccupancyStatus, VehicleStopStatus};
use crate::gtfs_rt::{FeedEntity, FeedMessage};
use crate::identifiers::{RouteId, StopId, TripId, VehicleId};
use crate::realtime::{ObservedVehicle, Occupancy, RealtimeSnapshot, StopProgress, VehicleStatus};

/// Converts POSIX seconds to agency-local wall-clock time.
pub fn local_time(posix_secs: u64, tz: &Tz) -> Option<NaiveDateTime> {
    let secs = i64::try_from(posix_secs).ok()?;
    DateTime::from_timestamp(secs, 0).map(|utc| utc.with_timezone(tz).naive_local())
}

impl RealtimeSnapshot {
    /// Builds a snapshot from a decoded feed. Entities without a vehicle
    /// position, and deleted entities, are skipped.
    pub fn from_feed(feed: &FeedMessage, tz: &Tz, fetched_at: NaiveDateTime) -> Self {
        let vehicles: Vec<_> = feed
            .entity
            .iter()
            .filter_map(|e| observed_vehicle(e, tz))
            .collect();

        debug!(
            entities = feed.entity.len(),
            vehicles = vehicles.len(),
            "Realtime snapshot decoded"
        );

        Self {
            fetched_at,
            feed_timestamp: feed.header.timestamp.and_then(|t| local_time(t, tz)),
            vehicles,
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn observed_vehicle(entity: &FeedEntity, tz: &Tz) -> Option<ObservedVehicle> {
    if entity.is_deleted == Some(true) {
        return None;
    }
    let v = entity.vehicle.as_ref()?;

    let descriptor = v.vehicle.as_ref();
    let label = descriptor.and_then(|d| non_empty(d.label.as_ref()));
    let vehicle_id = descriptor
        .and_then(|d| non_empty(d.id.as_ref()))
        .or(label)
        .unwrap_or(entity.id.as_str());

    let trip = v.trip.as_ref();

    Some(ObservedVehicle {
        vehicle_id: VehicleId::new(vehicle_id),
        label: label.map(str::to_string),
        trip_id: trip.and_then(|t| non_empty(t.trip_id.as_ref())).map(TripId::new),
        route_id: trip.and_then(|t| non_empty(t.route_id.as_ref())).map(RouteId::new),
        progress: StopProgress {
            stop_sequence: v.current_stop_sequence,
            stop_id: non_empty(v.stop_id.as_ref()).map(StopId::new),
        },
        observed_at: v.timestamp.and_then(|t| local_time(t, tz)),
        status: v
            .current_status
            .and_then(|s| VehicleStopStatus::try_from(s).ok())
            .map(VehicleStatus::from),
        occupancy: v
            .occupancy_status
            .and_then(|s| OccupancyStatus::try_from(s).ok())
            .map(Occupancy::from),
    })
}

impl From<VehicleStopStatus> for VehicleStatus {
    fn from(status: VehicleStopStatus) -> Self {
        match status {
            VehicleStopStatus::IncomingAt => VehicleStatus::IncomingAt,
            VehicleStopStatus::StoppedAt => VehicleStatus::StoppedAt,
            VehicleStopStatus::InTransitTo => VehicleStatus::InTransitTo,
        }
    }
}

impl From<OccupancyStatus> for Occupancy {
    fn from(status: OccupancyStatus) -> Self {
        match status {
            OccupancyStatus::Empty => Occupancy::Empty,
            OccupancyStatus::ManySeatsAvailable => Occupancy::ManySeatsAvailable,
            OccupancyStatus::FewSeatsAvailable => Occupancy::FewSeatsAvailable,
            OccupancyStatus::StandingRoomOnly => Occupancy::StandingRoomOnly,
            OccupancyStatus::CrushedStandingRoomOnly => Occupancy::CrushedStandingRoomOnly,
            OccupancyStatus::Full => Occupancy::Full,
            OccupancyStatus::NotAcceptingPassengers => Occupancy::NotAcceptingPassengers,
            OccupancyStatus::NoDataAvailable => Occupancy::NoDataAvailable,
            OccupancyStatus::NotBoardable => Occupancy::NotBoardable,
        }
    }
}
