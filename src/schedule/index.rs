//! Static Schedule Index: trips by service and stop sequences by trip.
//!
//! Built once from the parsed tables and read-only afterwards; share it
//! behind an `Arc` if several readers need it.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::error::LoadError;
use crate::identifiers::{RouteId, ServiceId, StopId, TripId};
use crate::schedule::calendar::Calendar;
use crate::schedule::tables::{StopTimeRecord, TripRecord, parse_gtfs_time, parse_stop_sequence};

/// One stop of a trip. Times are seconds since service-day midnight and may
/// exceed 24h for trips running past midnight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScheduledStop {
    pub stop_id: StopId,
    pub stop_sequence: u32,
    pub arrival: u32,
    pub departure: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Trip {
    pub trip_id: TripId,
    pub route_id: RouteId,
    pub service_id: ServiceId,
    pub headsign: Option<String>,
    /// Ordered by stop sequence; offsets never decrease along the sequence.
    pub stops: Vec<ScheduledStop>,
}

impl Trip {
    pub fn first_departure(&self) -> u32 {
        self.stops.first().map(|s| s.departure).unwrap_or(0)
    }

    pub fn last_arrival(&self) -> u32 {
        self.stops.last().map(|s| s.arrival).unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct ScheduleIndex {
    trips: BTreeMap<TripId, Arc<Trip>>,
    by_service: BTreeMap<ServiceId, Vec<Arc<Trip>>>,
}

impl ScheduleIndex {
    /// Indexes `trips` against `calendar`. Inconsistent trips are left out
    /// and returned as errors alongside the index.
    pub fn build(
        trips: &[TripRecord],
        stop_times: &[StopTimeRecord],
        calendar: &Calendar,
    ) -> (Self, Vec<LoadError>) {
        let mut errors = Vec::new();

        let mut times_by_trip: BTreeMap<&str, Vec<&StopTimeRecord>> = BTreeMap::new();
        for row in stop_times {
            times_by_trip.entry(row.trip_id.trim()).or_default().push(row);
        }

        let mut index = Self::default();
        let mut seen: BTreeSet<&str> = BTreeSet::new();

        for row in trips {
            let trip_id = TripId::new(row.trip_id.trim());
            if !seen.insert(row.trip_id.trim()) {
                errors.push(LoadError::DuplicateTrip(trip_id));
                continue;
            }

            let service_id = ServiceId::new(row.service_id.trim());
            if !calendar.contains(&service_id) {
                errors.push(LoadError::UnknownService {
                    trip_id,
                    service_id,
                });
                continue;
            }

            let rows = times_by_trip.get(row.trip_id.trim()).map(Vec::as_slice);
            let stops = match build_stops(&trip_id, rows.unwrap_or_default()) {
                Ok(stops) => stops,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            let trip = Arc::new(Trip {
                trip_id: trip_id.clone(),
                route_id: RouteId::new(row.route_id.trim()),
                service_id: service_id.clone(),
                headsign: row.trip_headsign.clone().filter(|h| !h.is_empty()),
                stops,
            });
            index.by_service.entry(service_id).or_default().push(trip.clone());
            index.trips.insert(trip_id, trip);
        }

        for trip_id in times_by_trip.keys() {
            if !seen.contains(trip_id) {
                errors.push(LoadError::OrphanStopTime(TripId::new(*trip_id)));
            }
        }

        for trips in index.by_service.values_mut() {
            trips.sort_by(|a, b| {
                a.first_departure()
                    .cmp(&b.first_departure())
                    .then_with(|| a.trip_id.cmp(&b.trip_id))
            });
        }

        debug!(
            trips = index.trips.len(),
            services = index.by_service.len(),
            errors = errors.len(),
            "Schedule index built"
        );

        (index, errors)
    }

    /// Trips of a service, ordered by first departure then trip id.
    pub fn trips_for_service(&self, service_id: &ServiceId) -> &[Arc<Trip>] {
        self.by_service
            .get(service_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn stops_for_trip(&self, trip_id: &TripId) -> Option<&[ScheduledStop]> {
        self.trips.get(trip_id).map(|t| t.stops.as_slice())
    }

    pub fn trip(&self, trip_id: &TripId) -> Option<&Arc<Trip>> {
        self.trips.get(trip_id)
    }

    pub fn trips(&self) -> impl Iterator<Item = &Arc<Trip>> {
        self.trips.values()
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

fn build_stops(trip_id: &TripId, rows: &[&StopTimeRecord]) -> Result<Vec<ScheduledStop>, LoadError> {
    if rows.is_empty() {
        return Err(LoadError::NoStopTimes(trip_id.clone()));
    }

    let mut rows = rows
        .iter()
        .map(|row| match parse_stop_sequence(&row.stop_sequence) {
            Some(sequence) => Ok((sequence, *row)),
            None => Err(LoadError::MalformedStopSequence {
                trip_id: trip_id.clone(),
                value: row.stop_sequence.clone(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    rows.sort_by_key(|(sequence, _)| *sequence);

    let parse = |value: &Option<String>| -> Result<Option<u32>, LoadError> {
        match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(v) => parse_gtfs_time(v).map(Some).ok_or_else(|| LoadError::MalformedTime {
                trip_id: trip_id.clone(),
                value: v.to_string(),
            }),
        }
    };

    let mut stops: Vec<ScheduledStop> = Vec::with_capacity(rows.len());
    for (stop_sequence, row) in rows {
        let (arrival, departure) = match (parse(&row.arrival_time)?, parse(&row.departure_time)?) {
            (Some(a), Some(d)) => (a, d),
            (Some(a), None) => (a, a),
            (None, Some(d)) => (d, d),
            (None, None) => {
                return Err(LoadError::UntimedStop {
                    trip_id: trip_id.clone(),
                    stop_sequence,
                });
            }
        };

        let previous = stops.last().map(|s| s.departure).unwrap_or(0);
        if departure < arrival || arrival < previous {
            return Err(LoadError::DecreasingOffsets {
                trip_id: trip_id.clone(),
                stop_sequence,
            });
        }

        stops.push(ScheduledStop {
            stop_id: StopId::new(row.stop_id.trim()),
            stop_sequence,
            arrival,
            departure,
        });
    }

    Ok(stops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::calendar::ServiceCalendar;

    fn trip_row(trip_id: &str, service_id: &str) -> TripRecord {
        TripRecord {
            route_id: "R1".into(),
            service_id: service_id.into(),
            trip_id: trip_id.into(),
            trip_headsign: Some("Centre".into()),
        }
    }

    fn stop_time(trip_id: &str, seq: u32, arrival: &str, departure: &str) -> StopTimeRecord {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        StopTimeRecord {
            trip_id: trip_id.into(),
            arrival_time: opt(arrival),
            departure_time: opt(departure),
            stop_id: format!("S{seq}"),
            stop_sequence: seq.to_string(),
        }
    }

    fn calendar() -> Calendar {
        Calendar::new([ServiceCalendar::new(ServiceId::new("WEEK"))])
    }

    #[test]
    fn test_build_orders_stops_and_trips() {
        let trips = vec![trip_row("late", "WEEK"), trip_row("early", "WEEK")];
        let stop_times = vec![
            stop_time("late", 2, "09:10:00", "09:10:00"),
            stop_time("late", 1, "09:00:00", "09:00:00"),
            stop_time("early", 1, "08:00:00", "08:01:00"),
            stop_time("early", 2, "08:05:00", ""),
        ];
        let (index, errors) = ScheduleIndex::build(&trips, &stop_times, &calendar());

        assert!(errors.is_empty());
        let ordered: Vec<_> = index
            .trips_for_service(&ServiceId::new("WEEK"))
            .iter()
            .map(|t| t.trip_id.as_str())
            .collect();
        assert_eq!(ordered, ["early", "late"]);

        let stops = index.stops_for_trip(&TripId::new("late")).unwrap();
        assert_eq!(stops[0].stop_sequence, 1);
        assert_eq!(stops[1].arrival, 9 * 3600 + 600);

        let early = index.stops_for_trip(&TripId::new("early")).unwrap();
        assert_eq!(early[1].departure, early[1].arrival);
    }

    #[test]
    fn test_unknown_service_is_dropped_not_fatal() {
        let trips = vec![trip_row("ok", "WEEK"), trip_row("bad", "MISSING")];
        let stop_times = vec![
            stop_time("ok", 1, "08:00:00", "08:00:00"),
            stop_time("bad", 1, "08:00:00", "08:00:00"),
        ];
        let (index, errors) = ScheduleIndex::build(&trips, &stop_times, &calendar());

        assert_eq!(index.len(), 1);
        assert_eq!(
            errors,
            vec![LoadError::UnknownService {
                trip_id: TripId::new("bad"),
                service_id: ServiceId::new("MISSING"),
            }]
        );
        assert!(index.trips_for_service(&ServiceId::new("MISSING")).is_empty());
    }

    #[test]
    fn test_inconsistent_trips_are_reported() {
        let trips = vec![
            trip_row("no_times", "WEEK"),
            trip_row("backwards", "WEEK"),
            trip_row("untimed", "WEEK"),
            trip_row("garbled", "WEEK"),
            trip_row("garbled", "WEEK"),
        ];
        let stop_times = vec![
            stop_time("backwards", 1, "10:00:00", "10:00:00"),
            stop_time("backwards", 2, "09:59:00", "09:59:00"),
            stop_time("untimed", 1, "", ""),
            stop_time("garbled", 1, "8h00", "8h00"),
            stop_time("ghost", 1, "08:00:00", "08:00:00"),
        ];
        let (index, errors) = ScheduleIndex::build(&trips, &stop_times, &calendar());

        assert!(index.is_empty());
        assert_eq!(errors.len(), 6);
        assert_eq!(errors.iter().filter(|e| e.drops_trip()).count(), 5);
        assert!(errors.contains(&LoadError::OrphanStopTime(TripId::new("ghost"))));
    }

    #[test]
    fn test_malformed_stop_sequence_drops_only_that_trip() {
        let trips = vec![trip_row("T1", "WEEK"), trip_row("T2", "WEEK")];
        let mut bad = stop_time("T2", 2, "08:10:00", "08:10:00");
        bad.stop_sequence = "x".into();
        let stop_times = vec![
            stop_time("T1", 1, "08:00:00", "08:00:00"),
            stop_time("T2", 1, "08:05:00", "08:05:00"),
            bad,
        ];
        let (index, errors) = ScheduleIndex::build(&trips, &stop_times, &calendar());

        assert_eq!(index.len(), 1);
        assert!(index.trip(&TripId::new("T1")).is_some());
        assert_eq!(
            errors,
            vec![LoadError::MalformedStopSequence {
                trip_id: TripId::new("T2"),
                value: "x".into(),
            }]
        );
        assert!(errors[0].drops_trip());
    }

    #[test]
    fn test_huge_hour_is_a_malformed_time() {
        let trips = vec![trip_row("T1", "WEEK")];
        let stop_times = vec![stop_time("T1", 1, "9999999:00:00", "9999999:00:00")];
        let (index, errors) = ScheduleIndex::build(&trips, &stop_times, &calendar());

        assert!(index.is_empty());
        assert_eq!(
            errors,
            vec![LoadError::MalformedTime {
                trip_id: TripId::new("T1"),
                value: "9999999:00:00".into(),
            }]
        );
    }

    #[test]
    fn test_trip_bounds() {
        let trips = vec![trip_row("night", "WEEK")];
        let stop_times = vec![
            stop_time("night", 1, "23:50:00", "23:50:00"),
            stop_time("night", 2, "24:15:00", "24:15:00"),
        ];
        let (index, _) = ScheduleIndex::build(&trips, &stop_times, &calendar());
        let trip = index.trip(&TripId::new("night")).unwrap();

        assert_eq!(trip.first_departure(), 85_800);
        assert_eq!(trip.last_arrival(), 87_300);
    }
}
