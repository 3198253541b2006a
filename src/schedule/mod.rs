//! Static schedule: calendar, trip index and display names.

pub mod active;
pub mod calendar;
pub mod index;
pub mod loader;
pub mod tables;

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::{LoadError, ScheduleError};
use crate::identifiers::{RouteId, StopId, TripId};

pub use active::{ActiveTrip, ActivityWindow, active_trips};
pub use calendar::Calendar;
pub use index::{ScheduleIndex, ScheduledStop, Trip};
pub use tables::ScheduleTables;

/// Outcome of indexing a schedule: what loaded and what was dropped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub trips_loaded: usize,
    pub services_loaded: usize,
    pub errors: Vec<LoadError>,
}

impl LoadReport {
    /// Trips excluded from the index.
    pub fn dropped_trips(&self) -> usize {
        self.errors.iter().filter(|e| e.drops_trip()).count()
    }
}

#[derive(Debug)]
pub struct Schedule {
    calendar: Calendar,
    index: ScheduleIndex,
    route_names: BTreeMap<RouteId, String>,
    stop_names: BTreeMap<StopId, String>,
}

impl Schedule {
    /// Builds calendar and index from parsed tables.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NoUsableTrips`] when nothing survives
    /// validation; individual bad rows only show up in the [`LoadReport`].
    pub fn from_tables(tables: &ScheduleTables) -> Result<(Self, LoadReport), ScheduleError> {
        let (calendar, mut errors) = Calendar::from_records(&tables.calendar, &tables.calendar_dates);
        let (index, index_errors) = ScheduleIndex::build(&tables.trips, &tables.stop_times, &calendar);
        errors.extend(index_errors);

        let report = LoadReport {
            trips_loaded: index.len(),
            services_loaded: calendar.len(),
            errors,
        };

        for error in &report.errors {
            warn!(error = %error, "Schedule entity dropped");
        }

        if index.is_empty() {
            return Err(ScheduleError::NoUsableTrips {
                dropped: report.dropped_trips(),
            });
        }

        info!(
            trips = report.trips_loaded,
            services = report.services_loaded,
            dropped = report.dropped_trips(),
            "Schedule loaded"
        );

        let route_names = tables
            .routes
            .iter()
            .filter_map(|r| {
                let name = r
                    .route_short_name
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .or(r.route_long_name.as_deref())?;
                Some((RouteId::new(r.route_id.trim()), name.to_string()))
            })
            .collect();

        let stop_names = tables
            .stops
            .iter()
            .filter_map(|s| Some((StopId::new(s.stop_id.trim()), s.stop_name.clone()?)))
            .collect();

        Ok((
            Self {
                calendar,
                index,
                route_names,
                stop_names,
            },
            report,
        ))
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn index(&self) -> &ScheduleIndex {
        &self.index
    }

    pub fn active_trips(&self, at: NaiveDateTime, window: ActivityWindow) -> Vec<ActiveTrip> {
        active_trips(&self.calendar, &self.index, at, window)
    }

    pub fn trip(&self, trip_id: &TripId) -> Option<&Trip> {
        self.index.trip(trip_id).map(|t| t.as_ref())
    }

    /// Route short name, falling back to the long name, then the id.
    pub fn route_name<'a>(&'a self, route_id: &'a RouteId) -> &'a str {
        self.route_names
            .get(route_id)
            .map(String::as_str)
            .unwrap_or(route_id.as_str())
    }

    pub fn stop_name<'a>(&'a self, stop_id: &'a StopId) -> &'a str {
        self.stop_names
            .get(stop_id)
            .map(String::as_str)
            .unwrap_or(stop_id.as_str())
    }
}
