//! Active-trip resolution for a wall-clock instant.
//!
//! A trip is active when its service runs on a service date and the instant
//! falls inside the trip's offset window measured from that date's midnight.
//! Offsets may exceed 24h, so yesterday's service date is always considered
//! too: a 23:50 departure with stops up to 24:15 is still running at 00:05.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::identifiers::ServiceId;
use crate::schedule::calendar::Calendar;
use crate::schedule::index::{ScheduleIndex, Trip};

/// A trip running for one concrete service date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActiveTrip {
    pub trip: Arc<Trip>,
    pub service_date: NaiveDate,
}

impl ActiveTrip {
    pub fn new(trip: Arc<Trip>, service_date: NaiveDate) -> Self {
        Self { trip, service_date }
    }

    /// Local midnight of the service date; stop offsets count from here.
    pub fn service_start(&self) -> NaiveDateTime {
        self.service_date.and_time(NaiveTime::MIN)
    }

    /// Seconds elapsed since the service start at `at`.
    pub fn offset_at(&self, at: NaiveDateTime) -> i64 {
        (at - self.service_start()).num_seconds()
    }
}

/// Slack around a trip's scheduled span when deciding whether it runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivityWindow {
    /// Counted as active this long before the first departure.
    pub lead: Duration,
    /// Counted as active this long after the last arrival.
    pub grace: Duration,
}

impl Default for ActivityWindow {
    fn default() -> Self {
        Self {
            lead: Duration::zero(),
            grace: Duration::zero(),
        }
    }
}

impl ActivityWindow {
    pub fn covers(&self, trip: &Trip, offset: i64) -> bool {
        let start = i64::from(trip.first_departure()) - self.lead.num_seconds();
        let end = i64::from(trip.last_arrival()) + self.grace.num_seconds();
        start <= offset && offset <= end
    }
}

fn offset_since_midnight(date: NaiveDate, at: NaiveDateTime) -> i64 {
    (at - date.and_time(NaiveTime::MIN)).num_seconds()
}

impl Calendar {
    /// Services active at `at`: everything running today, plus yesterday's
    /// services that still have a trip inside its window.
    pub fn active_services(
        &self,
        at: NaiveDateTime,
        index: &ScheduleIndex,
        window: ActivityWindow,
    ) -> BTreeSet<ServiceId> {
        let today = at.date();
        let mut services = self.services_on(today);

        if let Some(yesterday) = today.pred_opt() {
            let offset = offset_since_midnight(yesterday, at);
            for service_id in self.services_on(yesterday) {
                let carries_over = index
                    .trips_for_service(&service_id)
                    .iter()
                    .any(|trip| window.covers(trip, offset));
                if carries_over {
                    services.insert(service_id);
                }
            }
        }

        services
    }
}

/// Trips running at `at`, ordered by trip id then service date.
pub fn active_trips(
    calendar: &Calendar,
    index: &ScheduleIndex,
    at: NaiveDateTime,
    window: ActivityWindow,
) -> Vec<ActiveTrip> {
    let today = at.date();
    let mut active = Vec::new();

    for date in [today.pred_opt(), Some(today)].into_iter().flatten() {
        let offset = offset_since_midnight(date, at);
        for service_id in calendar.services_on(date) {
            active.extend(
                index
                    .trips_for_service(&service_id)
                    .iter()
                    .filter(|trip| window.covers(trip, offset))
                    .map(|trip| ActiveTrip::new(trip.clone(), date)),
            );
        }
    }

    active.sort_by(|a, b| {
        a.trip
            .trip_id
            .cmp(&b.trip.trip_id)
            .then_with(|| a.service_date.cmp(&b.service_date))
    });
    active
}
