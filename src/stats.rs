use chrono::NaiveDateTime;
use serde::Serialize;

use crate::punctuality::Punctuality;
use crate::reconcile::ReconciliationReport;

/// One CSV row summarising a polling cycle.
#[derive(Debug, Default, Serialize)]
pub struct CycleStats {
    pub timestamp: Option<NaiveDateTime>,
    pub feed: Option<String>,

    // partition
    pub active_trips: usize,
    pub matched: usize,
    pub absent: usize,
    pub superseded: usize,

    // vehicles
    pub vehicles_seen: usize,
    pub duplicate_trips: usize,
    pub duplicate_vehicles: usize,
    pub orphans: usize,
    pub unassigned: usize,

    // punctuality
    pub with_delay: usize,
    pub early: usize,
    pub on_time: usize,
    pub late: usize,
    pub mean_delay_seconds: Option<f64>,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl CycleStats {
    pub fn from_report(report: &ReconciliationReport) -> Self {
        let mut s = CycleStats {
            timestamp: Some(report.generated_at),
            matched: report.matched.len(),
            absent: report.absent.len(),
            superseded: report.superseded.len(),
            vehicles_seen: report.vehicles_seen,
            duplicate_trips: report.duplicate_trips.len(),
            duplicate_vehicles: report.duplicate_vehicles.len(),
            orphans: report.orphans.len(),
            unassigned: report.unassigned.len(),
            mean_delay_seconds: report.mean_delay(),
            ..Default::default()
        };
        s.active_trips = s.matched + s.absent;

        for delay in report.matched.iter().filter_map(|m| m.delay_seconds) {
            s.with_delay += 1;
            match Punctuality::from_delay(delay) {
                Punctuality::Early => s.early += 1,
                Punctuality::OnTime => s.on_time += 1,
                Punctuality::Late => s.late += 1,
            }
        }

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of active trips with a vehicle on them.
    pub fn coverage_pct(&self) -> f64 {
        Self::pct(self.matched, self.active_trips)
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(at: NaiveDateTime, error_type: &str, error_message: &str) -> Self {
        CycleStats {
            timestamp: Some(at),
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    /// Tags the row with the feed it came from.
    pub fn with_feed(mut self, feed: &str) -> Self {
        self.feed = Some(feed.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{RouteId, ServiceId, StopId, TripId};
    use crate::realtime::{ObservedVehicle, StopProgress};
    use crate::reconcile::reconcile;
    use crate::schedule::{ActiveTrip, ScheduledStop, Trip};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn active(trip_id: &str) -> ActiveTrip {
        let trip = Trip {
            trip_id: TripId::new(trip_id),
            route_id: RouteId::new("R1"),
            service_id: ServiceId::new("WEEK"),
            headsign: None,
            stops: vec![ScheduledStop {
                stop_id: StopId::new("S1"),
                stop_sequence: 1,
                arrival: 28_800,
                departure: 28_800,
            }],
        };
        ActiveTrip::new(Arc::new(trip), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    fn seen(vehicle: &str, trip: &str, observed: NaiveDateTime) -> ObservedVehicle {
        ObservedVehicle::new(vehicle)
            .on_trip(trip)
            .at_progress(StopProgress::at_sequence(1))
            .observed_at(observed)
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(CycleStats::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(CycleStats::pct(50, 100), 50.0);
        assert_eq!(CycleStats::pct(1, 4), 25.0);
    }

    #[test]
    fn test_from_report_empty() {
        let report = reconcile(&[], &[], at(8, 0));
        let stats = CycleStats::from_report(&report);

        assert_eq!(stats.active_trips, 0);
        assert_eq!(stats.vehicles_seen, 0);
        assert_eq!(stats.mean_delay_seconds, None);
        assert_eq!(stats.coverage_pct(), 0.0);
    }

    #[test]
    fn test_from_report_counts_punctuality() {
        let trips = vec![active("T1"), active("T2"), active("T3"), active("T4")];
        let observed = vec![
            seen("V1", "T1", at(8, 5)),
            seen("V2", "T2", at(7, 58)),
            seen("V3", "T3", at(8, 0)),
            ObservedVehicle::new("V4"),
        ];
        let stats = CycleStats::from_report(&reconcile(&trips, &observed, at(8, 6)));

        assert_eq!(stats.active_trips, 4);
        assert_eq!(stats.matched, 3);
        assert_eq!(stats.absent, 1);
        assert_eq!(stats.unassigned, 1);
        assert_eq!(stats.with_delay, 3);
        assert_eq!(stats.late, 1);
        assert_eq!(stats.early, 1);
        assert_eq!(stats.on_time, 1);
        assert_eq!(stats.coverage_pct(), 75.0);
    }

    #[test]
    fn test_from_error_with_feed() {
        let stats = CycleStats::from_error(at(8, 0), "fetch_error", "timed out").with_feed("feed.pb");
        assert_eq!(stats.error_type.as_deref(), Some("fetch_error"));
        assert_eq!(stats.feed.as_deref(), Some("feed.pb"));
        assert_eq!(stats.matched, 0);
    }
}
