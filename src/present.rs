//! Human-readable rendering of a cycle through `tracing`.

use tracing::{info, warn};

use crate::history::LineDelayHistory;
use crate::punctuality::{LineHealth, Punctuality};
use crate::reconcile::{NextStop, ReconciliationReport, TripMatch};
use crate::schedule::Schedule;
use crate::schedule::tables::format_gtfs_time;

#[derive(Debug, Clone, Default)]
pub struct PresentOptions {
    /// Only log problems: absent trips, duplicates, anomalies.
    pub alert_only: bool,
    /// Restrict the vehicle listing to one label or vehicle id.
    pub follow: Option<String>,
    pub delay_alert_seconds: i64,
}

/// Matches whose delay exceeds `threshold_secs` either way.
pub fn anomalies(report: &ReconciliationReport, threshold_secs: i64) -> Vec<&TripMatch> {
    report
        .matched
        .iter()
        .filter(|m| m.delay_seconds.is_some_and(|d| d.abs() > threshold_secs))
        .collect()
}

/// Matches whose delay is more than twice their line's historical mean and
/// more than three minutes, either way. Lines without history are skipped.
pub fn history_anomalies<'a>(
    report: &'a ReconciliationReport,
    history: &LineDelayHistory,
) -> Vec<&'a TripMatch> {
    report
        .matched
        .iter()
        .filter(|m| {
            let Some(delay) = m.delay_seconds else {
                return false;
            };
            let Some(mean) = history.mean_delay(&m.active.trip.route_id) else {
                return false;
            };
            let delay = delay.abs() as f64;
            delay > HISTORY_ANOMALY_FLOOR_SECS && delay > 2.0 * mean.abs()
        })
        .collect()
}

const HISTORY_ANOMALY_FLOOR_SECS: f64 = 180.0;

/// Matches run by the vehicle known as `name` (label or id).
pub fn followed<'a>(report: &'a ReconciliationReport, name: &str) -> Vec<&'a TripMatch> {
    report
        .matched
        .iter()
        .filter(|m| m.vehicle.display_name() == name || m.vehicle.vehicle_id.as_str() == name)
        .collect()
}

pub fn present(
    report: &ReconciliationReport,
    schedule: &Schedule,
    history: &LineDelayHistory,
    options: &PresentOptions,
) {
    if options.alert_only {
        present_alerts(report, schedule, history, options.delay_alert_seconds);
        if !report.needs_attention(options.delay_alert_seconds) {
            info!("All nominal");
        }
        return;
    }

    info!(
        vehicles = report.vehicles_seen,
        at = %report.generated_at.format("%H:%M:%S"),
        "Vehicles in service"
    );

    let shown = match &options.follow {
        Some(name) => {
            let shown = followed(report, name);
            if shown.is_empty() {
                warn!(vehicle = %name, "Followed vehicle not detected");
            }
            shown
        }
        None => report.matched.iter().collect(),
    };
    for m in shown {
        present_match(m, schedule);
    }

    for (route_id, line) in history.lines() {
        let Some(mean) = line.mean() else { continue };
        info!(
            line = schedule.route_name(route_id),
            mean_delay_min = %format!("{:.1}", mean / 60.0),
            observations = line.count,
            health = ?LineHealth::from_mean_delay(mean),
            "Mean delay"
        );
    }

    present_alerts(report, schedule, history, options.delay_alert_seconds);
    if report.absent.is_empty() {
        info!("Every active trip is detected");
    }
}

fn present_match(m: &TripMatch, schedule: &Schedule) {
    let trip = &m.active.trip;
    let next = match &m.next_stop {
        NextStop::Upcoming {
            stop_id, arrival, ..
        } => format!("{} ({})", schedule.stop_name(stop_id), format_gtfs_time(*arrival)),
        NextStop::Terminus => "terminus".to_string(),
        NextStop::Unknown => "unknown".to_string(),
    };
    info!(
        vehicle = m.vehicle.display_name(),
        line = schedule.route_name(&trip.route_id),
        destination = trip.headsign.as_deref().unwrap_or("?"),
        departure = %format_gtfs_time(trip.first_departure()),
        delay_seconds = ?m.delay_seconds,
        punctuality = ?m.delay_seconds.map(Punctuality::from_delay),
        status = ?m.vehicle.status,
        occupancy = ?m.vehicle.occupancy,
        next_stop = %next,
        last_seen = ?m.vehicle.observed_at.map(|t| t.format("%H:%M:%S").to_string()),
        "Vehicle"
    );
}

fn present_alerts(
    report: &ReconciliationReport,
    schedule: &Schedule,
    history: &LineDelayHistory,
    threshold_secs: i64,
) {
    for dup in &report.duplicate_vehicles {
        warn!(
            vehicle = %dup.vehicle_id,
            trips = dup.trip_ids.len(),
            "Vehicle claims several trips"
        );
    }
    for dup in &report.duplicate_trips {
        warn!(
            trip = %dup.active.trip.trip_id,
            vehicles = ?dup.vehicles.iter().map(|v| v.as_str()).collect::<Vec<_>>(),
            "Trip claimed by several vehicles"
        );
    }
    for m in anomalies(report, threshold_secs) {
        let delay = m.delay_seconds.unwrap_or_default();
        warn!(
            vehicle = m.vehicle.display_name(),
            line = schedule.route_name(&m.active.trip.route_id),
            delay_min = %format!("{:.1}", delay as f64 / 60.0),
            punctuality = ?Punctuality::from_delay(delay),
            "Delay anomaly"
        );
    }
    for m in history_anomalies(report, history) {
        let route_id = &m.active.trip.route_id;
        warn!(
            vehicle = m.vehicle.display_name(),
            line = schedule.route_name(route_id),
            delay_min = %format!("{:.1}", m.delay_seconds.unwrap_or_default() as f64 / 60.0),
            line_mean_min = %format!("{:.1}", history.mean_delay(route_id).unwrap_or_default() / 60.0),
            "Delay far from line history"
        );
    }
    for orphan in &report.orphans {
        warn!(
            vehicle = orphan.display_name(),
            trip = ?orphan.trip_id.as_ref().map(|t| t.as_str()),
            "Vehicle claims a trip that is not active"
        );
    }
    for vehicle in &report.unassigned {
        info!(vehicle = vehicle.display_name(), "Vehicle without a trip");
    }
    if !report.absent.is_empty() {
        warn!(count = report.absent.len(), "Absent trips");
    }
    for absent in &report.absent {
        let trip = &absent.trip;
        warn!(
            line = schedule.route_name(&trip.route_id),
            trip = %trip.trip_id,
            departure = %format_gtfs_time(trip.first_departure()),
            destination = trip.headsign.as_deref().unwrap_or("?"),
            service_date = %absent.service_date,
            "Absent trip"
        );
    }
}
