//! Row types for the static GTFS tables, as read from disk.
//!
//! Fields keep their raw textual form where a malformed value must be
//! reported per entity rather than failing the whole table.

use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RouteRecord {
    pub route_id: String,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub route_long_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopRecord {
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripRecord {
    pub route_id: String,
    pub service_id: String,
    pub trip_id: String,
    #[serde(default)]
    pub trip_headsign: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopTimeRecord {
    pub trip_id: String,
    #[serde(default)]
    pub arrival_time: Option<String>,
    #[serde(default)]
    pub departure_time: Option<String>,
    pub stop_id: String,
    pub stop_sequence: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarRecord {
    pub service_id: String,
    pub monday: String,
    pub tuesday: String,
    pub wednesday: String,
    pub thursday: String,
    pub friday: String,
    pub saturday: String,
    pub sunday: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarDateRecord {
    pub service_id: String,
    pub date: String,
    pub exception_type: String,
}

/// The static schedule as parsed tables, before indexing.
#[derive(Debug, Clone, Default)]
pub struct ScheduleTables {
    pub routes: Vec<RouteRecord>,
    pub stops: Vec<StopRecord>,
    pub trips: Vec<TripRecord>,
    pub stop_times: Vec<StopTimeRecord>,
    pub calendar: Vec<CalendarRecord>,
    pub calendar_dates: Vec<CalendarDateRecord>,
}

/// Parses a GTFS time (`H:MM:SS`, hours may exceed 23) into seconds since
/// service-day midnight.
pub fn parse_gtfs_time(value: &str) -> Option<u32> {
    let mut parts = value.trim().split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes > 59 || seconds > 59 {
        return None;
    }
    hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)
}

/// Parses a `stop_sequence` cell.
pub fn parse_stop_sequence(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

/// Parses a `calendar.txt` weekday cell: `1` runs, `0` does not.
pub fn parse_weekday_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Parses a GTFS `YYYYMMDD` date.
pub fn parse_gtfs_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d").ok()
}

/// Formats seconds since service-day midnight back into `HH:MM:SS`.
pub fn format_gtfs_time(secs: u32) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
