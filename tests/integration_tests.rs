use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use prost::Message;
use std::io::Write;
use std::path::{Path, PathBuf};

use gtfs_rt_reconciler::error::LoadError;
use gtfs_rt_reconciler::gtfs_rt::{
    FeedEntity, FeedHeader, FeedMessage, TripDescriptor, VehicleDescriptor, VehiclePosition,
};
use gtfs_rt_reconciler::history::LineDelayHistory;
use gtfs_rt_reconciler::identifiers::{RouteId, TripId};
use gtfs_rt_reconciler::monitor::Monitor;
use gtfs_rt_reconciler::parser::parse_feed;
use gtfs_rt_reconciler::realtime::RealtimeSnapshot;
use gtfs_rt_reconciler::reconcile::reconcile;
use gtfs_rt_reconciler::schedule::loader::load_tables;
use gtfs_rt_reconciler::schedule::{ActivityWindow, Schedule};
use gtfs_rt_reconciler::stats::CycleStats;

/// 2024-03-01T00:00:00Z.
const MARCH_1: u64 = 1_709_251_200;

fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/gtfs")
}

fn schedule() -> Schedule {
    let tables = load_tables(&fixture_dir()).expect("Failed to read fixture tables");
    Schedule::from_tables(&tables).expect("Failed to index schedule").0
}

fn local(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn posix(day: u32, h: u32, m: u32) -> u64 {
    MARCH_1 + u64::from(day - 1) * 86_400 + u64::from(h) * 3_600 + u64::from(m) * 60
}

fn vehicle(id: &str, trip_id: Option<&str>, sequence: Option<u32>, stop_id: Option<&str>, ts: u64) -> FeedEntity {
    FeedEntity {
        id: format!("e-{id}"),
        is_deleted: None,
        vehicle: Some(VehiclePosition {
            trip: trip_id.map(|t| TripDescriptor {
                trip_id: Some(t.to_string()),
                ..Default::default()
            }),
            vehicle: Some(VehicleDescriptor {
                id: Some(id.to_string()),
                label: None,
                license_plate: None,
            }),
            current_stop_sequence: sequence,
            stop_id: stop_id.map(str::to_string),
            timestamp: Some(ts),
            ..Default::default()
        }),
    }
}

fn encode(entity: Vec<FeedEntity>) -> Vec<u8> {
    FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            incrementality: None,
            timestamp: Some(posix(1, 8, 12)),
            feed_version: None,
        },
        entity,
    }
    .encode_to_vec()
}

fn snapshot(bytes: &[u8], now: NaiveDateTime) -> RealtimeSnapshot {
    let feed = parse_feed(bytes).expect("Failed to parse feed");
    RealtimeSnapshot::from_feed(&feed, &Tz::UTC, now)
}

fn morning_feed() -> Vec<u8> {
    encode(vec![
        vehicle("V1", Some("T100"), Some(2), None, posix(1, 8, 12)),
        vehicle("V2", Some("T300"), None, Some("D"), posix(1, 8, 12)),
        vehicle("V3", Some("N900"), Some(1), None, posix(1, 8, 12)),
        vehicle("V4", None, None, None, posix(1, 8, 12)),
    ])
}

#[test]
fn test_load_fixture_reports_dropped_entities() {
    let tables = load_tables(&fixture_dir()).unwrap();
    let (schedule, report) = Schedule::from_tables(&tables).unwrap();

    assert_eq!(report.trips_loaded, 5);
    assert_eq!(report.services_loaded, 2);
    assert_eq!(report.dropped_trips(), 1);
    assert!(report.errors.contains(&LoadError::DecreasingOffsets {
        trip_id: TripId::new("BAD1"),
        stop_sequence: 2,
    }));
    assert!(report.errors.contains(&LoadError::OrphanStopTime(TripId::new("GHOST"))));

    assert!(schedule.trip(&TripId::new("BAD1")).is_none());
    assert_eq!(schedule.route_name(&RouteId::new("N")), "N1");
}

#[test]
fn test_load_from_zip_matches_directory() {
    let path = std::env::temp_dir().join("gtfs_rt_reconciler_fixture.zip");
    let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    for entry in std::fs::read_dir(fixture_dir()).unwrap() {
        let entry = entry.unwrap();
        let name = entry.file_name().to_string_lossy().into_owned();
        writer
            .start_file(name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&std::fs::read(entry.path()).unwrap()).unwrap();
    }
    writer.finish().unwrap();

    let zipped = load_tables(&path).unwrap();
    let plain = load_tables(&fixture_dir()).unwrap();
    assert_eq!(zipped.trips.len(), plain.trips.len());
    assert_eq!(zipped.stop_times.len(), plain.stop_times.len());
    assert_eq!(zipped.calendar_dates.len(), plain.calendar_dates.len());

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_full_pipeline() {
    let schedule = schedule();
    let now = local(1, 8, 12);
    let active = schedule.active_trips(now, ActivityWindow::default());
    let snapshot = snapshot(&morning_feed(), now);
    let report = reconcile(&active, &snapshot.vehicles, now);

    let matched: Vec<_> = report
        .matched
        .iter()
        .map(|m| (m.active.trip.trip_id.as_str(), m.vehicle.vehicle_id.as_str(), m.delay_seconds))
        .collect();
    assert_eq!(
        matched,
        vec![("T100", "V1", Some(120)), ("T300", "V2", Some(720))]
    );

    let absent: Vec<_> = report.absent.iter().map(|a| a.trip.trip_id.as_str()).collect();
    assert_eq!(absent, vec!["T200"]);

    assert_eq!(report.orphans.len(), 1);
    assert_eq!(report.orphans[0].vehicle_id.as_str(), "V3");
    assert_eq!(report.unassigned.len(), 1);
    assert_eq!(report.vehicles_seen, 4);
    assert!(report.needs_attention(600));

    let stats = CycleStats::from_report(&report);
    assert_eq!(stats.active_trips, 3);
    assert_eq!(stats.late, 2);
}

#[test]
fn test_night_trip_runs_past_midnight() {
    let schedule = schedule();

    let now = local(2, 0, 5);
    let report = reconcile(
        &schedule.active_trips(now, ActivityWindow::default()),
        &snapshot(&encode(vec![]), now).vehicles,
        now,
    );
    assert_eq!(report.absent.len(), 1);
    assert_eq!(report.absent[0].trip.trip_id.as_str(), "N900");
    assert_eq!(
        report.absent[0].service_date,
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    );

    let feed = encode(vec![vehicle("V9", Some("N900"), Some(2), None, posix(2, 0, 5))]);
    let report = reconcile(
        &schedule.active_trips(now, ActivityWindow::default()),
        &snapshot(&feed, now).vehicles,
        now,
    );
    assert_eq!(report.matched.len(), 1);
    assert_eq!(report.matched[0].delay_seconds, Some(600));

    let later = local(2, 0, 45);
    assert!(schedule.active_trips(later, ActivityWindow::default()).is_empty());
}

#[test]
fn test_removed_service_date_has_no_active_trips() {
    let schedule = schedule();
    // Monday 2024-03-04 is removed from WEEK.
    assert!(schedule
        .active_trips(local(4, 8, 12), ActivityWindow::default())
        .is_empty());
    assert_eq!(
        schedule
            .active_trips(local(5, 8, 12), ActivityWindow::default())
            .len(),
        3
    );
}

#[test]
fn test_monitor_accumulates_history_across_cycles() {
    let mut monitor = Monitor::new(schedule(), LineDelayHistory::new(), ActivityWindow::default());

    let now = local(1, 8, 12);
    monitor.run_cycle(Ok(snapshot(&morning_feed(), now)), now);

    let now = local(1, 8, 14);
    let feed = encode(vec![vehicle("V1", Some("T100"), Some(2), None, posix(1, 8, 14))]);
    monitor.run_cycle(Ok(snapshot(&feed, now)), now);

    assert_eq!(monitor.history().mean_delay(&RouteId::new("R1")), Some(180.0));
    assert_eq!(monitor.history().mean_delay(&RouteId::new("R2")), Some(720.0));
    assert_eq!(monitor.history().mean_delay(&RouteId::new("N")), None);

    let path = std::env::temp_dir().join("gtfs_rt_reconciler_integration_history.json");
    monitor.history().save(&path).unwrap();
    assert_eq!(&LineDelayHistory::load(&path).unwrap(), monitor.history());
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_undecodable_feed_reports_every_trip_absent() {
    let mut monitor = Monitor::new(schedule(), LineDelayHistory::new(), ActivityWindow::default());
    let now = local(1, 8, 12);

    let decoded = parse_feed(&[0xFF, 0xFF, 0xFF]).map(|feed| RealtimeSnapshot::from_feed(&feed, &Tz::UTC, now));
    assert!(decoded.is_err());

    let report = monitor.run_cycle(decoded, now);
    assert_eq!(report.absent.len(), 3);
    assert!(report.matched.is_empty());
    assert!(monitor.history().is_empty());
}
