//! Output formatting and persistence for cycle results.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use tracing::{debug, info};

use crate::reconcile::ReconciliationReport;
use crate::stats::CycleStats;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs cycle statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &CycleStats) {
    debug!("{:#?}", stats);
}

/// Logs a full reconciliation report as pretty-printed JSON.
pub fn print_json(report: &ReconciliationReport) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Appends a [`CycleStats`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &Path, stats: &CycleStats) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(stats)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ObservedVehicle;
    use crate::reconcile::reconcile;
    use chrono::NaiveDate;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        let stats = CycleStats::default();
        print_pretty(&stats);
    }

    #[test]
    fn test_print_json_does_not_panic() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        print_json(&reconcile(&[], &[], now)).unwrap();
    }

    #[test]
    fn test_append_record_creates_file() {
        let path = temp_path("gtfs_rt_reconciler_test_create.csv");
        let _ = fs::remove_file(&path); // clean up any prior run

        let stats = CycleStats::default();
        append_record(&path, &stats).unwrap();

        assert!(path.exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.is_empty());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("gtfs_rt_reconciler_test_header.csv");
        let _ = fs::remove_file(&path);

        let stats = CycleStats::default();
        append_record(&path, &stats).unwrap();
        append_record(&path, &stats).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // Header line should appear exactly once
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_columns_follow_cycle_stats() {
        let path = temp_path("gtfs_rt_reconciler_test_columns.csv");
        let _ = fs::remove_file(&path);

        let now = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let report = reconcile(&[], &[ObservedVehicle::new("V9")], now);
        let stats = CycleStats::from_report(&report).with_feed("ruban");
        append_record(&path, &stats).unwrap();
        append_record(&path, &CycleStats::from_error(now, "fetch", "timed out")).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            headers,
            vec![
                "timestamp",
                "feed",
                "active_trips",
                "matched",
                "absent",
                "superseded",
                "vehicles_seen",
                "duplicate_trips",
                "duplicate_vehicles",
                "orphans",
                "unassigned",
                "with_delay",
                "early",
                "on_time",
                "late",
                "mean_delay_seconds",
                "error_type",
                "error_message",
            ]
        );

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "ruban");
        assert_eq!(&rows[0][6], "1");
        assert_eq!(&rows[0][10], "1");
        assert_eq!(&rows[0][15], "");
        assert_eq!(&rows[1][16], "fetch");
        assert_eq!(&rows[1][17], "timed out");

        fs::remove_file(&path).unwrap();
    }
}
