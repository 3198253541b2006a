//! CLI entry point for the GTFS-RT reconciler.
//!
//! `monitor` polls a vehicle-positions feed against a static GTFS schedule;
//! `active` lists the trips the schedule expects at an instant.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use gtfs_rt_reconciler::{
    config::MonitorConfig,
    fetch::{BasicClient, FeedSource, ReplayDir, replay_pause},
    history::LineDelayHistory,
    monitor::Monitor,
    output::{append_record, print_json, print_pretty},
    parser::parse_feed,
    present::{PresentOptions, present},
    realtime::{RealtimeSnapshot, decode::local_time},
    schedule::{Schedule, loader::load_tables},
    stats::CycleStats,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_rt_reconciler")]
#[command(about = "Reconcile GTFS-RT vehicle positions with the static schedule", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a vehicle-positions feed and reconcile it every cycle
    Monitor {
        /// GTFS directory or zip archive
        #[arg(value_name = "GTFS")]
        gtfs: PathBuf,

        /// Feed URL, protobuf file (.gz accepted), or a snapshot directory
        /// with --replay-dir
        #[arg(value_name = "FILE_OR_URL")]
        feed: String,

        /// Treat FILE_OR_URL as a directory of .pb snapshots, one per cycle
        #[arg(long, default_value_t = false)]
        replay_dir: bool,

        /// Replay speed factor (2.0 = twice as fast)
        #[arg(long, default_value_t = 1.0)]
        simulation_speed: f64,

        /// Seconds between cycles (0 = single cycle)
        #[arg(short, long, default_value_t = 60)]
        interval: u64,

        /// Number of cycles to run (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        cycles: usize,

        /// JSON config file
        #[arg(short, long)]
        config: Option<String>,

        /// JSON file holding the per-line delay history
        #[arg(long)]
        history: Option<PathBuf>,

        /// CSV file to append one row per cycle to
        #[arg(short, long)]
        stats: Option<PathBuf>,

        /// Replay at a fixed local instant, e.g. 2024-03-01T08:05:00
        #[arg(long)]
        at: Option<NaiveDateTime>,

        /// Only log absent trips, duplicates and anomalies
        #[arg(long, default_value_t = false)]
        alert_only: bool,

        /// Only list this vehicle (label or id)
        #[arg(long)]
        follow: Option<String>,

        /// Log the full report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Reload the static schedule before every cycle
        #[arg(long, default_value_t = false)]
        refresh_gtfs: bool,
    },
    /// List the trips active at an instant
    Active {
        /// GTFS directory or zip archive
        #[arg(value_name = "GTFS")]
        gtfs: PathBuf,

        /// Local instant, defaults to now
        #[arg(long)]
        at: Option<NaiveDateTime>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/gtfs_rt_reconciler.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_reconciler.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor {
            gtfs,
            feed,
            replay_dir,
            simulation_speed,
            interval,
            cycles,
            config,
            history,
            stats,
            at,
            alert_only,
            follow,
            json,
            refresh_gtfs,
        } => {
            let config = MonitorConfig::load_or_default(config.as_deref())?;
            let replay = if replay_dir {
                Some(ReplayDir::open(Path::new(&feed))?)
            } else {
                None
            };
            let run = MonitorRun {
                history_path: history.or_else(|| config.history_path.clone()),
                stats_path: stats.or_else(|| config.stats_path.clone()),
                options: PresentOptions {
                    alert_only,
                    follow,
                    delay_alert_seconds: config.delay_alert_seconds,
                },
                source: FeedSource::parse(&feed),
                replay,
                simulation_speed,
                gtfs,
                interval,
                cycles,
                at,
                json,
                refresh_gtfs,
                config,
            };
            monitor(run).await?;
        }
        Commands::Active { gtfs, at, config } => {
            let config = MonitorConfig::load_or_default(config.as_deref())?;
            let schedule = load_schedule(&gtfs)?;
            let at = at.unwrap_or_else(|| local_now(&config.timezone));
            let active = schedule.active_trips(at, config.activity_window());

            info!(at = %at, count = active.len(), "Active trips");
            for trip in &active {
                info!(
                    trip = %trip.trip.trip_id,
                    line = schedule.route_name(&trip.trip.route_id),
                    service_date = %trip.service_date,
                    destination = trip.trip.headsign.as_deref().unwrap_or("?"),
                    "Active trip"
                );
            }
        }
    }

    Ok(())
}

struct MonitorRun {
    gtfs: PathBuf,
    source: FeedSource,
    replay: Option<ReplayDir>,
    simulation_speed: f64,
    interval: u64,
    cycles: usize,
    at: Option<NaiveDateTime>,
    history_path: Option<PathBuf>,
    stats_path: Option<PathBuf>,
    options: PresentOptions,
    json: bool,
    refresh_gtfs: bool,
    config: MonitorConfig,
}

fn local_now(tz: &Tz) -> NaiveDateTime {
    Utc::now().with_timezone(tz).naive_local()
}

/// Reads and indexes the static schedule, logging what was dropped.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
fn load_schedule(path: &Path) -> Result<Schedule> {
    let tables = load_tables(path)?;
    let (schedule, report) = Schedule::from_tables(&tables)?;
    info!(
        trips = report.trips_loaded,
        services = report.services_loaded,
        dropped_trips = report.dropped_trips(),
        problems = report.errors.len(),
        "Schedule loaded"
    );
    Ok(schedule)
}

/// Runs polling cycles until the cycle limit is reached.
#[tracing::instrument(skip(run), fields(source = %run.source, interval = run.interval, cycles = run.cycles))]
async fn monitor(run: MonitorRun) -> Result<()> {
    let tz = run.config.timezone;
    let client = BasicClient::new(
        std::time::Duration::from_secs(run.config.request_timeout_secs),
        &run.config.user_agent,
    )
    .context("building HTTP client")?;

    let history = match &run.history_path {
        Some(path) => LineDelayHistory::load(path)?,
        None => LineDelayHistory::new(),
    };
    let mut monitor = Monitor::new(
        load_schedule(&run.gtfs)?,
        history,
        run.config.activity_window(),
    );

    // A replay always walks its files; interval 0 only drops the pause.
    let single = run.interval == 0 && run.replay.is_none();
    if !single && run.cycles == 0 && run.replay.is_none() {
        info!(interval = run.interval, "Monitoring infinitely. Press Ctrl+C to stop.");
    }

    let mut cycle = 0;
    loop {
        if (single && cycle >= 1) || (run.cycles > 0 && cycle >= run.cycles) {
            break;
        }

        let source = match &run.replay {
            Some(replay) => match replay.source(cycle) {
                Some(source) => source,
                None => break,
            },
            None => run.source.clone(),
        };

        // --at instants advance by one interval per cycle.
        let now = match run.at {
            Some(at) => at + Duration::seconds((run.interval * cycle as u64) as i64),
            None => local_now(&tz),
        };
        cycle += 1;

        if run.refresh_gtfs && cycle > 1 {
            match load_schedule(&run.gtfs) {
                Ok(schedule) => monitor.replace_schedule(schedule),
                Err(e) => warn!(error = %e, "Schedule reload failed, keeping previous schedule"),
            }
        }

        info!(cycle, at = %now, source = %source, "Starting cycle");
        match source.fetch(&client).await {
            Ok(bytes) => {
                let decoded = parse_feed(&bytes);
                // A replayed snapshot is judged at its own header time.
                let now = match (&run.replay, run.at, &decoded) {
                    (Some(_), None, Ok(feed)) => feed
                        .header
                        .timestamp
                        .and_then(|t| local_time(t, &tz))
                        .unwrap_or(now),
                    _ => now,
                };
                let decode_error = decoded.as_ref().err().map(|e| e.to_string());
                let snapshot = decoded.map(|feed| RealtimeSnapshot::from_feed(&feed, &tz, now));
                let report = monitor.run_cycle(snapshot, now);

                if run.json {
                    print_json(&report)?;
                } else {
                    present(&report, monitor.schedule(), monitor.history(), &run.options);
                }

                let mut stats = CycleStats::from_report(&report).with_feed(&source.to_string());
                if let Some(message) = decode_error {
                    stats.error_type = Some("parse_error".to_string());
                    stats.error_message = Some(message);
                }
                print_pretty(&stats);
                write_stats(run.stats_path.as_deref(), &stats);

                if let Some(path) = &run.history_path {
                    if let Err(e) = monitor.history().save(path) {
                        error!(error = %e, "Failed to save history");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Feed fetch failed");
                let stats = CycleStats::from_error(now, "fetch_error", &e.to_string())
                    .with_feed(&source.to_string());
                write_stats(run.stats_path.as_deref(), &stats);
            }
        }

        let replay_done = run.replay.as_ref().is_some_and(|r| cycle >= r.len());
        let last = single || replay_done || (run.cycles > 0 && cycle >= run.cycles);
        if !last {
            let pause = match run.replay {
                Some(_) => replay_pause(run.interval, run.simulation_speed),
                None => std::time::Duration::from_secs(run.interval),
            };
            info!(pause_secs = pause.as_secs_f64(), "Waiting before next cycle");
            tokio::time::sleep(pause).await;
        }
    }

    info!(cycles = cycle, "Finished monitoring");
    Ok(())
}

fn write_stats(path: Option<&Path>, stats: &CycleStats) {
    let Some(path) = path else { return };
    if let Err(e) = append_record(path, stats) {
        error!(error = %e, "Failed to write cycle stats");
    }
}
