use anyhow::{Context, Result};
use chrono::Duration;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::PathBuf;

use crate::schedule::ActivityWindow;

/// Monitor settings, read from a JSON file. Every field is optional:
///
/// ```json
/// {
///   "timezone": "Europe/Paris",
///   "lead_minutes": 0,
///   "grace_minutes": 15,
///   "delay_alert_seconds": 600,
///   "history_path": "history.json"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Agency timezone; feed timestamps and the clock are read in it.
    pub timezone: Tz,
    pub lead_minutes: i64,
    pub grace_minutes: i64,
    pub delay_alert_seconds: i64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub history_path: Option<PathBuf>,
    pub stats_path: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            lead_minutes: 0,
            grace_minutes: 0,
            delay_alert_seconds: 600,
            request_timeout_secs: 15,
            user_agent: concat!("gtfs_rt_reconciler/", env!("CARGO_PKG_VERSION")).to_string(),
            history_path: None,
            stats_path: None,
        }
    }
}

impl MonitorConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
        let config = serde_json::from_str(&content).with_context(|| format!("parsing config {path}"))?;
        Ok(config)
    }

    /// Defaults when no path is given.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn activity_window(&self) -> ActivityWindow {
        ActivityWindow {
            lead: Duration::minutes(self.lead_minutes.max(0)),
            grace: Duration::minutes(self.grace_minutes.max(0)),
        }
    }
}
