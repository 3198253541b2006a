//! History Aggregator: rolling mean delay per line across cycles.
//!
//! The aggregate is an explicit value owned by whoever drives the cycles.
//! Only that owner mutates it, folding each report exactly once; wrap it in
//! a `Mutex` if cycles ever overlap.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

use crate::identifiers::RouteId;
use crate::reconcile::ReconciliationReport;

/// Running count and sum of delay observations for one route.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDelay {
    pub count: u64,
    pub sum_seconds: i64,
}

impl LineDelay {
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum_seconds as f64 / self.count as f64)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDelayHistory {
    lines: BTreeMap<RouteId, LineDelay>,
}

impl LineDelayHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds every delayed match of `report` into its route's counters and
    /// returns how many observations were added. The report's instant is
    /// not consulted: wall clocks repeat at DST fall-back and on replays.
    pub fn fold(&mut self, report: &ReconciliationReport) -> usize {
        let mut folded = 0;
        for (route_id, delay) in report.route_delays() {
            let line = self.lines.entry(route_id.clone()).or_default();
            line.count += 1;
            line.sum_seconds += delay;
            folded += 1;
        }

        debug!(folded, routes = self.lines.len(), "History updated");
        folded
    }

    /// Mean delay in seconds, or `None` when the route has no observations.
    pub fn mean_delay(&self, route_id: &RouteId) -> Option<f64> {
        self.lines.get(route_id).and_then(LineDelay::mean)
    }

    pub fn line(&self, route_id: &RouteId) -> Option<LineDelay> {
        self.lines.get(route_id).copied()
    }

    pub fn lines(&self) -> impl Iterator<Item = (&RouteId, &LineDelay)> {
        self.lines.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds prior aggregates, e.g. from a previous run.
    pub fn seed(&mut self, lines: impl IntoIterator<Item = (RouteId, LineDelay)>) {
        for (route_id, prior) in lines {
            let line = self.lines.entry(route_id).or_default();
            line.count += prior.count;
            line.sum_seconds += prior.sum_seconds;
        }
    }

    pub fn reset(&mut self) {
        self.lines.clear();
    }

    /// Loads a history saved by [`save`](Self::save); a missing file is an
    /// empty history.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing history {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }
}
