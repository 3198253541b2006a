//! One polling cycle: active trips, reconciliation, history fold.

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::error::FeedDecodeError;
use crate::history::LineDelayHistory;
use crate::realtime::RealtimeSnapshot;
use crate::reconcile::{ReconciliationReport, reconcile};
use crate::schedule::{ActivityWindow, Schedule};

/// Owns the schedule and the per-line history. Cycles run one at a time
/// through `&mut self`, so the history has a single writer.
pub struct Monitor {
    schedule: Schedule,
    history: LineDelayHistory,
    window: ActivityWindow,
}

impl Monitor {
    pub fn new(schedule: Schedule, history: LineDelayHistory, window: ActivityWindow) -> Self {
        Self {
            schedule,
            history,
            window,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Swaps in a freshly loaded schedule; history is kept.
    pub fn replace_schedule(&mut self, schedule: Schedule) {
        self.schedule = schedule;
    }

    pub fn history(&self) -> &LineDelayHistory {
        &self.history
    }

    /// Runs one cycle at `now`. A feed that failed to decode counts as a
    /// snapshot with no vehicles.
    #[tracing::instrument(skip(self, snapshot, now), fields(now = %now))]
    pub fn run_cycle(
        &mut self,
        snapshot: Result<RealtimeSnapshot, FeedDecodeError>,
        now: NaiveDateTime,
    ) -> ReconciliationReport {
        let snapshot = snapshot.unwrap_or_else(|e| {
            warn!(error = %e, "No usable realtime snapshot, treating as zero vehicles");
            RealtimeSnapshot::empty(now)
        });

        let active = self.schedule.active_trips(now, self.window);
        let report = reconcile(&active, &snapshot.vehicles, now);
        let folded = self.history.fold(&report);

        info!(
            active = active.len(),
            vehicles = report.vehicles_seen,
            matched = report.matched.len(),
            absent = report.absent.len(),
            duplicates = report.duplicate_trips.len() + report.duplicate_vehicles.len(),
            folded,
            "Cycle complete"
        );
        report
    }
}
