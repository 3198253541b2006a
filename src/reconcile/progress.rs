//! Locating a vehicle along its trip: delay and next stop.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::identifiers::StopId;
use crate::realtime::StopProgress;
use crate::schedule::{ActiveTrip, ScheduledStop};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum NextStop {
    Upcoming {
        stop_id: StopId,
        stop_sequence: u32,
        /// Scheduled arrival, seconds since service-day midnight.
        arrival: u32,
    },
    /// The vehicle is at the last stop of its trip.
    Terminus,
    /// Progress could not be placed on the trip.
    Unknown,
}

/// Index of the stop the vehicle is at: the greatest stop sequence at or
/// before the reported one, else the first stop with the reported stop id.
pub fn current_stop_index(stops: &[ScheduledStop], progress: &StopProgress) -> Option<usize> {
    if let Some(sequence) = progress.stop_sequence {
        return stops.iter().rposition(|s| s.stop_sequence <= sequence);
    }
    let stop_id = progress.stop_id.as_ref()?;
    stops.iter().position(|s| &s.stop_id == stop_id)
}

/// Signed delay in seconds (positive = late) of a vehicle seen at `at`
/// against the scheduled arrival of its current stop.
pub fn delay_seconds(active: &ActiveTrip, progress: &StopProgress, at: NaiveDateTime) -> Option<i64> {
    let stops = &active.trip.stops;
    let current = &stops[current_stop_index(stops, progress)?];
    Some(active.offset_at(at) - i64::from(current.arrival))
}

pub fn next_stop(stops: &[ScheduledStop], progress: &StopProgress) -> NextStop {
    let Some(current) = current_stop_index(stops, progress) else {
        return NextStop::Unknown;
    };
    match stops.get(current + 1) {
        Some(next) => NextStop::Upcoming {
            stop_id: next.stop_id.clone(),
            stop_sequence: next.stop_sequence,
            arrival: next.arrival,
        },
        None => NextStop::Terminus,
    }
}
