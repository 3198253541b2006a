//! Error taxonomy for schedule loading and feed decoding.
//!
//! Matching anomalies are not errors: they are recorded inside the
//! [`ReconciliationReport`](crate::reconcile::ReconciliationReport).

use thiserror::Error;

use crate::identifiers::{ServiceId, TripId};

/// A problem with one schedule entity. The entity is dropped and counted;
/// the rest of the schedule still loads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("trip {trip_id} references unknown service {service_id}")]
    UnknownService { trip_id: TripId, service_id: ServiceId },

    #[error("trip {0} has no stop times")]
    NoStopTimes(TripId),

    #[error("stop time references unknown trip {0}")]
    OrphanStopTime(TripId),

    #[error("trip {trip_id} stop {stop_sequence} has neither arrival nor departure time")]
    UntimedStop { trip_id: TripId, stop_sequence: u32 },

    #[error("trip {trip_id} has malformed time {value:?}")]
    MalformedTime { trip_id: TripId, value: String },

    #[error("trip {trip_id} has malformed stop sequence {value:?}")]
    MalformedStopSequence { trip_id: TripId, value: String },

    #[error("trip {trip_id} goes back in time at stop {stop_sequence}")]
    DecreasingOffsets { trip_id: TripId, stop_sequence: u32 },

    #[error("trip {0} is defined more than once")]
    DuplicateTrip(TripId),

    #[error("service {service_id} has malformed date {value:?}")]
    MalformedDate { service_id: ServiceId, value: String },

    #[error("service {service_id} has malformed weekday flag {value:?}")]
    MalformedWeekday { service_id: ServiceId, value: String },

    #[error("service {service_id} has unknown exception type {value:?}")]
    UnknownExceptionType { service_id: ServiceId, value: String },
}

impl LoadError {
    /// Whether this error removed a trip from the index.
    pub fn drops_trip(&self) -> bool {
        matches!(
            self,
            LoadError::UnknownService { .. }
                | LoadError::NoStopTimes(_)
                | LoadError::UntimedStop { .. }
                | LoadError::MalformedTime { .. }
                | LoadError::MalformedStopSequence { .. }
                | LoadError::DecreasingOffsets { .. }
                | LoadError::DuplicateTrip(_)
        )
    }
}

/// Failures that prevent a schedule from loading at all.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to read schedule: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed table {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("malformed archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("missing required file {0}")]
    MissingFile(String),

    #[error("schedule has no usable trips ({dropped} dropped)")]
    NoUsableTrips { dropped: usize },
}

/// The realtime payload could not be decoded into a feed message.
#[derive(Debug, Error)]
#[error("failed to decode realtime feed: {0}")]
pub struct FeedDecodeError(#[from] pub prost::DecodeError);
