//! Strongly-typed identifiers for schedule and realtime entities.
//!
//! Each entity kind gets its own newtype so a vehicle id can never be looked
//! up where a trip id is expected. All identifiers are `Arc<str>` backed and
//! ordered lexicographically, which is what every deterministic tie-break in
//! the reconciler relies on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

macro_rules! impl_identifier {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl AsRef<str>) -> Self {
                Self(s.as_ref().into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

impl_identifier!(
    /// `trip_id` from `trips.txt`, or the trip a vehicle claims to run.
    TripId
);
impl_identifier!(
    /// `route_id`; the key of the per-line delay history.
    RouteId
);
impl_identifier!(
    /// `service_id` shared by calendars and trips.
    ServiceId
);
impl_identifier!(
    /// Vehicle identity as reported by the realtime feed.
    VehicleId
);
impl_identifier!(StopId);
