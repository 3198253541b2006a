pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod identifiers;
pub mod monitor;
pub mod output;
pub mod parser;
pub mod present;
pub mod punctuality;
pub mod realtime;
pub mod reconcile;
pub mod schedule;
pub mod stats;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
