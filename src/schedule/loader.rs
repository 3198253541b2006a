//! Reads the static GTFS tables from a directory or a `.zip` archive.

use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::ScheduleError;
use crate::schedule::tables::ScheduleTables;

/// Where the tables come from; one implementation per container format.
trait TableSource {
    /// Opens `name`, or `None` if the file is not part of the feed.
    fn open(&mut self, name: &str) -> Result<Option<Box<dyn Read + '_>>, ScheduleError>;
}

struct DirectorySource<'a>(&'a Path);

impl TableSource for DirectorySource<'_> {
    fn open(&mut self, name: &str) -> Result<Option<Box<dyn Read + '_>>, ScheduleError> {
        let path = self.0.join(name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Box::new(File::open(path)?)))
    }
}

struct ZipSource(zip::ZipArchive<File>);

impl TableSource for ZipSource {
    fn open(&mut self, name: &str) -> Result<Option<Box<dyn Read + '_>>, ScheduleError> {
        match self.0.by_name(name) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(zip::result::ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Loads the schedule tables at `path` (directory or zip archive).
///
/// # Errors
///
/// Fails if a required file is missing or a table is structurally malformed.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn load_tables(path: &Path) -> Result<ScheduleTables, ScheduleError> {
    let tables = if path.is_dir() {
        read_all(&mut DirectorySource(path))?
    } else {
        let archive = zip::ZipArchive::new(File::open(path)?)?;
        read_all(&mut ZipSource(archive))?
    };

    info!(
        trips = tables.trips.len(),
        stop_times = tables.stop_times.len(),
        calendar = tables.calendar.len(),
        calendar_dates = tables.calendar_dates.len(),
        "Schedule tables read"
    );
    Ok(tables)
}

fn read_all(source: &mut dyn TableSource) -> Result<ScheduleTables, ScheduleError> {
    let calendar = read_table(source, "calendar.txt")?;
    let calendar_dates = read_table(source, "calendar_dates.txt")?;
    if calendar.is_none() && calendar_dates.is_none() {
        return Err(ScheduleError::MissingFile(
            "calendar.txt or calendar_dates.txt".to_string(),
        ));
    }

    Ok(ScheduleTables {
        routes: read_table(source, "routes.txt")?.unwrap_or_default(),
        stops: read_table(source, "stops.txt")?.unwrap_or_default(),
        trips: required(source, "trips.txt")?,
        stop_times: required(source, "stop_times.txt")?,
        calendar: calendar.unwrap_or_default(),
        calendar_dates: calendar_dates.unwrap_or_default(),
    })
}

fn required<T: DeserializeOwned>(
    source: &mut dyn TableSource,
    name: &str,
) -> Result<Vec<T>, ScheduleError> {
    read_table(source, name)?.ok_or_else(|| ScheduleError::MissingFile(name.to_string()))
}

fn read_table<T: DeserializeOwned>(
    source: &mut dyn TableSource,
    name: &str,
) -> Result<Option<Vec<T>>, ScheduleError> {
    let Some(reader) = source.open(name)? else {
        debug!(file = name, "Optional table absent");
        return Ok(None);
    };

    let csv_error = |source: csv::Error| ScheduleError::Csv {
        file: name.to_string(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.deserialize::<T>() {
        rows.push(result.map_err(csv_error)?);
    }

    debug!(file = name, rows = rows.len(), "Table read");
    Ok(Some(rows))
}
