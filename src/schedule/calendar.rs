//! Service calendar: which `service_id`s run on which dates.
//!
//! Implements `calendar.txt` weekly rules and `calendar_dates.txt`
//! exceptions. An exception for a date always overrides the weekly rule.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::LoadError;
use crate::identifiers::ServiceId;
use crate::schedule::tables::{
    CalendarDateRecord, CalendarRecord, parse_gtfs_date, parse_weekday_flag,
};

/// Compact representation of which weekdays a service runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeekdayFlags {
    flags: u8,
}

impl WeekdayFlags {
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    pub fn set(&mut self, weekday: Weekday) {
        self.flags |= 1 << weekday.num_days_from_monday();
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        (self.flags & (1 << weekday.num_days_from_monday())) != 0
    }

    /// Flags in `calendar.txt` column order, Monday first.
    pub fn from_days(days: [bool; 7]) -> Self {
        let mut flags = Self::new();
        for (offset, runs) in days.into_iter().enumerate() {
            if runs {
                flags.flags |= 1 << offset;
            }
        }
        flags
    }
}

/// `exception_type` of a `calendar_dates.txt` row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionType {
    Added,
    Removed,
}

impl ExceptionType {
    pub fn from_gtfs(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(Self::Added),
            "2" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Regular weekly operation between two inclusive dates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeeklyRule {
    pub weekdays: WeekdayFlags,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Operating days of one service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceCalendar {
    pub service_id: ServiceId,
    /// Absent for services defined only through `calendar_dates.txt`.
    pub rule: Option<WeeklyRule>,
    pub exceptions: BTreeMap<NaiveDate, ExceptionType>,
}

impl ServiceCalendar {
    pub fn new(service_id: ServiceId) -> Self {
        Self {
            service_id,
            rule: None,
            exceptions: BTreeMap::new(),
        }
    }

    /// Check if the service runs on a given date.
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        match self.exceptions.get(&date) {
            Some(ExceptionType::Added) => true,
            Some(ExceptionType::Removed) => false,
            None => self.rule.as_ref().is_some_and(|rule| {
                date >= rule.start_date
                    && date <= rule.end_date
                    && rule.weekdays.contains(date.weekday())
            }),
        }
    }
}

/// All service calendars of a schedule, keyed by service id.
#[derive(Clone, Debug, Default)]
pub struct Calendar {
    services: BTreeMap<ServiceId, ServiceCalendar>,
}

impl Calendar {
    pub fn new(services: impl IntoIterator<Item = ServiceCalendar>) -> Self {
        Self {
            services: services
                .into_iter()
                .map(|s| (s.service_id.clone(), s))
                .collect(),
        }
    }

    /// Builds the calendar from raw rows. Rows with malformed dates, weekday
    /// flags or exception types are skipped and returned as errors.
    pub fn from_records(
        calendar: &[CalendarRecord],
        calendar_dates: &[CalendarDateRecord],
    ) -> (Self, Vec<LoadError>) {
        let mut services: BTreeMap<ServiceId, ServiceCalendar> = BTreeMap::new();
        let mut errors = Vec::new();

        for row in calendar {
            let service_id = ServiceId::new(row.service_id.trim());
            let dates = parse_gtfs_date(&row.start_date).zip(parse_gtfs_date(&row.end_date));
            let Some((start_date, end_date)) = dates else {
                let value = format!("{}..{}", row.start_date, row.end_date);
                errors.push(LoadError::MalformedDate { service_id, value });
                continue;
            };

            let cells = [
                &row.monday,
                &row.tuesday,
                &row.wednesday,
                &row.thursday,
                &row.friday,
                &row.saturday,
                &row.sunday,
            ];
            let days = cells.map(|cell| parse_weekday_flag(cell));
            if let Some(bad) = days.iter().position(Option::is_none) {
                let value = cells[bad].clone();
                errors.push(LoadError::MalformedWeekday { service_id, value });
                continue;
            }
            let weekdays = WeekdayFlags::from_days(days.map(|d| d.unwrap_or(false)));

            services
                .entry(service_id.clone())
                .or_insert_with(|| ServiceCalendar::new(service_id))
                .rule = Some(WeeklyRule {
                weekdays,
                start_date,
                end_date,
            });
        }

        for row in calendar_dates {
            let service_id = ServiceId::new(row.service_id.trim());
            let Some(date) = parse_gtfs_date(&row.date) else {
                errors.push(LoadError::MalformedDate {
                    service_id,
                    value: row.date.clone(),
                });
                continue;
            };
            let Some(exception) = ExceptionType::from_gtfs(&row.exception_type) else {
                errors.push(LoadError::UnknownExceptionType {
                    service_id,
                    value: row.exception_type.clone(),
                });
                continue;
            };

            services
                .entry(service_id.clone())
                .or_insert_with(|| ServiceCalendar::new(service_id))
                .exceptions
                .insert(date, exception);
        }

        (Self { services }, errors)
    }

    pub fn contains(&self, service_id: &ServiceId) -> bool {
        self.services.contains_key(service_id)
    }

    pub fn get(&self, service_id: &ServiceId) -> Option<&ServiceCalendar> {
        self.services.get(service_id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Services running on `date`, weekly rules first, exceptions applied last.
    pub fn services_on(&self, date: NaiveDate) -> BTreeSet<ServiceId> {
        self.services
            .values()
            .filter(|s| s.runs_on(date))
            .map(|s| s.service_id.clone())
            .collect()
    }
}
