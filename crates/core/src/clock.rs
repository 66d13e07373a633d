//! Calendar date source for resolving the current story.

use crate::constants::DATE_FORMAT;
use crate::{StoryError, StoryResult};
use chrono::{Days, Local, NaiveDate};
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

/// Supplies "today" to the story service.
pub trait Clock: Send + Sync + Debug {
    fn today(&self) -> NaiveDate;
}

/// The local wall-clock date.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A settable date, used to simulate rotation.
#[derive(Debug)]
pub struct FixedClock(Mutex<NaiveDate>);

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self(Mutex::new(date))
    }

    /// Moves the clock forward by `days`, saturating at the maximum date.
    pub fn advance_days(&self, days: u64) {
        let mut date = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *date = date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> StoryResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| StoryError::InvalidDate(format!("'{value}': {e}")))
}
