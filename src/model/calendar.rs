//! Working-day arithmetic. Hidden weekdays (0 = Sunday .. 6 = Saturday) are
//! skipped by every duration, roll-up and scheduling calculation.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkCalendar {
    hidden: BTreeSet<u8>,
}

impl WorkCalendar {
    /// Build a calendar hiding the given weekdays. Out-of-range indices are
    /// ignored, and a set hiding the entire week degrades to no hidden days.
    pub fn from_hidden(days: impl IntoIterator<Item = u8>) -> Self {
        let hidden: BTreeSet<u8> = days.into_iter().filter(|d| *d <= 6).collect();
        if hidden.len() >= 7 {
            return Self::default();
        }
        Self { hidden }
    }

    pub fn is_working(&self, date: NaiveDate) -> bool {
        let weekday = u8::try_from(date.weekday().num_days_from_sunday()).unwrap_or(0);
        !self.hidden.contains(&weekday)
    }

    /// First working day on or after `date`, or the last representable date.
    pub fn next_working_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date;
        while !self.is_working(d) {
            match d.checked_add_days(Days::new(1)) {
                Some(next) => d = next,
                None => break,
            }
        }
        d
    }

    /// Exclusive end after consuming `days` working days starting at `start`.
    /// `start` itself counts when it is a working day. The walk stops at the
    /// calendar's last representable date.
    pub fn add_working_days(&self, start: NaiveDate, days: i64) -> NaiveDate {
        if days < 0 {
            return self.walk_back(start, days.unsigned_abs());
        }
        self.walk_forward(start, days.unsigned_abs())
    }

    /// Inverse of [`add_working_days`](Self::add_working_days): the start
    /// that ends (exclusive) at `end` after `days` working days.
    pub fn sub_working_days(&self, end: NaiveDate, days: i64) -> NaiveDate {
        if days < 0 {
            return self.walk_forward(end, days.unsigned_abs());
        }
        self.walk_back(end, days.unsigned_abs())
    }

    fn walk_forward(&self, start: NaiveDate, days: u64) -> NaiveDate {
        let mut d = start;
        let mut remaining = days;
        while remaining > 0 {
            if self.is_working(d) {
                remaining -= 1;
            }
            match d.checked_add_days(Days::new(1)) {
                Some(next) => d = next,
                None => break,
            }
        }
        d
    }

    fn walk_back(&self, end: NaiveDate, days: u64) -> NaiveDate {
        let mut d = end;
        let mut remaining = days;
        while remaining > 0 {
            match d.checked_sub_days(Days::new(1)) {
                Some(prev) => d = prev,
                None => break,
            }
            if self.is_working(d) {
                remaining -= 1;
            }
        }
        d
    }

    /// Number of working days in `[start, end)`.
    pub fn working_days_between(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        let mut d = start;
        let mut count = 0;
        while d < end {
            if self.is_working(d) {
                count += 1;
            }
            d = succ(d);
        }
        count
    }
}

fn succ(d: NaiveDate) -> NaiveDate {
    d.checked_add_days(Days::new(1)).unwrap_or(d)
}
