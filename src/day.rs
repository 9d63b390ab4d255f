//! Logical day resolution.
//!
//! A logical day does not start at midnight but at a configurable boundary hour
//! (04:00 by default), so late-night activity is attributed to the day it
//! belongs to in practice. All arithmetic here is on local wall-clock time.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use eyre::{Result, eyre};
use std::iter;

pub const DEFAULT_BOUNDARY_HOUR: u32 = 4;

/// The hour of day at which one logical day ends and the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    start: NaiveTime,
}

/// A resolved logical day: its identifier and the half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalDay {
    pub id: NaiveDate,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(DEFAULT_BOUNDARY_HOUR, 0, 0).unwrap_or_default(),
        }
    }
}

impl DayBoundary {
    pub fn new(hour: u32) -> Result<Self> {
        let start = NaiveTime::from_hms_opt(hour, 0, 0)
            .ok_or_else(|| eyre!("Day start hour must be between 0 and 23, got {}", hour))?;
        Ok(Self { start })
    }

    pub fn hour(&self) -> u32 {
        self.start.hour()
    }

    /// Label written into the artifact metadata, e.g. `04:00`.
    pub fn label(&self) -> String {
        format!("{:02}:00", self.hour())
    }

    /// The boundary instant on the given calendar date.
    pub fn boundary_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.start)
    }

    /// Map an instant to the logical day containing it.
    ///
    /// Instants strictly before the boundary belong to the previous calendar date;
    /// the boundary instant itself opens the new day.
    pub fn resolve(&self, instant: NaiveDateTime) -> LogicalDay {
        let date = instant.date();
        let id = if instant < self.boundary_on(date) {
            date.pred_opt().unwrap_or(date)
        } else {
            date
        };
        self.day(id)
    }

    /// The logical day named by `id`.
    pub fn day(&self, id: NaiveDate) -> LogicalDay {
        let next = id.succ_opt().unwrap_or(id);
        LogicalDay {
            id,
            start: self.boundary_on(id),
            end: self.boundary_on(next),
        }
    }

    /// Logical days covered by a lookback window ending at `reference`, newest first.
    ///
    /// Performs no range validation on `count`; callers bound it. The list is
    /// strictly decreasing and stops early at the start of the calendar.
    pub fn list_days(&self, count: u32, reference: NaiveDateTime) -> Vec<NaiveDate> {
        let newest = self.resolve(reference).id;
        iter::successors(Some(newest), |d| d.pred_opt())
            .take(count as usize)
            .collect()
    }

    /// True once the boundary following `day` has passed, i.e. no new activity
    /// can be attributed to it anymore.
    pub fn is_complete(&self, day: NaiveDate, now: NaiveDateTime) -> bool {
        now >= self.day(day).end
    }
}
