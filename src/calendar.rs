// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Calendar-day date helpers and the business clock.
//!
//! Dates are [`NaiveDate`]s: whole days on the business calendar, no time of day
//! and no UTC shifting.

use crate::base::Period;
use chrono::{Days, Local, NaiveDate};
use parking_lot::Mutex;

/// Source of "today" on the business calendar.
///
/// The engine reads the clock once per operation and uses that date for every
/// check made during the call.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to a date, movable by hand.
#[derive(Debug)]
pub struct FixedClock {
    today: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        *self.today.lock() = today;
    }

    /// Moves the clock forward by `days`.
    pub fn advance(&self, days: u64) {
        let mut today = self.today.lock();
        *today = today.checked_add_days(Days::new(days)).unwrap_or(*today);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock()
    }
}

/// The date for `day` of `period`, clamped to the month's last day.
///
/// ```
/// use chrono::NaiveDate;
/// use consortium_settlement::{Period, calendar::day_in_period};
///
/// let feb = Period::new(2026, 2).unwrap();
/// assert_eq!(day_in_period(feb, 31), NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
/// ```
pub fn day_in_period(period: Period, day: u32) -> NaiveDate {
    let day = day.clamp(1, period.days());
    period
        .first_day()
        .checked_add_days(Days::new(u64::from(day - 1)))
        .unwrap_or_else(|| period.last_day())
}

/// `true` once `as_of` is strictly past `due`. The due date itself is on time.
pub fn is_past(as_of: NaiveDate, due: NaiveDate) -> bool {
    as_of > due
}

/// Adds whole days, saturating at the calendar's end.
pub fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_in_period_clamps() {
        let april = Period::new(2026, 4).unwrap();
        assert_eq!(day_in_period(april, 10), date(2026, 4, 10));
        assert_eq!(day_in_period(april, 31), date(2026, 4, 30));
        assert_eq!(day_in_period(april, 0), date(2026, 4, 1));
    }

    #[test]
    fn due_date_is_not_past_on_the_day() {
        let due = date(2026, 10, 10);
        assert!(!is_past(date(2026, 10, 9), due));
        assert!(!is_past(due, due));
        assert!(is_past(date(2026, 10, 11), due));
    }

    #[test]
    fn fixed_clock_moves() {
        let clock = FixedClock::new(date(2026, 1, 31));
        clock.advance(1);
        assert_eq!(clock.today(), date(2026, 2, 1));
        clock.set(date(2025, 5, 5));
        assert_eq!(clock.today(), date(2025, 5, 5));
    }
}
