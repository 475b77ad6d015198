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

//! Core identifier types and the billing period.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a consortium (the managed building or neighborhood).
    ConsortiumId
);
id_type!(
    /// Identifier of an operative/functional unit.
    UnitId
);
id_type!(
    /// Identifier of a unit type, which carries the automatic prorrateo index.
    UnitTypeId
);
id_type!(
    /// Identifier of a consortium-level expense.
    ExpenseId
);
id_type!(
    /// Identifier of a period liquidation.
    LiquidationId
);
id_type!(
    /// Identifier of a unit ledger entry (liquidación de unidad).
    LedgerEntryId
);
id_type!(
    /// Identifier of a payment.
    ///
    /// Payment IDs are unique across both payment targets.
    PaymentId
);
id_type!(
    /// Identifier of a collection/disbursement account.
    AccountId
);
id_type!(
    /// Identifier of a person (owner, tenant or other payer).
    PersonId
);
id_type!(
    /// Identifier of an expense provider.
    ProviderId
);

/// A billing period: one calendar month of one year.
///
/// Serialized as `YYYY-MM`. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

/// Error returned when parsing or building an invalid [`Period`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid period '{0}' (expected YYYY-MM)")]
pub struct PeriodParseError(pub String);

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodParseError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodParseError(format!("{year:04}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// The period containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The calendar month after this one.
    pub fn next(&self) -> Self {
        self.plus_months(1)
    }

    pub fn plus_months(&self, months: u32) -> Self {
        let zero_based = self.year * 12 + (self.month as i32 - 1) + months as i32;
        Self {
            year: zero_based.div_euclid(12),
            month: zero_based.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        // Month is validated on construction, day 1 always exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    /// Number of days in this month.
    pub fn days(&self) -> u32 {
        self.last_day().day()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodParseError(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Period::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}
