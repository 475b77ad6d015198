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

//! Late-payment surcharge calculation.
//!
//! The surcharge owed on a base amount depends on where `as_of` falls relative
//! to the due dates of a liquidation:
//!
//! ```text
//!  ── first due ──────────── second due ──────────►
//!  │  none       │  first tier         │  second tier
//! ```
//!
//! Tiers replace each other. Under [`InterestPolicy::Compuesto`] the second
//! tier is computed on `base + first tier`, under [`InterestPolicy::Acumulado`]
//! on the original base.

use crate::error::SettlementError;
use crate::money::{percent_of, round2};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the second-tier surcharge is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestPolicy {
    /// Simple: second tier on the original base.
    #[default]
    Acumulado,
    /// Compound: second tier on base plus first-tier surcharge.
    Compuesto,
}

/// A due date and the surcharge percentage applied once it passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDate {
    pub date: NaiveDate,
    pub surcharge_pct: Decimal,
}

/// Due-date schedule of an issued liquidation.
///
/// # Invariants
///
/// - Percentages are non-negative.
/// - The second due date, when present, is after the first one and its
///   percentage is not lower than the first one's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueSchedule {
    first: DueDate,
    second: Option<DueDate>,
}

/// Which surcharge tier applies on a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SurchargeTier {
    None,
    First,
    Second,
}

impl DueSchedule {
    pub fn new(first: DueDate, second: Option<DueDate>) -> Result<Self, SettlementError> {
        if first.surcharge_pct < Decimal::ZERO {
            return Err(SettlementError::InvalidSchedule(
                "surcharge percentage is negative",
            ));
        }
        if let Some(second) = second {
            if second.date <= first.date {
                return Err(SettlementError::InvalidSchedule(
                    "second due date must follow the first",
                ));
            }
            if second.surcharge_pct < first.surcharge_pct {
                return Err(SettlementError::InvalidSchedule(
                    "second surcharge percentage is below the first",
                ));
            }
        }
        Ok(Self { first, second })
    }

    /// A schedule with only one due date.
    pub fn single(date: NaiveDate, surcharge_pct: Decimal) -> Result<Self, SettlementError> {
        Self::new(
            DueDate {
                date,
                surcharge_pct,
            },
            None,
        )
    }

    pub fn first(&self) -> DueDate {
        self.first
    }

    pub fn second(&self) -> Option<DueDate> {
        self.second
    }

    /// The last configured due date.
    pub fn final_due(&self) -> NaiveDate {
        self.second.map_or(self.first.date, |second| second.date)
    }

    pub fn tier(&self, as_of: NaiveDate) -> SurchargeTier {
        match self.second {
            Some(second) if crate::calendar::is_past(as_of, second.date) => SurchargeTier::Second,
            _ if crate::calendar::is_past(as_of, self.first.date) => SurchargeTier::First,
            _ => SurchargeTier::None,
        }
    }
}

/// Surcharge currently owed on `base` as of a date.
///
/// Returns zero for units that are not interest-eligible.
///
/// ```
/// use chrono::NaiveDate;
/// use consortium_settlement::surcharge::{current_surcharge, DueDate, DueSchedule, InterestPolicy};
/// use rust_decimal_macros::dec;
///
/// let schedule = DueSchedule::new(
///     DueDate { date: NaiveDate::from_ymd_opt(2026, 10, 10).unwrap(), surcharge_pct: dec!(5) },
///     Some(DueDate { date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(), surcharge_pct: dec!(8) }),
/// ).unwrap();
/// let late = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
///
/// assert_eq!(current_surcharge(dec!(10000), &schedule, InterestPolicy::Acumulado, true, late), dec!(800.00));
/// assert_eq!(current_surcharge(dec!(10000), &schedule, InterestPolicy::Compuesto, true, late), dec!(840.00));
/// ```
pub fn current_surcharge(
    base: Decimal,
    schedule: &DueSchedule,
    policy: InterestPolicy,
    interest_eligible: bool,
    as_of: NaiveDate,
) -> Decimal {
    if !interest_eligible || base <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let first_tier = percent_of(base, schedule.first.surcharge_pct);
    match (schedule.tier(as_of), schedule.second) {
        (SurchargeTier::None, _) => Decimal::ZERO,
        (SurchargeTier::First, _) | (SurchargeTier::Second, None) => first_tier,
        (SurchargeTier::Second, Some(second)) => match policy {
            InterestPolicy::Compuesto => percent_of(base + first_tier, second.surcharge_pct),
            InterestPolicy::Acumulado => percent_of(base, second.surcharge_pct),
        },
    }
}

/// `base + current_surcharge(..)`, the full amount owed on a date.
pub fn total_owed(
    base: Decimal,
    schedule: &DueSchedule,
    policy: InterestPolicy,
    interest_eligible: bool,
    as_of: NaiveDate,
) -> Decimal {
    round2(base + current_surcharge(base, schedule, policy, interest_eligible, as_of))
}
