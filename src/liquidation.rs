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

//! Period liquidations.
//!
//! A liquidation follows a monotonic state machine:
//!
//! ```text
//! Draft ──issue──► Issued ──close──► Closed
//! ```
//!
//! Expenses are held uncommitted while the liquidation is a draft and linked
//! to it when it is issued.

use crate::base::{ConsortiumId, ExpenseId, LiquidationId, Period};
use crate::calendar::day_in_period;
use crate::error::SettlementError;
use crate::surcharge::{DueDate, DueSchedule};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidationState {
    Draft,
    Issued,
    Closed,
}

impl fmt::Display for LiquidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Draft => "draft",
            Self::Issued => "issued",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Due days of the month and their surcharge percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingTerms {
    pub first_due_day: u32,
    pub first_due_surcharge_pct: Decimal,
    #[serde(default)]
    pub second_due_day: Option<u32>,
    #[serde(default)]
    pub second_due_surcharge_pct: Option<Decimal>,
}

impl Default for BillingTerms {
    fn default() -> Self {
        Self {
            first_due_day: 10,
            first_due_surcharge_pct: dec!(5),
            second_due_day: None,
            second_due_surcharge_pct: None,
        }
    }
}

impl BillingTerms {
    /// Checks the terms against the rules a due schedule built from them
    /// must satisfy.
    pub fn validate(&self) -> Result<(), SettlementError> {
        let valid_day = |day: u32| (1..=31).contains(&day);
        if !valid_day(self.first_due_day) {
            return Err(SettlementError::InvalidSchedule("due day must be 1-31"));
        }
        if self.first_due_surcharge_pct < Decimal::ZERO {
            return Err(SettlementError::InvalidSchedule(
                "surcharge percentage is negative",
            ));
        }
        match (self.second_due_day, self.second_due_surcharge_pct) {
            (None, None) => Ok(()),
            (Some(day), Some(_)) if !valid_day(day) => {
                Err(SettlementError::InvalidSchedule("due day must be 1-31"))
            }
            (Some(day), Some(_)) if day <= self.first_due_day => Err(
                SettlementError::InvalidSchedule("second due day must follow the first"),
            ),
            (Some(_), Some(pct)) if pct < self.first_due_surcharge_pct => {
                Err(SettlementError::InvalidSchedule(
                    "second surcharge percentage is below the first",
                ))
            }
            (Some(_), Some(_)) => Ok(()),
            (Some(_), None) => Err(SettlementError::MissingField("second_due_surcharge_pct")),
            (None, Some(_)) => Err(SettlementError::MissingField("second_due_day")),
        }
    }

    /// Builds the due schedule with both due days falling in `due_period`.
    pub fn schedule(&self, due_period: Period) -> Result<DueSchedule, SettlementError> {
        self.validate()?;
        let first = DueDate {
            date: day_in_period(due_period, self.first_due_day),
            surcharge_pct: self.first_due_surcharge_pct,
        };
        let second = match (self.second_due_day, self.second_due_surcharge_pct) {
            (Some(day), Some(surcharge_pct)) => Some(DueDate {
                date: day_in_period(due_period, day),
                surcharge_pct,
            }),
            _ => None,
        };
        DueSchedule::new(first, second)
    }
}

/// One billing cycle of a consortium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liquidation {
    pub id: LiquidationId,
    pub consortium_id: ConsortiumId,
    pub period: Period,
    pub state: LiquidationState,
    pub closing_date: NaiveDate,
    pub issue_date: Option<NaiveDate>,
    pub terms: BillingTerms,
    /// Set when the liquidation is issued.
    pub schedule: Option<DueSchedule>,
    /// Running total while a draft, frozen on issue.
    pub total: Decimal,
    pub expense_ids: BTreeSet<ExpenseId>,
}

impl Liquidation {
    pub fn draft(
        id: LiquidationId,
        consortium_id: ConsortiumId,
        period: Period,
        closing_date: NaiveDate,
        terms: BillingTerms,
    ) -> Self {
        Self {
            id,
            consortium_id,
            period,
            state: LiquidationState::Draft,
            closing_date,
            issue_date: None,
            terms,
            schedule: None,
            total: Decimal::ZERO,
            expense_ids: BTreeSet::new(),
        }
    }

    /// Fails with [`SettlementError::InvalidTransition`] unless in `expected`.
    pub fn ensure_state(&self, expected: LiquidationState) -> Result<(), SettlementError> {
        if self.state != expected {
            return Err(SettlementError::InvalidTransition {
                id: self.id,
                actual: self.state,
                expected,
            });
        }
        Ok(())
    }

    pub(crate) fn mark_issued(
        &mut self,
        issue_date: NaiveDate,
        schedule: DueSchedule,
        total: Decimal,
    ) -> Result<(), SettlementError> {
        self.ensure_state(LiquidationState::Draft)?;
        self.state = LiquidationState::Issued;
        self.issue_date = Some(issue_date);
        self.schedule = Some(schedule);
        self.total = total;
        Ok(())
    }

    pub(crate) fn mark_closed(&mut self) -> Result<(), SettlementError> {
        self.ensure_state(LiquidationState::Issued)?;
        self.state = LiquidationState::Closed;
        Ok(())
    }
}
