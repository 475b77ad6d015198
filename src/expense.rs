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

//! Consortium-level expenses.
//!
//! Status is derived from the settled amount:
//!
//! ```text
//! Unpaid (settled = 0) ──pay──► PartiallyPaid ──pay──► Paid (settled = amount)
//! ```

use crate::base::{ConsortiumId, ExpenseId, LiquidationId, Period, ProviderId};
use crate::error::SettlementError;
use crate::money::round2;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseKind {
    #[default]
    Ordinary,
    Extraordinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpenseStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

/// A consortium-level cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub consortium_id: ConsortiumId,
    pub amount: Decimal,
    #[serde(default)]
    pub settled: Decimal,
    #[serde(default)]
    pub kind: ExpenseKind,
    #[serde(default)]
    pub provider_id: Option<ProviderId>,
    /// Period the expense applies to; unset expenses can be pulled into any draft.
    #[serde(default)]
    pub applicable_period: Option<Period>,
    /// Liquidation the expense was billed in, once issued.
    #[serde(default)]
    pub liquidation_id: Option<LiquidationId>,
}

impl Expense {
    pub fn new(id: ExpenseId, consortium_id: ConsortiumId, amount: Decimal) -> Self {
        Self {
            id,
            consortium_id,
            amount,
            settled: Decimal::ZERO,
            kind: ExpenseKind::Ordinary,
            provider_id: None,
            applicable_period: None,
            liquidation_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), SettlementError> {
        if self.amount <= Decimal::ZERO {
            return Err(SettlementError::InvalidAmount);
        }
        if self.settled < Decimal::ZERO || self.settled > self.amount {
            return Err(SettlementError::InvalidSettled(self.id));
        }
        Ok(())
    }

    /// `amount - settled`, in cents.
    pub fn outstanding(&self) -> Decimal {
        round2(self.amount - self.settled)
    }

    pub fn status(&self) -> ExpenseStatus {
        if self.settled <= Decimal::ZERO {
            ExpenseStatus::Unpaid
        } else if self.outstanding() <= Decimal::ZERO {
            ExpenseStatus::Paid
        } else {
            ExpenseStatus::PartiallyPaid
        }
    }

    pub fn is_liquidated(&self) -> bool {
        self.liquidation_id.is_some()
    }

    /// Whether a draft for `period` picks this expense up automatically.
    pub fn eligible_for(&self, consortium_id: ConsortiumId, period: Period) -> bool {
        self.consortium_id == consortium_id
            && !self.is_liquidated()
            && self.applicable_period.is_none_or(|p| p == period)
    }

    pub(crate) fn settle(&mut self, amount: Decimal) {
        self.settled += amount;
        debug_assert!(
            self.settled <= self.amount,
            "Invariant violated: expense {} settled {} above amount {}",
            self.id,
            self.settled,
            self.amount
        );
    }
}
