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

//! Error types for settlement operations.
//!
//! Every error is deterministic for the same inputs; none is retried.
//! [`SettlementError::kind`] groups the variants into the categories callers
//! surface to users.

use crate::base::{
    AccountId, ConsortiumId, ExpenseId, LedgerEntryId, LiquidationId, PaymentId, Period, UnitId,
    UnitTypeId,
};
use crate::liquidation::LiquidationState;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Settlement errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Payment date lies after today
    #[error("payment date {date} is in the future (today is {today})")]
    FutureDate { date: NaiveDate, today: NaiveDate },

    /// Amount is zero, negative or finer than a cent
    #[error("invalid amount (must be positive whole cents)")]
    InvalidAmount,

    /// Payment would exceed what the target still owes
    #[error("amount exceeds the outstanding balance of {ceiling}")]
    Overpayment { ceiling: Decimal },

    /// A required reference is absent
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Referenced account exists but is not active
    #[error("account {0} is not active")]
    InactiveAccount(AccountId),

    /// Unit share is negative
    #[error("unit {0} has a negative share")]
    NegativeShare(UnitId),

    /// Unit bills the tenant but is not rented
    #[error("unit {0} can only bill a tenant while rented")]
    TenantNotAllowed(UnitId),

    /// Expense settled amount outside `0..=amount`
    #[error("expense {0} has a settled amount outside its total")]
    InvalidSettled(ExpenseId),

    /// Due-date schedule is inconsistent
    #[error("invalid due schedule: {0}")]
    InvalidSchedule(&'static str),

    /// A draft liquidation already exists for the consortium
    #[error("consortium {consortium} already has draft liquidation {draft}")]
    DraftExists {
        consortium: ConsortiumId,
        draft: LiquidationId,
    },

    /// Period has already been liquidated
    #[error("period {period} is already liquidated (last liquidated: {last})")]
    PeriodLiquidated { period: Period, last: Period },

    /// Liquidation is not in the state the operation requires
    #[error("liquidation {id} is {actual}, expected {expected}")]
    InvalidTransition {
        id: LiquidationId,
        actual: LiquidationState,
        expected: LiquidationState,
    },

    /// Expense is linked to a liquidation or belongs to another consortium
    #[error("expense {0} is not available for this liquidation")]
    ExpenseUnavailable(ExpenseId),

    /// Record with the same ID already registered
    #[error("duplicate identifier: {0}")]
    Duplicate(String),

    #[error("consortium {0} not found")]
    ConsortiumNotFound(ConsortiumId),

    #[error("unit type {0} not found")]
    UnitTypeNotFound(UnitTypeId),

    #[error("expense {0} not found")]
    ExpenseNotFound(ExpenseId),

    #[error("liquidation {0} not found")]
    LiquidationNotFound(LiquidationId),

    #[error("ledger entry {0} not found")]
    LedgerEntryNotFound(LedgerEntryId),

    #[error("payment {0} not found")]
    PaymentNotFound(PaymentId),

    #[error("account {0} not found")]
    AccountNotFound(AccountId),
}

/// Error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// User-correctable input problem
    Validation,
    /// Payment dated after today
    FutureDate,
    /// Payment above the outstanding ceiling
    Overpayment,
    /// State-machine violation
    Conflict,
    /// Referenced record missing
    NotFound,
}

impl SettlementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FutureDate { .. } => ErrorKind::FutureDate,
            Self::Overpayment { .. } => ErrorKind::Overpayment,
            Self::InvalidAmount
            | Self::MissingField(_)
            | Self::InactiveAccount(_)
            | Self::NegativeShare(_)
            | Self::TenantNotAllowed(_)
            | Self::InvalidSettled(_)
            | Self::InvalidSchedule(_) => ErrorKind::Validation,
            Self::DraftExists { .. }
            | Self::PeriodLiquidated { .. }
            | Self::InvalidTransition { .. }
            | Self::ExpenseUnavailable(_)
            | Self::Duplicate(_) => ErrorKind::Conflict,
            Self::ConsortiumNotFound(_)
            | Self::UnitTypeNotFound(_)
            | Self::ExpenseNotFound(_)
            | Self::LiquidationNotFound(_)
            | Self::LedgerEntryNotFound(_)
            | Self::PaymentNotFound(_)
            | Self::AccountNotFound(_) => ErrorKind::NotFound,
        }
    }

    /// The limit a corrected value must respect, when the error carries one.
    pub fn ceiling(&self) -> Option<Decimal> {
        match self {
            Self::Overpayment { ceiling } => Some(*ceiling),
            _ => None,
        }
    }
}
