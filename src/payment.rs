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

//! Payments against ledger entries and expenses.
//!
//! Validation runs in a fixed order and stops at the first failure:
//!
//! 1. payment date not after today ([`SettlementError::FutureDate`])
//! 2. amount positive, in whole cents ([`SettlementError::InvalidAmount`])
//! 3. amount within the outstanding ceiling ([`SettlementError::Overpayment`])
//! 4. target-specific required fields ([`SettlementError::MissingField`])
//!
//! The ceiling must be read under the same lock that later increments the
//! target's settled amount; see [`crate::Engine::apply_payment`].

use crate::base::{AccountId, ExpenseId, LedgerEntryId, PaymentId, PersonId};
use crate::error::SettlementError;
use crate::money::{CENTS, round2, same_cents};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What a payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target_type", content = "target_id", rename_all = "kebab-case")]
pub enum PaymentTarget {
    /// A unit's debt for one liquidation (collection).
    LedgerEntry(LedgerEntryId),
    /// A provider's expense (disbursement).
    Expense(ExpenseId),
}

/// Whether a payment cleared the whole balance owed at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Partial,
    Total,
}

/// A payment as submitted, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub target: PaymentTarget,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub account_id: Option<AccountId>,
    pub payer_id: Option<PersonId>,
    pub comment: Option<String>,
}

impl PaymentRequest {
    pub fn new(target: PaymentTarget, amount: Decimal, date: NaiveDate) -> Self {
        Self {
            target,
            amount,
            date,
            account_id: None,
            payer_id: None,
            comment: None,
        }
    }

    pub fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn payer(mut self, payer_id: PersonId) -> Self {
        self.payer_id = Some(payer_id);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// A recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    #[serde(flatten)]
    pub target: PaymentTarget,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub account_id: AccountId,
    pub payer_id: Option<PersonId>,
    pub comment: Option<String>,
    pub classification: Classification,
}

/// Classifies `amount` against the balance owed when it was applied.
pub fn classify(amount: Decimal, outstanding: Decimal) -> Classification {
    if same_cents(amount, outstanding) {
        Classification::Total
    } else {
        Classification::Partial
    }
}

/// Runs the ordered payment checks and returns the classification.
///
/// `outstanding` is the target's balance read under the target's lock, as of
/// `today`. The returned account is the one the payment will be recorded to.
pub fn validate(
    request: &PaymentRequest,
    outstanding: Decimal,
    today: NaiveDate,
) -> Result<(AccountId, Classification), SettlementError> {
    if request.date > today {
        return Err(SettlementError::FutureDate {
            date: request.date,
            today,
        });
    }
    if request.amount <= Decimal::ZERO || request.amount.round_dp(CENTS) != request.amount {
        return Err(SettlementError::InvalidAmount);
    }
    let ceiling = round2(outstanding).max(Decimal::ZERO);
    if request.amount > ceiling {
        return Err(SettlementError::Overpayment { ceiling });
    }
    let account_id = request
        .account_id
        .ok_or(SettlementError::MissingField("account"))?;
    if matches!(request.target, PaymentTarget::LedgerEntry(_)) && request.payer_id.is_none() {
        return Err(SettlementError::MissingField("payer"));
    }
    Ok((account_id, classify(request.amount, outstanding)))
}
