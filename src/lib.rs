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

//! # Consortium Settlement
//!
//! Monthly settlement for property consortiums: the building's period
//! expenses are liquidated into one debt per unit, prorated by the unit's
//! share, with late-payment surcharges over up to two due dates.
//!
//! ## Core Components
//!
//! - [`Engine`]: Liquidation workflow, payments and debtor views
//! - [`allocation`]: Prorrateo of a period total over unit shares
//! - [`surcharge`]: Due schedules and the two interest policies
//! - [`LedgerEntry`]: A unit's debt for one liquidation, derived on read
//! - [`PaymentRequest`]: Collections and disbursements, validated under lock
//! - [`SettlementError`]: Error types for rejected operations
//!
//! ## Example
//!
//! ```
//! use consortium_settlement::{
//!     Account, AccountId, Classification, Consortium, ConsortiumId, Engine, EngineConfig,
//!     Expense, ExpenseId, FixedClock, PaymentRequest, PaymentTarget, Period, PersonId, Unit,
//!     UnitId,
//! };
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let today = NaiveDate::from_ymd_opt(2026, 10, 5).unwrap();
//! let engine = Engine::with_config(EngineConfig::default(), Arc::new(FixedClock::new(today)));
//!
//! let consortium = ConsortiumId(1);
//! engine.register_consortium(Consortium::new(consortium, "Torre Norte")).unwrap();
//! engine.register_account(Account::new(AccountId(1), consortium, "Caja")).unwrap();
//! engine.register_unit(Unit::new(UnitId(1), consortium, dec!(60))).unwrap();
//! engine.register_unit(Unit::new(UnitId(2), consortium, dec!(40))).unwrap();
//!
//! let mut expense = Expense::new(ExpenseId(1), consortium, dec!(300000));
//! expense.settled = dec!(300000);
//! engine.record_expense(expense).unwrap();
//!
//! // Draft, then issue: one ledger entry per unit.
//! let liquidation = engine.create_draft(consortium, Period::new(2026, 9).unwrap()).unwrap();
//! let entries = engine.issue(liquidation).unwrap();
//! assert_eq!(engine.ledger_entry(entries[0]).unwrap().base_amount, dec!(180000.00));
//!
//! // Paying the whole balance before the first due date is a total payment.
//! let payment = engine
//!     .apply_payment(
//!         PaymentRequest::new(PaymentTarget::LedgerEntry(entries[0]), dec!(180000), today)
//!             .account(AccountId(1))
//!             .payer(PersonId(7)),
//!     )
//!     .unwrap();
//! assert_eq!(payment.classification, Classification::Total);
//! ```
//!
//! ## Thread Safety
//!
//! The engine is `Sync`; every operation takes `&self`. Payments against the
//! same ledger entry or expense serialize on that target's lock, so the
//! overpayment ceiling holds under concurrent submission.

pub mod allocation;
pub mod base;
pub mod calendar;
pub mod config;
pub mod directory;
mod engine;
pub mod error;
pub mod expense;
pub mod ledger;
pub mod liquidation;
pub mod money;
pub mod payment;
pub mod payment_journal;
pub mod surcharge;
pub mod unit;

pub use base::{
    AccountId, ConsortiumId, ExpenseId, LedgerEntryId, LiquidationId, PaymentId, Period, PersonId,
    ProviderId, UnitId, UnitTypeId,
};
pub use calendar::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, EngineConfig, TotalBasis};
pub use directory::{Account, Consortium};
pub use engine::{Engine, PaymentEdit};
pub use error::{ErrorKind, SettlementError};
pub use expense::{Expense, ExpenseKind, ExpenseStatus};
pub use ledger::{DebtorSummary, LedgerEntry, LedgerSnapshot, LedgerStatus, PersonDebt};
pub use liquidation::{BillingTerms, Liquidation, LiquidationState};
pub use payment::{Classification, Payment, PaymentRequest, PaymentTarget};
pub use payment_journal::PaymentJournal;
pub use surcharge::{DueDate, DueSchedule, InterestPolicy, SurchargeTier};
pub use unit::{BillTo, ShareMode, Unit, UnitType};
