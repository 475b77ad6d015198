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

//! Period settlement engine.
//!
//! The [`Engine`] owns the records of every consortium it settles and drives
//! the liquidation workflow:
//!
//! - **Create**: open a draft for a period with the consortium's unliquidated
//!   expenses.
//! - **Issue**: link the draft's expenses, freeze the total and allocate it
//!   into one ledger entry per active unit.
//! - **Close**: terminal; the liquidation can no longer change.
//! - **Pay**: apply payments to ledger entries (collections) and expenses
//!   (disbursements).
//! - **Debtors**: re-derive every entry's balance to report what each unit
//!   and person owes across periods.
//!
//! # Thread Safety
//!
//! Records live in [`DashMap`]s. Every payable target (ledger entry or
//! expense) sits behind its own [`Mutex`]: the overpayment ceiling is read and
//! the settled amount incremented under one lock, so concurrent payments
//! against a target can never overpay it. Targets are independent; no
//! operation locks two payable targets at once.

use crate::allocation::{UnitShare, allocate};
use crate::base::{
    AccountId, ConsortiumId, ExpenseId, LedgerEntryId, LiquidationId, PaymentId, Period, PersonId,
    UnitId, UnitTypeId,
};
use crate::calendar::{Clock, SystemClock, add_days};
use crate::config::{EngineConfig, TotalBasis};
use crate::directory::{Account, Consortium};
use crate::error::SettlementError;
use crate::expense::Expense;
use crate::ledger::{
    DebtorSummary, LedgerEntry, LedgerSnapshot, LedgerStatus, PersonDebt, aggregate_debtors,
    group_by_person,
};
use crate::liquidation::{BillingTerms, Liquidation, LiquidationState};
use crate::money::sum;
use crate::payment::{self, Payment, PaymentRequest, PaymentTarget};
use crate::payment_journal::PaymentJournal;
use crate::unit::{Unit, UnitType};
use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, warn};

/// New values for an existing payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEdit {
    pub amount: Decimal,
    pub date: NaiveDate,
    pub comment: Option<String>,
}

/// Settlement engine for one or more consortiums.
///
/// # Invariants
///
/// - At most one draft liquidation per consortium.
/// - Liquidations only move forward: `Draft` -> `Issued` -> `Closed`.
/// - An expense is linked to at most one liquidation, and only on issue.
/// - Cumulative payments never exceed what a target owes when they are applied.
pub struct Engine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    consortiums: DashMap<ConsortiumId, Consortium>,
    unit_types: DashMap<UnitTypeId, UnitType>,
    units: DashMap<UnitId, Unit>,
    accounts: DashMap<AccountId, Account>,
    expenses: DashMap<ExpenseId, Mutex<Expense>>,
    liquidations: DashMap<LiquidationId, Liquidation>,
    entries: DashMap<LedgerEntryId, Mutex<LedgerEntry>>,
    payments: PaymentJournal,
    next_liquidation: AtomicU32,
    next_entry: AtomicU32,
    next_payment: AtomicU32,
}

impl Engine {
    /// Creates an engine with the default configuration and the system clock.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Engine {
            config,
            clock,
            consortiums: DashMap::new(),
            unit_types: DashMap::new(),
            units: DashMap::new(),
            accounts: DashMap::new(),
            expenses: DashMap::new(),
            liquidations: DashMap::new(),
            entries: DashMap::new(),
            payments: PaymentJournal::new(),
            next_liquidation: AtomicU32::new(1),
            next_entry: AtomicU32::new(1),
            next_payment: AtomicU32::new(1),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // === Directory ===

    /// Registers a consortium.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::Duplicate`] - A consortium with this ID exists.
    /// - [`SettlementError::InvalidSchedule`] / [`SettlementError::MissingField`] -
    ///   The consortium's own billing terms are inconsistent.
    pub fn register_consortium(&self, consortium: Consortium) -> Result<(), SettlementError> {
        if let Some(terms) = &consortium.terms {
            terms.validate()?;
        }
        match self.consortiums.entry(consortium.id) {
            Entry::Occupied(_) => Err(SettlementError::Duplicate(format!(
                "consortium {}",
                consortium.id
            ))),
            Entry::Vacant(entry) => {
                debug!(consortium = %consortium.id, name = %consortium.name, "consortium registered");
                entry.insert(consortium);
                Ok(())
            }
        }
    }

    /// Registers or replaces a unit type.
    pub fn register_unit_type(&self, unit_type: UnitType) -> Result<(), SettlementError> {
        self.ensure_consortium(unit_type.consortium_id)?;
        self.unit_types.insert(unit_type.id, unit_type);
        Ok(())
    }

    /// Registers or replaces a unit.
    ///
    /// Changes apply to liquidations issued afterwards; existing ledger
    /// entries keep the share and interest eligibility they were issued with.
    pub fn register_unit(&self, unit: Unit) -> Result<(), SettlementError> {
        unit.validate()?;
        self.ensure_consortium(unit.consortium_id)?;
        if let Some(type_id) = unit.unit_type_id {
            if !self.unit_types.contains_key(&type_id) {
                return Err(SettlementError::UnitTypeNotFound(type_id));
            }
        }
        self.units.insert(unit.id, unit);
        Ok(())
    }

    /// Registers or replaces an account.
    pub fn register_account(&self, account: Account) -> Result<(), SettlementError> {
        self.ensure_consortium(account.consortium_id)?;
        self.accounts.insert(account.id, account);
        Ok(())
    }

    /// Records a new, unliquidated expense.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::InvalidAmount`] / [`SettlementError::InvalidSettled`] -
    ///   Amounts are inconsistent.
    /// - [`SettlementError::ExpenseUnavailable`] - The expense is already linked.
    /// - [`SettlementError::Duplicate`] - The expense ID is taken.
    pub fn record_expense(&self, expense: Expense) -> Result<(), SettlementError> {
        expense.validate()?;
        self.ensure_consortium(expense.consortium_id)?;
        if expense.is_liquidated() {
            return Err(SettlementError::ExpenseUnavailable(expense.id));
        }
        match self.expenses.entry(expense.id) {
            Entry::Occupied(_) => Err(SettlementError::Duplicate(format!("expense {}", expense.id))),
            Entry::Vacant(entry) => {
                entry.insert(Mutex::new(expense));
                Ok(())
            }
        }
    }

    // === Lookups ===

    pub fn consortium(&self, id: ConsortiumId) -> Option<Consortium> {
        self.consortiums.get(&id).map(|c| c.clone())
    }

    pub fn unit(&self, id: UnitId) -> Option<Unit> {
        self.units.get(&id).map(|u| u.clone())
    }

    pub fn expense(&self, id: ExpenseId) -> Option<Expense> {
        self.expenses.get(&id).map(|e| e.lock().clone())
    }

    pub fn liquidation(&self, id: LiquidationId) -> Option<Liquidation> {
        self.liquidations.get(&id).map(|l| l.clone())
    }

    pub fn ledger_entry(&self, id: LedgerEntryId) -> Option<LedgerEntry> {
        self.entries.get(&id).map(|e| e.lock().clone())
    }

    pub fn payment(&self, id: PaymentId) -> Option<Payment> {
        self.payments.get(id)
    }

    /// Payments against `target`, in the order they were applied.
    pub fn payments_for(&self, target: PaymentTarget) -> Vec<Payment> {
        self.payments.for_target(target)
    }

    // === Liquidation workflow ===

    /// The period a new draft should cover: the month after the last
    /// liquidated one, or the current month for a consortium never liquidated.
    pub fn next_period(&self, consortium_id: ConsortiumId) -> Result<Period, SettlementError> {
        let consortium = self
            .consortiums
            .get(&consortium_id)
            .ok_or(SettlementError::ConsortiumNotFound(consortium_id))?;
        Ok(match consortium.last_liquidated {
            Some(last) => last.next(),
            None => Period::containing(self.clock.today()),
        })
    }

    /// Suggested closing date for `period`: its last day plus the closing offset.
    pub fn suggested_closing_date(
        &self,
        consortium_id: ConsortiumId,
        period: Period,
    ) -> Result<NaiveDate, SettlementError> {
        let consortium = self
            .consortiums
            .get(&consortium_id)
            .ok_or(SettlementError::ConsortiumNotFound(consortium_id))?;
        Ok(add_days(
            period.last_day(),
            consortium.closing_offset(&self.config),
        ))
    }

    /// Opens a draft liquidation for `period`.
    ///
    /// Every unliquidated expense of the consortium whose applicable period is
    /// `period` or unset is held in the draft.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::ConsortiumNotFound`] - Unknown consortium.
    /// - [`SettlementError::DraftExists`] - The consortium already has a draft.
    /// - [`SettlementError::PeriodLiquidated`] - `period` is not after the last
    ///   liquidated period.
    pub fn create_draft(
        &self,
        consortium_id: ConsortiumId,
        period: Period,
    ) -> Result<LiquidationId, SettlementError> {
        let (id, closing_date, terms) = {
            let mut consortium = self
                .consortiums
                .get_mut(&consortium_id)
                .ok_or(SettlementError::ConsortiumNotFound(consortium_id))?;

            if let Some(draft) = consortium.draft {
                warn!(consortium = %consortium_id, draft = %draft, "draft already open");
                return Err(SettlementError::DraftExists {
                    consortium: consortium_id,
                    draft,
                });
            }
            if let Some(last) = consortium.last_liquidated {
                if period <= last {
                    warn!(consortium = %consortium_id, %period, %last, "period already liquidated");
                    return Err(SettlementError::PeriodLiquidated { period, last });
                }
            }

            let id = LiquidationId(self.next_liquidation.fetch_add(1, Ordering::SeqCst));
            consortium.draft = Some(id);
            let closing_date = add_days(period.last_day(), consortium.closing_offset(&self.config));
            (id, closing_date, consortium.billing_terms(&self.config))
        };

        let expense_ids: BTreeSet<ExpenseId> = self
            .expenses
            .iter()
            .filter(|expense| expense.lock().eligible_for(consortium_id, period))
            .map(|expense| *expense.key())
            .collect();

        let mut liquidation = Liquidation::draft(id, consortium_id, period, closing_date, terms);
        liquidation.total = self.expenses_total(&expense_ids);
        liquidation.expense_ids = expense_ids;

        info!(
            consortium = %consortium_id,
            liquidation = %id,
            %period,
            expenses = liquidation.expense_ids.len(),
            total = %liquidation.total,
            "draft liquidation created"
        );
        self.liquidations.insert(id, liquidation);
        Ok(id)
    }

    /// Pulls an expense into a draft and returns the new running total.
    ///
    /// Adding an expense the draft already holds is a no-op.
    pub fn add_expense_to_draft(
        &self,
        liquidation_id: LiquidationId,
        expense_id: ExpenseId,
    ) -> Result<Decimal, SettlementError> {
        let mut liquidation = self.draft_mut(liquidation_id)?;
        {
            let expense = self
                .expenses
                .get(&expense_id)
                .ok_or(SettlementError::ExpenseNotFound(expense_id))?;
            let expense = expense.lock();
            if expense.consortium_id != liquidation.consortium_id || expense.is_liquidated() {
                return Err(SettlementError::ExpenseUnavailable(expense_id));
            }
        }
        liquidation.expense_ids.insert(expense_id);
        liquidation.total = self.expenses_total(&liquidation.expense_ids);
        debug!(liquidation = %liquidation_id, expense = %expense_id, total = %liquidation.total, "expense added to draft");
        Ok(liquidation.total)
    }

    /// Releases an expense from a draft and returns the new running total.
    pub fn remove_expense_from_draft(
        &self,
        liquidation_id: LiquidationId,
        expense_id: ExpenseId,
    ) -> Result<Decimal, SettlementError> {
        if !self.expenses.contains_key(&expense_id) {
            return Err(SettlementError::ExpenseNotFound(expense_id));
        }
        let mut liquidation = self.draft_mut(liquidation_id)?;
        liquidation.expense_ids.remove(&expense_id);
        liquidation.total = self.expenses_total(&liquidation.expense_ids);
        debug!(liquidation = %liquidation_id, expense = %expense_id, total = %liquidation.total, "expense removed from draft");
        Ok(liquidation.total)
    }

    /// Overrides the due days and surcharge percentages of a draft.
    pub fn set_draft_terms(
        &self,
        liquidation_id: LiquidationId,
        terms: BillingTerms,
    ) -> Result<(), SettlementError> {
        terms.validate()?;
        let mut liquidation = self.draft_mut(liquidation_id)?;
        liquidation.terms = terms;
        Ok(())
    }

    /// Current total of a liquidation.
    ///
    /// Drafts are recomputed from their expenses; issued and closed
    /// liquidations return their frozen total.
    pub fn draft_total(&self, liquidation_id: LiquidationId) -> Result<Decimal, SettlementError> {
        let liquidation = self
            .liquidations
            .get(&liquidation_id)
            .ok_or(SettlementError::LiquidationNotFound(liquidation_id))?;
        if liquidation.state == LiquidationState::Draft {
            Ok(self.expenses_total(&liquidation.expense_ids))
        } else {
            Ok(liquidation.total)
        }
    }

    /// Deletes a draft, releasing its expenses and the consortium's draft slot.
    pub fn discard_draft(&self, liquidation_id: LiquidationId) -> Result<(), SettlementError> {
        let removed = self
            .liquidations
            .remove_if(&liquidation_id, |_, l| l.state == LiquidationState::Draft);
        let Some((_, liquidation)) = removed else {
            return match self.liquidations.get(&liquidation_id) {
                Some(existing) => Err(SettlementError::InvalidTransition {
                    id: liquidation_id,
                    actual: existing.state,
                    expected: LiquidationState::Draft,
                }),
                None => Err(SettlementError::LiquidationNotFound(liquidation_id)),
            };
        };
        if let Some(mut consortium) = self.consortiums.get_mut(&liquidation.consortium_id) {
            if consortium.draft == Some(liquidation_id) {
                consortium.draft = None;
            }
        }
        info!(liquidation = %liquidation_id, consortium = %liquidation.consortium_id, "draft discarded");
        Ok(())
    }

    /// Issues a draft.
    ///
    /// Links the draft's expenses, freezes the total, builds the due schedule
    /// and creates one ledger entry per active unit of the consortium.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::LiquidationNotFound`] - Unknown liquidation.
    /// - [`SettlementError::InvalidTransition`] - Not a draft.
    /// - [`SettlementError::ExpenseUnavailable`] - An expense was linked elsewhere.
    /// - [`SettlementError::UnitTypeNotFound`] - An automatic unit has no type.
    pub fn issue(&self, liquidation_id: LiquidationId) -> Result<Vec<LedgerEntryId>, SettlementError> {
        let today = self.clock.today();

        let mut liquidation = self
            .liquidations
            .get_mut(&liquidation_id)
            .ok_or(SettlementError::LiquidationNotFound(liquidation_id))?;
        if let Err(e) = liquidation.ensure_state(LiquidationState::Draft) {
            warn!(liquidation = %liquidation_id, error = %e, "issue rejected");
            return Err(e);
        }

        let consortium_id = liquidation.consortium_id;
        let period = liquidation.period;
        let policy = self
            .consortiums
            .get(&consortium_id)
            .ok_or(SettlementError::ConsortiumNotFound(consortium_id))?
            .policy(&self.config);
        let schedule = liquidation
            .terms
            .schedule(period.plus_months(self.config.due_month_offset))?;
        let units = self.allocation_units(consortium_id)?;

        // Check every expense before linking any of them.
        for expense_id in &liquidation.expense_ids {
            let expense = self
                .expenses
                .get(expense_id)
                .ok_or(SettlementError::ExpenseNotFound(*expense_id))?;
            if expense.lock().is_liquidated() {
                return Err(SettlementError::ExpenseUnavailable(*expense_id));
            }
        }
        let mut total = Decimal::ZERO;
        for expense_id in &liquidation.expense_ids {
            if let Some(expense) = self.expenses.get(expense_id) {
                let mut expense = expense.lock();
                expense.liquidation_id = Some(liquidation_id);
                total += self.basis_amount(&expense);
            }
        }

        let shares: Vec<UnitShare> = units
            .iter()
            .map(|(unit, share)| UnitShare {
                unit_id: unit.id,
                share: *share,
            })
            .collect();
        let ledger: Vec<LedgerEntry> = allocate(total, &shares)
            .into_iter()
            .zip(&units)
            .map(|(allocation, (unit, _))| LedgerEntry {
                id: LedgerEntryId(self.next_entry.fetch_add(1, Ordering::SeqCst)),
                liquidation_id,
                consortium_id,
                unit_id: allocation.unit_id,
                base_amount: allocation.base_amount,
                settled: Decimal::ZERO,
                schedule,
                policy,
                interest_eligible: unit.interest_eligible,
                settled_on: None,
            })
            .collect();

        liquidation.mark_issued(today, schedule, total)?;
        drop(liquidation);

        let ids: Vec<LedgerEntryId> = ledger.iter().map(|entry| entry.id).collect();
        for entry in ledger {
            self.entries.insert(entry.id, Mutex::new(entry));
        }

        if let Some(mut consortium) = self.consortiums.get_mut(&consortium_id) {
            if consortium.draft == Some(liquidation_id) {
                consortium.draft = None;
            }
            if consortium.last_liquidated.is_none_or(|last| last < period) {
                consortium.last_liquidated = Some(period);
            }
        }

        info!(
            consortium = %consortium_id,
            liquidation = %liquidation_id,
            %period,
            %total,
            entries = ids.len(),
            first_due = %schedule.first().date,
            "liquidation issued"
        );
        Ok(ids)
    }

    /// Closes an issued liquidation. Terminal.
    pub fn close(&self, liquidation_id: LiquidationId) -> Result<(), SettlementError> {
        let mut liquidation = self
            .liquidations
            .get_mut(&liquidation_id)
            .ok_or(SettlementError::LiquidationNotFound(liquidation_id))?;
        if let Err(e) = liquidation.mark_closed() {
            warn!(liquidation = %liquidation_id, error = %e, "close rejected");
            return Err(e);
        }
        info!(liquidation = %liquidation_id, consortium = %liquidation.consortium_id, "liquidation closed");
        Ok(())
    }

    // === Payments ===

    /// Validates and applies a payment.
    ///
    /// The outstanding ceiling is computed and the target's settled amount
    /// incremented while holding the target's lock, with "today" read once.
    ///
    /// # Errors
    ///
    /// Validation errors in order: [`SettlementError::FutureDate`],
    /// [`SettlementError::InvalidAmount`], [`SettlementError::Overpayment`],
    /// [`SettlementError::MissingField`]. Then
    /// [`SettlementError::AccountNotFound`] / [`SettlementError::InactiveAccount`].
    /// Unknown targets fail first with a not-found error.
    pub fn apply_payment(&self, request: PaymentRequest) -> Result<Payment, SettlementError> {
        let today = self.clock.today();

        match request.target {
            PaymentTarget::LedgerEntry(entry_id) => {
                let entry = self
                    .entries
                    .get(&entry_id)
                    .ok_or(SettlementError::LedgerEntryNotFound(entry_id))?;
                let mut entry = entry.lock();
                let outstanding = entry.outstanding(today);
                let payment = self.record_payment(&request, outstanding, today)?;
                entry.settle(payment.amount, today);
                debug!(
                    entry = %entry_id,
                    payment = %payment.id,
                    amount = %payment.amount,
                    classification = ?payment.classification,
                    outstanding = %entry.outstanding(today),
                    "payment applied to ledger entry"
                );
                Ok(payment)
            }
            PaymentTarget::Expense(expense_id) => {
                let expense = self
                    .expenses
                    .get(&expense_id)
                    .ok_or(SettlementError::ExpenseNotFound(expense_id))?;
                let mut expense = expense.lock();
                let outstanding = expense.outstanding();
                let payment = self.record_payment(&request, outstanding, today)?;
                expense.settle(payment.amount);
                debug!(
                    expense = %expense_id,
                    payment = %payment.id,
                    amount = %payment.amount,
                    classification = ?payment.classification,
                    status = ?expense.status(),
                    "payment applied to expense"
                );
                Ok(payment)
            }
        }
    }

    /// Edits an existing payment's amount, date and comment.
    ///
    /// The new amount is validated against the target's balance with the old
    /// payment taken back out; the target's settled amount moves by the
    /// difference and the payment is reclassified.
    pub fn edit_payment(
        &self,
        payment_id: PaymentId,
        edit: PaymentEdit,
    ) -> Result<Payment, SettlementError> {
        let today = self.clock.today();
        let target = self
            .payments
            .get(payment_id)
            .ok_or(SettlementError::PaymentNotFound(payment_id))?
            .target;

        match target {
            PaymentTarget::LedgerEntry(entry_id) => {
                let entry = self
                    .entries
                    .get(&entry_id)
                    .ok_or(SettlementError::LedgerEntryNotFound(entry_id))?;
                let mut entry = entry.lock();
                // Re-read under the target lock so concurrent edits serialize.
                let existing = self
                    .payments
                    .get(payment_id)
                    .ok_or(SettlementError::PaymentNotFound(payment_id))?;
                let mut without = entry.clone();
                without.settled -= existing.amount;
                without.settled_on = None;
                let ceiling = without.outstanding(today);
                let updated = self.revalidate(existing.clone(), edit, ceiling, today)?;
                entry.settle(updated.amount - existing.amount, today);
                self.payments.replace(updated.clone())?;
                debug!(payment = %payment_id, entry = %entry_id, amount = %updated.amount, "payment edited");
                Ok(updated)
            }
            PaymentTarget::Expense(expense_id) => {
                let expense = self
                    .expenses
                    .get(&expense_id)
                    .ok_or(SettlementError::ExpenseNotFound(expense_id))?;
                let mut expense = expense.lock();
                let existing = self
                    .payments
                    .get(payment_id)
                    .ok_or(SettlementError::PaymentNotFound(payment_id))?;
                let ceiling = expense.outstanding() + existing.amount;
                let updated = self.revalidate(existing.clone(), edit, ceiling, today)?;
                expense.settle(updated.amount - existing.amount);
                self.payments.replace(updated.clone())?;
                debug!(payment = %payment_id, expense = %expense_id, amount = %updated.amount, "payment edited");
                Ok(updated)
            }
        }
    }

    // === Views ===

    /// Ledger entries of a liquidation with figures derived as of today,
    /// ordered by unit.
    pub fn ledger_entries(
        &self,
        liquidation_id: LiquidationId,
    ) -> Result<Vec<LedgerSnapshot>, SettlementError> {
        self.ledger_entries_as_of(liquidation_id, self.clock.today())
    }

    pub fn ledger_entries_as_of(
        &self,
        liquidation_id: LiquidationId,
        as_of: NaiveDate,
    ) -> Result<Vec<LedgerSnapshot>, SettlementError> {
        if !self.liquidations.contains_key(&liquidation_id) {
            return Err(SettlementError::LiquidationNotFound(liquidation_id));
        }
        let mut snapshots: Vec<LedgerSnapshot> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let entry = entry.lock();
                (entry.liquidation_id == liquidation_id).then(|| entry.snapshot(as_of))
            })
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.unit_id);
        Ok(snapshots)
    }

    pub fn ledger_snapshot(&self, entry_id: LedgerEntryId) -> Result<LedgerSnapshot, SettlementError> {
        let today = self.clock.today();
        self.entries
            .get(&entry_id)
            .map(|entry| entry.lock().snapshot(today))
            .ok_or(SettlementError::LedgerEntryNotFound(entry_id))
    }

    /// What each unit of a consortium owes across all liquidations, as of today.
    pub fn debtors(&self, consortium_id: ConsortiumId) -> Result<Vec<DebtorSummary>, SettlementError> {
        self.debtors_as_of(consortium_id, self.clock.today())
    }

    /// Debtor view as of a date.
    ///
    /// Every ledger entry of the consortium is re-derived. Entries of closed
    /// liquidations only count once they are overdue.
    pub fn debtors_as_of(
        &self,
        consortium_id: ConsortiumId,
        as_of: NaiveDate,
    ) -> Result<Vec<DebtorSummary>, SettlementError> {
        self.ensure_consortium(consortium_id)?;

        let snapshots: Vec<LedgerSnapshot> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let entry = entry.lock();
                (entry.consortium_id == consortium_id).then(|| entry.snapshot(as_of))
            })
            .collect();

        let counted: Vec<&LedgerSnapshot> = snapshots
            .iter()
            .filter(|snapshot| {
                let closed = self
                    .liquidations
                    .get(&snapshot.liquidation_id)
                    .is_some_and(|l| l.state == LiquidationState::Closed);
                !closed || snapshot.status == LedgerStatus::Overdue
            })
            .collect();

        Ok(aggregate_debtors(counted, |unit_id| {
            self.units.get(&unit_id).and_then(|unit| unit.billed_person())
        }))
    }

    /// Debtor view grouped by billed person, as of today.
    pub fn debtors_by_person(
        &self,
        consortium_id: ConsortiumId,
    ) -> Result<Vec<PersonDebt>, SettlementError> {
        Ok(group_by_person(&self.debtors(consortium_id)?))
    }

    /// Total a person owes across the consortium, as of today.
    pub fn person_outstanding(
        &self,
        consortium_id: ConsortiumId,
        person_id: PersonId,
    ) -> Result<Decimal, SettlementError> {
        Ok(self
            .debtors_by_person(consortium_id)?
            .into_iter()
            .find(|debt| debt.person_id == person_id)
            .map_or(Decimal::ZERO, |debt| debt.outstanding))
    }

    // === Internals ===

    fn ensure_consortium(&self, consortium_id: ConsortiumId) -> Result<(), SettlementError> {
        if self.consortiums.contains_key(&consortium_id) {
            Ok(())
        } else {
            Err(SettlementError::ConsortiumNotFound(consortium_id))
        }
    }

    fn ensure_account(&self, account_id: AccountId) -> Result<(), SettlementError> {
        let account = self
            .accounts
            .get(&account_id)
            .ok_or(SettlementError::AccountNotFound(account_id))?;
        if !account.active {
            return Err(SettlementError::InactiveAccount(account_id));
        }
        Ok(())
    }

    fn draft_mut(
        &self,
        liquidation_id: LiquidationId,
    ) -> Result<dashmap::mapref::one::RefMut<'_, LiquidationId, Liquidation>, SettlementError> {
        let liquidation = self
            .liquidations
            .get_mut(&liquidation_id)
            .ok_or(SettlementError::LiquidationNotFound(liquidation_id))?;
        liquidation.ensure_state(LiquidationState::Draft)?;
        Ok(liquidation)
    }

    fn basis_amount(&self, expense: &Expense) -> Decimal {
        match self.config.total_basis {
            TotalBasis::Settled => expense.settled,
            TotalBasis::Amount => expense.amount,
        }
    }

    fn expenses_total(&self, expense_ids: &BTreeSet<ExpenseId>) -> Decimal {
        sum(expense_ids.iter().filter_map(|id| {
            self.expenses
                .get(id)
                .map(|expense| self.basis_amount(&expense.lock()))
        }))
    }

    /// Active units of a consortium with their effective shares, by unit ID.
    fn allocation_units(
        &self,
        consortium_id: ConsortiumId,
    ) -> Result<Vec<(Unit, Decimal)>, SettlementError> {
        let mut units: Vec<Unit> = self
            .units
            .iter()
            .filter(|unit| unit.consortium_id == consortium_id && unit.active)
            .map(|unit| unit.clone())
            .collect();
        units.sort_by_key(|unit| unit.id);
        units
            .into_iter()
            .map(|unit| {
                let share = unit.effective_share(|type_id| {
                    self.unit_types.get(&type_id).map(|unit_type| unit_type.index)
                })?;
                Ok((unit, share))
            })
            .collect()
    }

    /// Validates a payment against `outstanding`, checks its account and
    /// journals it.
    fn record_payment(
        &self,
        request: &PaymentRequest,
        outstanding: Decimal,
        today: NaiveDate,
    ) -> Result<Payment, SettlementError> {
        let (account_id, classification) = payment::validate(request, outstanding, today)
            .inspect_err(|e| {
                warn!(target_ref = ?request.target, amount = %request.amount, error = %e, "payment rejected");
            })?;
        self.ensure_account(account_id)?;

        let payment = Payment {
            id: PaymentId(self.next_payment.fetch_add(1, Ordering::SeqCst)),
            target: request.target,
            amount: request.amount,
            date: request.date,
            account_id,
            payer_id: request.payer_id,
            comment: request.comment.clone(),
            classification,
        };
        self.payments.push(payment.clone())?;
        Ok(payment)
    }

    fn revalidate(
        &self,
        existing: Payment,
        edit: PaymentEdit,
        ceiling: Decimal,
        today: NaiveDate,
    ) -> Result<Payment, SettlementError> {
        let request = PaymentRequest {
            target: existing.target,
            amount: edit.amount,
            date: edit.date,
            account_id: Some(existing.account_id),
            payer_id: existing.payer_id,
            comment: edit.comment.clone(),
        };
        let (account_id, classification) = payment::validate(&request, ceiling, today)
            .inspect_err(|e| {
                warn!(payment = %existing.id, error = %e, "payment edit rejected");
            })?;
        Ok(Payment {
            amount: edit.amount,
            date: edit.date,
            comment: edit.comment,
            account_id,
            classification,
            ..existing
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
