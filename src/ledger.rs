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

//! Unit ledger entries: what one unit owes for one liquidation.
//!
//! Only the base amount and the settled amount are stored. Surcharge,
//! outstanding balance and status are derived on every read from
//! `(base, settled, schedule, policy, as_of)`:
//!
//! ```text
//! Pending ──first due passes / partial payment──► Owing ──final due passes──► Overdue
//!    │                                              │                            │
//!    └────────────── outstanding reaches 0 ─────────┴──────────► Paid ◄──────────┘
//! ```
//!
//! `Paid` takes precedence over everything, then `Overdue`.

use crate::base::{ConsortiumId, LedgerEntryId, LiquidationId, PersonId, UnitId};
use crate::calendar::is_past;
use crate::money::round2;
use crate::surcharge::{DueSchedule, InterestPolicy, SurchargeTier, current_surcharge};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    /// Nothing paid and no due date has passed yet
    Pending,
    /// Inside the collection window with a balance left
    Owing,
    /// Nothing left to pay
    Paid,
    /// Balance left after the final due date
    Overdue,
}

/// Derives a ledger status. See the module docs for precedence.
pub fn derive_status(
    outstanding: Decimal,
    settled: Decimal,
    schedule: &DueSchedule,
    as_of: NaiveDate,
) -> LedgerStatus {
    if round2(outstanding) <= Decimal::ZERO {
        LedgerStatus::Paid
    } else if is_past(as_of, schedule.final_due()) {
        LedgerStatus::Overdue
    } else if schedule.tier(as_of) == SurchargeTier::None && settled <= Decimal::ZERO {
        LedgerStatus::Pending
    } else {
        LedgerStatus::Owing
    }
}

/// The amount a unit owes for a period liquidation.
///
/// The schedule, policy and interest eligibility are captured when the
/// liquidation is issued, so later configuration changes do not rewrite
/// existing debts. `settled_on` records the day the entry was paid in full;
/// surcharge stops accruing from then on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub liquidation_id: LiquidationId,
    pub consortium_id: ConsortiumId,
    pub unit_id: UnitId,
    pub base_amount: Decimal,
    pub settled: Decimal,
    pub schedule: DueSchedule,
    pub policy: InterestPolicy,
    pub interest_eligible: bool,
    #[serde(default)]
    pub settled_on: Option<NaiveDate>,
}

impl LedgerEntry {
    pub fn surcharge(&self, as_of: NaiveDate) -> Decimal {
        let accrual_date = self.settled_on.map_or(as_of, |settled_on| settled_on.min(as_of));
        current_surcharge(
            self.base_amount,
            &self.schedule,
            self.policy,
            self.interest_eligible,
            accrual_date,
        )
    }

    /// Base plus the surcharge in force on `as_of`.
    pub fn total_owed(&self, as_of: NaiveDate) -> Decimal {
        round2(self.base_amount + self.surcharge(as_of))
    }

    pub fn outstanding(&self, as_of: NaiveDate) -> Decimal {
        round2(self.total_owed(as_of) - self.settled)
    }

    pub fn status(&self, as_of: NaiveDate) -> LedgerStatus {
        derive_status(self.outstanding(as_of), self.settled, &self.schedule, as_of)
    }

    pub fn snapshot(&self, as_of: NaiveDate) -> LedgerSnapshot {
        let surcharge = self.surcharge(as_of);
        let total_owed = round2(self.base_amount + surcharge);
        let outstanding = round2(total_owed - self.settled);
        LedgerSnapshot {
            id: self.id,
            liquidation_id: self.liquidation_id,
            unit_id: self.unit_id,
            base_amount: self.base_amount,
            surcharge,
            total_owed,
            settled: self.settled,
            outstanding,
            status: derive_status(outstanding, self.settled, &self.schedule, as_of),
            as_of,
        }
    }

    /// Adds to (or, for a payment edit, subtracts from) the settled amount,
    /// then records whether the entry is paid in full as of `today`.
    pub(crate) fn settle(&mut self, amount: Decimal, today: NaiveDate) {
        self.settled += amount;
        self.settled_on = None;
        if self.outstanding(today) <= Decimal::ZERO {
            self.settled_on = Some(today);
        }
        debug_assert!(
            self.settled >= Decimal::ZERO,
            "Invariant violated: ledger entry {} settled went negative: {}",
            self.id,
            self.settled
        );
    }
}

/// A ledger entry with its derived figures, as of one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub id: LedgerEntryId,
    pub liquidation_id: LiquidationId,
    pub unit_id: UnitId,
    pub base_amount: Decimal,
    pub surcharge: Decimal,
    pub total_owed: Decimal,
    pub settled: Decimal,
    pub outstanding: Decimal,
    pub status: LedgerStatus,
    pub as_of: NaiveDate,
}

/// Outstanding balance of one unit across liquidations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtorSummary {
    pub unit_id: UnitId,
    pub person_id: Option<PersonId>,
    pub outstanding: Decimal,
    pub entries: usize,
    pub overdue_entries: usize,
}

/// Outstanding balance of one billed person across their units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDebt {
    pub person_id: PersonId,
    pub units: Vec<UnitId>,
    pub outstanding: Decimal,
}

/// Folds snapshots into one summary per unit with a positive balance.
///
/// `person_of` resolves the billed person of a unit. Results are ordered by
/// unit ID.
pub fn aggregate_debtors<'a, I, F>(snapshots: I, person_of: F) -> Vec<DebtorSummary>
where
    I: IntoIterator<Item = &'a LedgerSnapshot>,
    F: Fn(UnitId) -> Option<PersonId>,
{
    let mut by_unit: BTreeMap<UnitId, DebtorSummary> = BTreeMap::new();
    for snapshot in snapshots {
        if snapshot.outstanding <= Decimal::ZERO {
            continue;
        }
        let summary = by_unit
            .entry(snapshot.unit_id)
            .or_insert_with(|| DebtorSummary {
                unit_id: snapshot.unit_id,
                person_id: person_of(snapshot.unit_id),
                outstanding: Decimal::ZERO,
                entries: 0,
                overdue_entries: 0,
            });
        summary.outstanding += snapshot.outstanding;
        summary.entries += 1;
        if snapshot.status == LedgerStatus::Overdue {
            summary.overdue_entries += 1;
        }
    }
    by_unit.into_values().collect()
}

/// Groups unit summaries by billed person. Units without one are skipped.
pub fn group_by_person(debtors: &[DebtorSummary]) -> Vec<PersonDebt> {
    let mut by_person: BTreeMap<PersonId, PersonDebt> = BTreeMap::new();
    for debtor in debtors {
        let Some(person_id) = debtor.person_id else {
            continue;
        };
        let debt = by_person.entry(person_id).or_insert_with(|| PersonDebt {
            person_id,
            units: Vec::new(),
            outstanding: Decimal::ZERO,
        });
        debt.units.push(debtor.unit_id);
        debt.outstanding += debtor.outstanding;
    }
    by_person.into_values().collect()
}
