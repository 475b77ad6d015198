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

//! Thread-safe payment journal.
//!
//! Keeps every recorded payment, rejects duplicate IDs and remembers the
//! order in which payments were applied.

use crate::SettlementError;
use crate::base::PaymentId;
use crate::payment::{Payment, PaymentTarget};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
struct JournalEntry {
    sequence: u64,
    payment: Payment,
}

/// Payments indexed by ID plus their application order.
///
/// A [`DashMap`] gives O(1) lookup and atomic duplicate detection; each entry
/// is stamped with a sequence number taken at insertion.
#[derive(Debug)]
pub struct PaymentJournal {
    payments: DashMap<PaymentId, JournalEntry>,
    sequence: AtomicU64,
}

impl PaymentJournal {
    pub fn new() -> Self {
        Self {
            payments: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Records a new payment.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Duplicate`] if the ID is already recorded.
    pub fn push(&self, payment: Payment) -> Result<(), SettlementError> {
        let payment_id = payment.id;

        match self.payments.entry(payment_id) {
            Entry::Occupied(_) => Err(SettlementError::Duplicate(format!("payment {payment_id}"))),
            Entry::Vacant(entry) => {
                let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
                entry.insert(JournalEntry { sequence, payment });
                Ok(())
            }
        }
    }

    /// Overwrites an existing payment record.
    pub fn replace(&self, payment: Payment) -> Result<(), SettlementError> {
        match self.payments.get_mut(&payment.id) {
            Some(mut existing) => {
                existing.payment = payment;
                Ok(())
            }
            None => Err(SettlementError::PaymentNotFound(payment.id)),
        }
    }

    pub fn get(&self, payment_id: PaymentId) -> Option<Payment> {
        self.payments.get(&payment_id).map(|entry| entry.payment.clone())
    }

    /// Payments against `target`, in application order.
    pub fn for_target(&self, target: PaymentTarget) -> Vec<Payment> {
        let mut matching: Vec<(u64, Payment)> = self
            .payments
            .iter()
            .filter(|entry| entry.payment.target == target)
            .map(|entry| (entry.sequence, entry.payment.clone()))
            .collect();
        matching.sort_by_key(|(sequence, _)| *sequence);
        matching.into_iter().map(|(_, payment)| payment).collect()
    }

    pub fn len(&self) -> usize {
        self.payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payments.is_empty()
    }
}

impl Default for PaymentJournal {
    fn default() -> Self {
        Self::new()
    }
}
