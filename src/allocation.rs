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

//! Prorrateo: distribution of a period total across units by share.
//!
//! Each unit receives `round2(total * share / 100)` independently. Shares are
//! not normalized and rounding remainders are not redistributed, so the sum of
//! base amounts tracks `total * sum(shares) / 100` within one cent per unit.

use crate::base::UnitId;
use crate::money::percent_of;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A unit's share of the period total, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitShare {
    pub unit_id: UnitId,
    pub share: Decimal,
}

/// The base amount a unit owes for a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub unit_id: UnitId,
    pub base_amount: Decimal,
}

/// Allocates `period_total` across `units`, preserving input order.
///
/// ```
/// use consortium_settlement::allocation::{allocate, UnitShare};
/// use consortium_settlement::UnitId;
/// use rust_decimal_macros::dec;
///
/// let units = [
///     UnitShare { unit_id: UnitId(1), share: dec!(60) },
///     UnitShare { unit_id: UnitId(2), share: dec!(40) },
/// ];
/// let allocations = allocate(dec!(300000.00), &units);
/// assert_eq!(allocations[0].base_amount, dec!(180000.00));
/// assert_eq!(allocations[1].base_amount, dec!(120000.00));
/// ```
pub fn allocate(period_total: Decimal, units: &[UnitShare]) -> Vec<Allocation> {
    units
        .iter()
        .map(|unit| Allocation {
            unit_id: unit.unit_id,
            base_amount: percent_of(period_total, unit.share),
        })
        .collect()
}

/// Sum of all configured shares.
pub fn total_share(units: &[UnitShare]) -> Decimal {
    units.iter().map(|unit| unit.share).sum()
}
