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

//! Decimal-safe currency arithmetic.
//!
//! Every monetary amount is a [`Decimal`]; nothing in the engine touches floats.
//! Amounts are settled in cents, rounded half-up (away from zero).

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places monetary amounts are rounded to.
pub const CENTS: u32 = 2;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Rounds to two decimals, half-up.
///
/// ```
/// use consortium_settlement::money::round2;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(round2(dec!(10.005)), dec!(10.01));
/// assert_eq!(round2(dec!(10.004)), dec!(10.00));
/// ```
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CENTS, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount * percent / 100`, rounded to cents.
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    round2(amount * percent / HUNDRED)
}

/// Sums amounts without intermediate rounding.
pub fn sum<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().fold(Decimal::ZERO, |acc, amount| acc + amount)
}

/// Returns `true` when two amounts are equal once rounded to cents.
pub fn same_cents(a: Decimal, b: Decimal) -> bool {
    round2(a) == round2(b)
}
