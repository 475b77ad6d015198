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

//! Benchmarks for the settlement engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Allocation of a period total across units
//! - Issuing a liquidation for consortiums of increasing size
//! - Single-threaded and parallel payment application
//! - Debtor view recomputation

use chrono::NaiveDate;
use consortium_settlement::allocation::{UnitShare, allocate};
use consortium_settlement::{
    Account, AccountId, Consortium, ConsortiumId, Engine, EngineConfig, Expense, ExpenseId,
    FixedClock, LedgerEntryId, PaymentRequest, PaymentTarget, Period, PersonId, Unit, UnitId,
};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

const CONSORTIUM: ConsortiumId = ConsortiumId(1);

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()
}

fn shares(units: u32) -> Vec<UnitShare> {
    let share = Decimal::ONE_HUNDRED / Decimal::from(units);
    (1..=units)
        .map(|id| UnitShare {
            unit_id: UnitId(id),
            share,
        })
        .collect()
}

/// Engine with `units` equal-share units and `expenses` paid expenses, not yet liquidated.
fn engine_with(units: u32, expenses: u32) -> Engine {
    let engine = Engine::with_config(EngineConfig::default(), Arc::new(FixedClock::new(today())));
    engine
        .register_consortium(Consortium::new(CONSORTIUM, "bench"))
        .unwrap();
    engine
        .register_account(Account::new(AccountId(1), CONSORTIUM, "cash"))
        .unwrap();
    let share = Decimal::ONE_HUNDRED / Decimal::from(units);
    for id in 1..=units {
        engine
            .register_unit(Unit {
                owner_id: Some(PersonId(id % 50 + 1)),
                ..Unit::new(UnitId(id), CONSORTIUM, share)
            })
            .unwrap();
    }
    for id in 1..=expenses {
        let amount = Decimal::new(125_000, 2);
        engine
            .record_expense(Expense {
                settled: amount,
                ..Expense::new(ExpenseId(id), CONSORTIUM, amount)
            })
            .unwrap();
    }
    engine
}

fn issued(units: u32) -> (Engine, Vec<LedgerEntryId>) {
    let engine = engine_with(units, 20);
    let liquidation = engine
        .create_draft(CONSORTIUM, Period::new(2026, 9).unwrap())
        .unwrap();
    let entries = engine.issue(liquidation).unwrap();
    (engine, entries)
}

fn make_payment(entry: LedgerEntryId, cents: i64) -> PaymentRequest {
    PaymentRequest::new(
        PaymentTarget::LedgerEntry(entry),
        Decimal::new(cents, 2),
        today(),
    )
    .account(AccountId(1))
    .payer(PersonId(1))
}

// =============================================================================
// Allocation Benchmarks
// =============================================================================

fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation");

    for units in [10u32, 100, 1_000].iter() {
        let units_shares = shares(*units);
        group.throughput(Throughput::Elements(*units as u64));
        group.bench_with_input(BenchmarkId::from_parameter(units), &units_shares, |b, s| {
            b.iter(|| allocate(black_box(Decimal::new(30_000_000, 2)), black_box(s)))
        });
    }
    group.finish();
}

// =============================================================================
// Liquidation Benchmarks
// =============================================================================

fn bench_issue(c: &mut Criterion) {
    let mut group = c.benchmark_group("issue");

    for units in [10u32, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*units as u64));
        group.bench_with_input(BenchmarkId::from_parameter(units), units, |b, &units| {
            b.iter_batched(
                || engine_with(units, 20),
                |engine| {
                    let liquidation = engine
                        .create_draft(CONSORTIUM, Period::new(2026, 9).unwrap())
                        .unwrap();
                    black_box(engine.issue(liquidation).unwrap());
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// =============================================================================
// Payment Benchmarks
// =============================================================================

fn bench_single_payment(c: &mut Criterion) {
    c.bench_function("single_payment", |b| {
        b.iter_batched(
            || issued(1),
            |(engine, entries)| {
                engine
                    .apply_payment(black_box(make_payment(entries[0], 1_000)))
                    .unwrap();
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_parallel_payments_same_entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_payments_same_entry");

    for count in [1_000u64, 10_000].iter() {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_batched(
                || issued(1),
                |(engine, entries)| {
                    (0..count).into_par_iter().for_each(|_| {
                        let _ = engine.apply_payment(make_payment(entries[0], 1));
                    });
                    black_box(&engine);
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_parallel_payments_many_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_payments_many_entries");

    for units in [10u32, 100, 1_000].iter() {
        let payments_per_unit = 20u64;
        group.throughput(Throughput::Elements(*units as u64 * payments_per_unit));
        group.bench_with_input(BenchmarkId::from_parameter(units), units, |b, &units| {
            b.iter_batched(
                || issued(units),
                |(engine, entries)| {
                    entries.par_iter().for_each(|entry| {
                        for _ in 0..payments_per_unit {
                            let _ = engine.apply_payment(make_payment(*entry, 1));
                        }
                    });
                    black_box(&engine);
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// =============================================================================
// View Benchmarks
// =============================================================================

fn bench_debtors(c: &mut Criterion) {
    let mut group = c.benchmark_group("debtors");

    for units in [10u32, 100, 1_000].iter() {
        let (engine, _) = issued(*units);
        group.throughput(Throughput::Elements(*units as u64));
        group.bench_with_input(BenchmarkId::from_parameter(units), &engine, |b, engine| {
            b.iter(|| black_box(engine.debtors_by_person(CONSORTIUM).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(allocation_benches, bench_allocation);
criterion_group!(liquidation_benches, bench_issue);
criterion_group!(
    payment_benches,
    bench_single_payment,
    bench_parallel_payments_same_entry,
    bench_parallel_payments_many_entries,
);
criterion_group!(view_benches, bench_debtors);

criterion_main!(
    allocation_benches,
    liquidation_benches,
    payment_benches,
    view_benches
);
