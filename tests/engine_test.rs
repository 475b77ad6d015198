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

//! Engine public API integration tests: liquidation workflow.

use chrono::NaiveDate;
use consortium_settlement::{
    Account, AccountId, BillingTerms, Consortium, ConsortiumId, Engine, EngineConfig, ErrorKind,
    Expense, ExpenseId, FixedClock, LiquidationId, LiquidationState, PaymentRequest,
    PaymentTarget, Period, SettlementError, ShareMode, TotalBasis, Unit, UnitId, UnitType,
    UnitTypeId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const CONSORTIUM: ConsortiumId = ConsortiumId(1);

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn september() -> Period {
    Period::new(2026, 9).unwrap()
}

fn engine_with(config: EngineConfig, today: NaiveDate) -> Engine {
    let engine = Engine::with_config(config, Arc::new(FixedClock::new(today)));
    engine
        .register_consortium(Consortium::new(CONSORTIUM, "Torre Norte"))
        .unwrap();
    engine
        .register_account(Account::new(AccountId(1), CONSORTIUM, "Caja"))
        .unwrap();
    engine
        .register_unit(Unit::new(UnitId(1), CONSORTIUM, dec!(60)))
        .unwrap();
    engine
        .register_unit(Unit::new(UnitId(2), CONSORTIUM, dec!(40)))
        .unwrap();
    engine
}

fn engine_on(today: NaiveDate) -> Engine {
    engine_with(EngineConfig::default(), today)
}

fn paid_expense(id: u32, amount: Decimal) -> Expense {
    Expense {
        settled: amount,
        ..Expense::new(ExpenseId(id), CONSORTIUM, amount)
    }
}

#[test]
fn issue_allocates_total_by_share() {
    let engine = engine_on(date(2026, 10, 1));
    engine.record_expense(paid_expense(1, dec!(300000.00))).unwrap();

    let id = engine.create_draft(CONSORTIUM, september()).unwrap();
    let entries = engine.issue(id).unwrap();
    assert_eq!(entries.len(), 2);

    let snapshots = engine.ledger_entries(id).unwrap();
    assert_eq!(snapshots[0].unit_id, UnitId(1));
    assert_eq!(snapshots[0].base_amount, dec!(180000.00));
    assert_eq!(snapshots[1].base_amount, dec!(120000.00));
    assert_eq!(
        snapshots.iter().map(|s| s.base_amount).sum::<Decimal>(),
        dec!(300000.00)
    );

    let liquidation = engine.liquidation(id).unwrap();
    assert_eq!(liquidation.state, LiquidationState::Issued);
    assert_eq!(liquidation.total, dec!(300000.00));
    assert_eq!(liquidation.issue_date, Some(date(2026, 10, 1)));
    assert_eq!(engine.expense(ExpenseId(1)).unwrap().liquidation_id, Some(id));
}

#[test]
fn issue_builds_schedule_in_following_month() {
    let engine = engine_on(date(2026, 10, 1));
    let id = engine.create_draft(CONSORTIUM, september()).unwrap();
    engine.issue(id).unwrap();

    let schedule = engine.liquidation(id).unwrap().schedule.unwrap();
    assert_eq!(schedule.first().date, date(2026, 10, 10));
    assert_eq!(schedule.first().surcharge_pct, dec!(5));
    assert!(schedule.second().is_none());
}

#[test]
fn second_draft_for_consortium_conflicts() {
    let engine = engine_on(date(2026, 10, 1));
    let first = engine.create_draft(CONSORTIUM, september()).unwrap();

    let err = engine
        .create_draft(CONSORTIUM, Period::new(2026, 10).unwrap())
        .unwrap_err();
    assert_eq!(
        err,
        SettlementError::DraftExists {
            consortium: CONSORTIUM,
            draft: first,
        }
    );
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn liquidated_period_cannot_be_drafted_again() {
    let engine = engine_on(date(2026, 10, 1));
    let id = engine.create_draft(CONSORTIUM, september()).unwrap();
    engine.issue(id).unwrap();

    assert_eq!(
        engine.create_draft(CONSORTIUM, september()),
        Err(SettlementError::PeriodLiquidated {
            period: september(),
            last: september(),
        })
    );
    assert_eq!(
        engine.next_period(CONSORTIUM).unwrap(),
        Period::new(2026, 10).unwrap()
    );
    assert!(
        engine
            .create_draft(CONSORTIUM, Period::new(2026, 10).unwrap())
            .is_ok()
    );
}

#[test]
fn next_period_defaults_to_current_month() {
    let engine = engine_on(date(2026, 10, 16));
    assert_eq!(
        engine.next_period(CONSORTIUM).unwrap(),
        Period::new(2026, 10).unwrap()
    );
}

#[test]
fn suggested_closing_date_uses_offset() {
    let config = EngineConfig {
        closing_day_offset: 5,
        ..EngineConfig::default()
    };
    let engine = engine_with(config, date(2026, 10, 1));
    assert_eq!(
        engine.suggested_closing_date(CONSORTIUM, september()).unwrap(),
        date(2026, 10, 5)
    );

    let id = engine.create_draft(CONSORTIUM, september()).unwrap();
    assert_eq!(engine.liquidation(id).unwrap().closing_date, date(2026, 10, 5));
}

#[test]
fn state_machine_rejects_out_of_order_transitions() {
    let engine = engine_on(date(2026, 10, 1));
    let id = engine.create_draft(CONSORTIUM, september()).unwrap();

    assert_eq!(
        engine.close(id),
        Err(SettlementError::InvalidTransition {
            id,
            actual: LiquidationState::Draft,
            expected: LiquidationState::Issued,
        })
    );

    engine.issue(id).unwrap();
    assert_eq!(
        engine.issue(id),
        Err(SettlementError::InvalidTransition {
            id,
            actual: LiquidationState::Issued,
            expected: LiquidationState::Draft,
        })
    );

    engine.close(id).unwrap();
    assert_eq!(engine.liquidation(id).unwrap().state, LiquidationState::Closed);
    assert_eq!(engine.close(id).unwrap_err().kind(), ErrorKind::Conflict);
}

#[test]
fn unknown_liquidation_is_not_found() {
    let engine = engine_on(date(2026, 10, 1));
    assert_eq!(
        engine.issue(LiquidationId(42)),
        Err(SettlementError::LiquidationNotFound(LiquidationId(42)))
    );
}

#[test]
fn draft_collects_eligible_expenses() {
    let engine = engine_on(date(2026, 10, 1));
    engine
        .register_consortium(Consortium::new(ConsortiumId(2), "Otro"))
        .unwrap();

    engine.record_expense(paid_expense(1, dec!(100))).unwrap();
    engine
        .record_expense(Expense {
            applicable_period: Some(september()),
            ..paid_expense(2, dec!(200))
        })
        .unwrap();
    engine
        .record_expense(Expense {
            applicable_period: Some(Period::new(2026, 8).unwrap()),
            ..paid_expense(3, dec!(400))
        })
        .unwrap();
    engine
        .record_expense(Expense {
            consortium_id: ConsortiumId(2),
            ..paid_expense(4, dec!(800))
        })
        .unwrap();

    let id = engine.create_draft(CONSORTIUM, september()).unwrap();
    let liquidation = engine.liquidation(id).unwrap();
    assert_eq!(
        liquidation.expense_ids.iter().copied().collect::<Vec<_>>(),
        vec![ExpenseId(1), ExpenseId(2)]
    );
    assert_eq!(engine.draft_total(id).unwrap(), dec!(300));
}

#[test]
fn draft_editing_updates_running_total() {
    let engine = engine_on(date(2026, 10, 1));
    engine.record_expense(paid_expense(1, dec!(100))).unwrap();
    let id = engine.create_draft(CONSORTIUM, september()).unwrap();

    engine.record_expense(paid_expense(2, dec!(50.25))).unwrap();
    assert_eq!(engine.add_expense_to_draft(id, ExpenseId(2)).unwrap(), dec!(150.25));
    // Adding twice is a no-op.
    assert_eq!(engine.add_expense_to_draft(id, ExpenseId(2)).unwrap(), dec!(150.25));
    assert_eq!(
        engine.remove_expense_from_draft(id, ExpenseId(1)).unwrap(),
        dec!(50.25)
    );
    assert_eq!(
        engine.add_expense_to_draft(id, ExpenseId(9)),
        Err(SettlementError::ExpenseNotFound(ExpenseId(9)))
    );

    engine.issue(id).unwrap();
    assert_eq!(engine.liquidation(id).unwrap().total, dec!(50.25));
    assert_eq!(engine.expense(ExpenseId(1)).unwrap().liquidation_id, None);
    assert!(matches!(
        engine.add_expense_to_draft(id, ExpenseId(1)),
        Err(SettlementError::InvalidTransition { .. })
    ));
}

#[test]
fn draft_total_tracks_expense_payments() {
    let engine = engine_on(date(2026, 10, 1));
    engine
        .record_expense(Expense::new(ExpenseId(1), CONSORTIUM, dec!(1000)))
        .unwrap();
    let id = engine.create_draft(CONSORTIUM, september()).unwrap();
    assert_eq!(engine.draft_total(id).unwrap(), Decimal::ZERO);

    engine
        .apply_payment(
            PaymentRequest::new(
                PaymentTarget::Expense(ExpenseId(1)),
                dec!(400),
                date(2026, 10, 1),
            )
            .account(AccountId(1)),
        )
        .unwrap();
    assert_eq!(engine.draft_total(id).unwrap(), dec!(400));
}

#[test]
fn amount_basis_bills_full_expense() {
    let config = EngineConfig {
        total_basis: TotalBasis::Amount,
        ..EngineConfig::default()
    };
    let engine = engine_with(config, date(2026, 10, 1));
    engine
        .record_expense(Expense::new(ExpenseId(1), CONSORTIUM, dec!(1000)))
        .unwrap();

    let id = engine.create_draft(CONSORTIUM, september()).unwrap();
    engine.issue(id).unwrap();
    assert_eq!(engine.liquidation(id).unwrap().total, dec!(1000));
}

#[test]
fn linked_expense_is_not_drafted_again() {
    let engine = engine_on(date(2026, 10, 1));
    engine.record_expense(paid_expense(1, dec!(100))).unwrap();
    let first = engine.create_draft(CONSORTIUM, september()).unwrap();
    engine.issue(first).unwrap();

    let second = engine
        .create_draft(CONSORTIUM, Period::new(2026, 10).unwrap())
        .unwrap();
    assert!(engine.liquidation(second).unwrap().expense_ids.is_empty());
    assert_eq!(
        engine.add_expense_to_draft(second, ExpenseId(1)),
        Err(SettlementError::ExpenseUnavailable(ExpenseId(1)))
    );
}

#[test]
fn discard_releases_draft_slot() {
    let engine = engine_on(date(2026, 10, 1));
    engine.record_expense(paid_expense(1, dec!(100))).unwrap();
    let id = engine.create_draft(CONSORTIUM, september()).unwrap();

    engine.discard_draft(id).unwrap();
    assert!(engine.liquidation(id).is_none());
    assert_eq!(engine.consortium(CONSORTIUM).unwrap().draft, None);

    let again = engine.create_draft(CONSORTIUM, september()).unwrap();
    assert!(engine.liquidation(again).unwrap().expense_ids.contains(&ExpenseId(1)));

    engine.issue(again).unwrap();
    assert!(matches!(
        engine.discard_draft(again),
        Err(SettlementError::InvalidTransition { .. })
    ));
    assert!(engine.liquidation(again).is_some());
}

#[test]
fn inactive_units_are_not_billed() {
    let engine = engine_on(date(2026, 10, 1));
    engine
        .register_unit(Unit {
            active: false,
            ..Unit::new(UnitId(3), CONSORTIUM, dec!(10))
        })
        .unwrap();
    engine.record_expense(paid_expense(1, dec!(1000))).unwrap();

    let id = engine.create_draft(CONSORTIUM, september()).unwrap();
    let entries = engine.issue(id).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(
        engine
            .ledger_entries(id)
            .unwrap()
            .iter()
            .all(|s| s.unit_id != UnitId(3))
    );
}

#[test]
fn automatic_units_take_type_index() {
    let engine = engine_on(date(2026, 10, 1));
    engine
        .register_unit_type(UnitType {
            id: UnitTypeId(1),
            consortium_id: CONSORTIUM,
            name: "cochera".into(),
            index: dec!(2.5),
        })
        .unwrap();
    engine
        .register_unit(Unit {
            share_mode: ShareMode::Auto,
            unit_type_id: Some(UnitTypeId(1)),
            ..Unit::new(UnitId(3), CONSORTIUM, Decimal::ZERO)
        })
        .unwrap();
    engine.record_expense(paid_expense(1, dec!(1000))).unwrap();

    let id = engine.create_draft(CONSORTIUM, september()).unwrap();
    engine.issue(id).unwrap();

    let snapshots = engine.ledger_entries(id).unwrap();
    assert_eq!(snapshots[2].unit_id, UnitId(3));
    assert_eq!(snapshots[2].base_amount, dec!(25.00));
}

#[test]
fn unit_with_unknown_type_is_rejected() {
    let engine = engine_on(date(2026, 10, 1));
    let result = engine.register_unit(Unit {
        share_mode: ShareMode::Auto,
        unit_type_id: Some(UnitTypeId(7)),
        ..Unit::new(UnitId(3), CONSORTIUM, Decimal::ZERO)
    });
    assert_eq!(result, Err(SettlementError::UnitTypeNotFound(UnitTypeId(7))));
}

#[test]
fn registration_rejects_duplicates_and_unknown_consortium() {
    let engine = engine_on(date(2026, 10, 1));

    let err = engine
        .register_consortium(Consortium::new(CONSORTIUM, "Torre Norte"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    engine.record_expense(paid_expense(1, dec!(10))).unwrap();
    assert_eq!(
        engine.record_expense(paid_expense(1, dec!(10))),
        Err(SettlementError::Duplicate("expense 1".into()))
    );

    assert_eq!(
        engine.register_unit(Unit::new(UnitId(9), ConsortiumId(9), dec!(10))),
        Err(SettlementError::ConsortiumNotFound(ConsortiumId(9)))
    );
}

#[test]
fn expense_with_invalid_settled_is_rejected() {
    let engine = engine_on(date(2026, 10, 1));
    let expense = Expense {
        settled: dec!(150),
        ..Expense::new(ExpenseId(1), CONSORTIUM, dec!(100))
    };
    assert_eq!(
        engine.record_expense(expense),
        Err(SettlementError::InvalidSettled(ExpenseId(1)))
    );
}

#[test]
fn draft_terms_override_consortium_defaults() {
    let engine = engine_on(date(2026, 10, 1));
    let id = engine.create_draft(CONSORTIUM, september()).unwrap();

    let terms = BillingTerms {
        first_due_day: 15,
        first_due_surcharge_pct: dec!(3),
        second_due_day: Some(31),
        second_due_surcharge_pct: Some(dec!(6)),
    };
    engine.set_draft_terms(id, terms).unwrap();
    engine.issue(id).unwrap();

    let schedule = engine.liquidation(id).unwrap().schedule.unwrap();
    assert_eq!(schedule.first().date, date(2026, 10, 15));
    assert_eq!(schedule.second().unwrap().date, date(2026, 10, 31));
    assert_eq!(schedule.second().unwrap().surcharge_pct, dec!(6));
}

#[test]
fn invalid_draft_terms_are_rejected() {
    let engine = engine_on(date(2026, 10, 1));
    let id = engine.create_draft(CONSORTIUM, september()).unwrap();

    let terms = BillingTerms {
        second_due_surcharge_pct: Some(dec!(8)),
        ..BillingTerms::default()
    };
    assert_eq!(
        engine.set_draft_terms(id, terms),
        Err(SettlementError::MissingField("second_due_day"))
    );
}

#[test]
fn unissuable_surcharge_terms_are_rejected_when_set() {
    let engine = engine_on(date(2026, 10, 1));
    let id = engine.create_draft(CONSORTIUM, september()).unwrap();

    let falling = BillingTerms {
        first_due_day: 10,
        first_due_surcharge_pct: dec!(8),
        second_due_day: Some(20),
        second_due_surcharge_pct: Some(dec!(5)),
    };
    assert_eq!(
        engine.set_draft_terms(id, falling),
        Err(SettlementError::InvalidSchedule(
            "second surcharge percentage is below the first"
        ))
    );
    let negative = BillingTerms {
        first_due_surcharge_pct: dec!(-5),
        ..BillingTerms::default()
    };
    assert!(matches!(
        engine.set_draft_terms(id, negative),
        Err(SettlementError::InvalidSchedule(_))
    ));
    assert!(matches!(
        engine.register_consortium(Consortium {
            terms: Some(falling),
            ..Consortium::new(ConsortiumId(2), "Torre Sur")
        }),
        Err(SettlementError::InvalidSchedule(_))
    ));

    // The draft keeps its valid terms and still issues.
    engine.issue(id).unwrap();
    assert_eq!(
        engine.liquidation(id).unwrap().state,
        LiquidationState::Issued
    );
}
