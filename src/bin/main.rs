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

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use consortium_settlement::{
    Account, AccountId, BillTo, Clock, ConfigError, Consortium, ConsortiumId, Engine,
    EngineConfig, Expense, ExpenseId, FixedClock, LedgerEntryId, LiquidationId, PaymentRequest,
    PaymentTarget, Period, PersonId, SettlementError, SystemClock, Unit, UnitId,
};
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Consortium Settlement - Liquidate a period from CSV files
///
/// Reads a consortium's units and expenses, creates and issues the
/// liquidation for a period, applies any payments, and writes the resulting
/// report to stdout.
#[derive(Parser, Debug)]
#[command(name = "consortium-settlement")]
#[command(about = "Liquidates a consortium period and reports what each unit owes", long_about = None)]
struct Args {
    /// Units CSV
    ///
    /// Expected format: unit,share,owner,tenant,bill_to,interest_eligible
    #[arg(long, value_name = "FILE")]
    units: PathBuf,

    /// Expenses CSV
    ///
    /// Expected format: expense,amount,settled,period
    #[arg(long, value_name = "FILE")]
    expenses: PathBuf,

    /// Payments CSV, applied after the liquidation is issued
    ///
    /// Expected format: unit,amount,date,payer
    #[arg(long, value_name = "FILE")]
    payments: Option<PathBuf>,

    /// Period to liquidate (YYYY-MM); defaults to the current month
    #[arg(long)]
    period: Option<Period>,

    /// Business date used as "today" (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    as_of: Option<NaiveDate>,

    /// Engine configuration (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Report::Debtors)]
    report: Report,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Report {
    /// Outstanding balance per unit
    Debtors,
    /// Every ledger entry of the issued liquidation
    Ledger,
}

const CONSORTIUM: ConsortiumId = ConsortiumId(1);
const CASH_ACCOUNT: AccountId = AccountId(1);

#[derive(Error, Debug)]
enum CliError {
    #[error("cannot open '{path}': {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consortium_settlement=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args, std::io::stdout()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run<W: Write>(args: &Args, output: W) -> Result<(), CliError> {
    let config = EngineConfig::load(args.config.as_deref())?;
    let clock: Arc<dyn Clock> = match args.as_of {
        Some(date) => Arc::new(FixedClock::new(date)),
        None => Arc::new(SystemClock),
    };
    let engine = Engine::with_config(config, clock);

    engine.register_consortium(Consortium::new(CONSORTIUM, "consortium"))?;
    engine.register_account(Account::new(CASH_ACCOUNT, CONSORTIUM, "cash"))?;

    load_units(&engine, open(&args.units)?)?;
    load_expenses(&engine, open(&args.expenses)?)?;

    let period = match args.period {
        Some(period) => period,
        None => engine.next_period(CONSORTIUM)?,
    };
    let liquidation_id = engine.create_draft(CONSORTIUM, period)?;
    engine.issue(liquidation_id)?;

    if let Some(path) = &args.payments {
        apply_payments(&engine, liquidation_id, open(path)?)?;
    }

    match args.report {
        Report::Debtors => write_debtors(&engine, output),
        Report::Ledger => write_ledger(&engine, liquidation_id, output),
    }
}

fn open(path: &Path) -> Result<BufReader<File>, CliError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| CliError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader)
}

/// Raw units CSV record.
#[derive(Debug, Deserialize)]
struct UnitRecord {
    unit: u32,
    share: Decimal,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    owner: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    tenant: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    bill_to: Option<BillTo>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    interest_eligible: Option<bool>,
}

impl UnitRecord {
    fn into_unit(self) -> Unit {
        let bill_to = self.bill_to.unwrap_or_default();
        Unit {
            owner_id: self.owner.map(PersonId),
            tenant_id: self.tenant.map(PersonId),
            rented: self.tenant.is_some(),
            bill_to,
            interest_eligible: self.interest_eligible.unwrap_or(true),
            ..Unit::new(UnitId(self.unit), CONSORTIUM, self.share)
        }
    }
}

/// Raw expenses CSV record. `settled` defaults to zero.
#[derive(Debug, Deserialize)]
struct ExpenseRecord {
    expense: u32,
    amount: Decimal,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    settled: Option<Decimal>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    period: Option<Period>,
}

/// Raw payments CSV record, targeting the unit's ledger entry.
#[derive(Debug, Deserialize)]
struct PaymentRecord {
    unit: u32,
    amount: Decimal,
    date: NaiveDate,
    payer: u32,
}

/// Registers every valid unit row. Malformed and rejected rows are skipped.
fn load_units<R: Read>(engine: &Engine, reader: R) -> Result<usize, csv::Error> {
    let mut loaded = 0;
    for result in csv_reader(reader).deserialize::<UnitRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed unit row");
                continue;
            }
        };
        let unit_id = record.unit;
        match engine.register_unit(record.into_unit()) {
            Ok(()) => loaded += 1,
            Err(e) => warn!(unit = unit_id, error = %e, "skipping unit"),
        }
    }
    info!(units = loaded, "units loaded");
    Ok(loaded)
}

/// Records every valid expense row. Malformed and rejected rows are skipped.
fn load_expenses<R: Read>(engine: &Engine, reader: R) -> Result<usize, csv::Error> {
    let mut loaded = 0;
    for result in csv_reader(reader).deserialize::<ExpenseRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed expense row");
                continue;
            }
        };
        let expense = Expense {
            settled: record.settled.unwrap_or(Decimal::ZERO),
            applicable_period: record.period,
            ..Expense::new(ExpenseId(record.expense), CONSORTIUM, record.amount)
        };
        match engine.record_expense(expense) {
            Ok(()) => loaded += 1,
            Err(e) => warn!(expense = record.expense, error = %e, "skipping expense"),
        }
    }
    info!(expenses = loaded, "expenses loaded");
    Ok(loaded)
}

/// Applies payment rows to the ledger entries of `liquidation_id`.
///
/// Rejected payments are logged and skipped; the rest of the file is still
/// applied.
fn apply_payments<R: Read>(
    engine: &Engine,
    liquidation_id: LiquidationId,
    reader: R,
) -> Result<usize, CliError> {
    let entry_of: HashMap<UnitId, LedgerEntryId> = engine
        .ledger_entries(liquidation_id)?
        .into_iter()
        .map(|snapshot| (snapshot.unit_id, snapshot.id))
        .collect();

    let mut applied = 0;
    for result in csv_reader(reader).deserialize::<PaymentRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed payment row");
                continue;
            }
        };
        let Some(entry_id) = entry_of.get(&UnitId(record.unit)) else {
            warn!(unit = record.unit, "skipping payment for unit without ledger entry");
            continue;
        };
        let request = PaymentRequest::new(
            PaymentTarget::LedgerEntry(*entry_id),
            record.amount,
            record.date,
        )
        .account(CASH_ACCOUNT)
        .payer(PersonId(record.payer));
        match engine.apply_payment(request) {
            Ok(_) => applied += 1,
            Err(e) => warn!(unit = record.unit, amount = %record.amount, error = %e, "skipping payment"),
        }
    }
    info!(payments = applied, "payments applied");
    Ok(applied)
}

/// Writes the debtor view as CSV.
///
/// # CSV Format
///
/// Columns: `unit_id, person_id, outstanding, entries, overdue_entries`
fn write_debtors<W: Write>(engine: &Engine, writer: W) -> Result<(), CliError> {
    let mut wtr = Writer::from_writer(writer);
    for debtor in engine.debtors(CONSORTIUM)? {
        wtr.serialize(&debtor)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes every ledger entry of a liquidation as CSV, ordered by unit.
fn write_ledger<W: Write>(
    engine: &Engine,
    liquidation_id: LiquidationId,
    writer: W,
) -> Result<(), CliError> {
    let mut wtr = Writer::from_writer(writer);
    for snapshot in engine.ledger_entries(liquidation_id)? {
        wtr.serialize(&snapshot)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}
