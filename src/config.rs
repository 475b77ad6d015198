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

//! Engine configuration.
//!
//! Loaded from TOML; every field has a default so an empty file (or no file)
//! is a valid configuration.
//!
//! ```toml
//! interest_policy = "compuesto"
//! closing_day_offset = 5
//! due_month_offset = 1
//! total_basis = "settled"
//!
//! [default_terms]
//! first_due_day = 10
//! first_due_surcharge_pct = "5"
//! second_due_day = 20
//! second_due_surcharge_pct = "8"
//! ```

use crate::liquidation::BillingTerms;
use crate::surcharge::InterestPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Which expense figure feeds a liquidation total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalBasis {
    /// Amounts already paid out on the expenses.
    #[default]
    Settled,
    /// Full expense amounts, paid or not.
    Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Policy for consortiums without their own.
    pub interest_policy: InterestPolicy,
    /// Days after the period's last day used for the suggested closing date.
    pub closing_day_offset: u32,
    /// Months after the period in which the due days fall.
    pub due_month_offset: u32,
    pub total_basis: TotalBasis,
    /// Terms for consortiums without their own.
    pub default_terms: BillingTerms,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interest_policy: InterestPolicy::Acumulado,
            closing_day_offset: 0,
            due_month_offset: 1,
            total_basis: TotalBasis::Settled,
            default_terms: BillingTerms::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid default terms: {0}")]
    Terms(#[from] crate::SettlementError),
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.default_terms.validate()?;
        Ok(config)
    }

    /// Loads from `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("no config file given, using defaults");
            return Ok(Self::default());
        };
        debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
