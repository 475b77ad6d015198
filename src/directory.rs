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

//! Consortium and account records referenced by settlement operations.

use crate::base::{AccountId, ConsortiumId, LiquidationId, Period};
use crate::config::EngineConfig;
use crate::liquidation::BillingTerms;
use crate::surcharge::InterestPolicy;
use serde::{Deserialize, Serialize};

/// A managed consortium and its billing settings.
///
/// Unset settings fall back to the engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consortium {
    pub id: ConsortiumId,
    pub name: String,
    #[serde(default)]
    pub interest_policy: Option<InterestPolicy>,
    #[serde(default)]
    pub terms: Option<BillingTerms>,
    #[serde(default)]
    pub closing_day_offset: Option<u32>,
    /// Last period issued for this consortium.
    #[serde(default)]
    pub last_liquidated: Option<Period>,
    /// The consortium's open draft, if any. At most one exists at a time.
    #[serde(default)]
    pub draft: Option<LiquidationId>,
}

impl Consortium {
    pub fn new(id: ConsortiumId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            interest_policy: None,
            terms: None,
            closing_day_offset: None,
            last_liquidated: None,
            draft: None,
        }
    }

    pub fn policy(&self, config: &EngineConfig) -> InterestPolicy {
        self.interest_policy.unwrap_or(config.interest_policy)
    }

    pub fn billing_terms(&self, config: &EngineConfig) -> BillingTerms {
        self.terms.unwrap_or(config.default_terms)
    }

    pub fn closing_offset(&self, config: &EngineConfig) -> u32 {
        self.closing_day_offset.unwrap_or(config.closing_day_offset)
    }
}

/// A collection/disbursement account payments are recorded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub consortium_id: ConsortiumId,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Account {
    pub fn new(id: AccountId, consortium_id: ConsortiumId, name: impl Into<String>) -> Self {
        Self {
            id,
            consortium_id,
            name: name.into(),
            active: true,
        }
    }
}
