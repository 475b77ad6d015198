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

//! Billable units and unit types.

use crate::base::{ConsortiumId, PersonId, UnitId, UnitTypeId};
use crate::error::SettlementError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where a unit's prorrateo comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareMode {
    /// The unit's own `share` field.
    #[default]
    Manual,
    /// The index of the unit's assigned type.
    Auto,
}

/// Who receives the unit's bill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillTo {
    #[default]
    Owner,
    Tenant,
    Both,
}

/// A unit type with its prorrateo index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub consortium_id: ConsortiumId,
    pub name: String,
    /// Share, in percent, given to automatic-prorrateo units of this type.
    pub index: Decimal,
}

/// An operative/functional unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub consortium_id: ConsortiumId,
    #[serde(default)]
    pub share: Decimal,
    #[serde(default)]
    pub share_mode: ShareMode,
    #[serde(default)]
    pub unit_type_id: Option<UnitTypeId>,
    #[serde(default)]
    pub rented: bool,
    #[serde(default)]
    pub bill_to: BillTo,
    #[serde(default = "default_true")]
    pub interest_eligible: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub owner_id: Option<PersonId>,
    #[serde(default)]
    pub tenant_id: Option<PersonId>,
}

fn default_true() -> bool {
    true
}

impl Unit {
    /// An active, interest-eligible, owner-billed unit with a manual share.
    pub fn new(id: UnitId, consortium_id: ConsortiumId, share: Decimal) -> Self {
        Self {
            id,
            consortium_id,
            share,
            share_mode: ShareMode::Manual,
            unit_type_id: None,
            rented: false,
            bill_to: BillTo::Owner,
            interest_eligible: true,
            active: true,
            owner_id: None,
            tenant_id: None,
        }
    }

    /// Checks the unit's own configuration.
    pub fn validate(&self) -> Result<(), SettlementError> {
        if self.share_mode == ShareMode::Manual && self.share < Decimal::ZERO {
            return Err(SettlementError::NegativeShare(self.id));
        }
        if self.share_mode == ShareMode::Auto && self.unit_type_id.is_none() {
            return Err(SettlementError::MissingField("unit_type_id"));
        }
        if matches!(self.bill_to, BillTo::Tenant | BillTo::Both) && !self.rented {
            return Err(SettlementError::TenantNotAllowed(self.id));
        }
        Ok(())
    }

    /// The share used for allocation.
    ///
    /// `index_of` resolves a unit type's index; automatic units take it as
    /// their share.
    pub fn effective_share<F>(&self, index_of: F) -> Result<Decimal, SettlementError>
    where
        F: FnOnce(UnitTypeId) -> Option<Decimal>,
    {
        match self.share_mode {
            ShareMode::Manual => Ok(self.share),
            ShareMode::Auto => {
                let type_id = self
                    .unit_type_id
                    .ok_or(SettlementError::MissingField("unit_type_id"))?;
                index_of(type_id).ok_or(SettlementError::UnitTypeNotFound(type_id))
            }
        }
    }

    /// The person billed for this unit.
    ///
    /// A unit billed to its tenant answers the tenant; owner and shared
    /// billing answer the owner.
    pub fn billed_person(&self) -> Option<PersonId> {
        match self.bill_to {
            BillTo::Tenant => self.tenant_id.or(self.owner_id),
            BillTo::Owner | BillTo::Both => self.owner_id,
        }
    }
}
