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

//! Inventory lots and donation intake.

use crate::LedgerError;
use crate::base::{BloodType, LotId};
use serde::{Deserialize, Serialize};

/// Donor attribution carried by a lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donor {
    pub name: String,
    pub age: u8,
}

/// A donation submitted for intake.
///
/// Validated by [`Donation::validate`] before a lot is created from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub donor_name: String,
    pub age: u8,
    pub blood_type: BloodType,
    pub units: u32,
}

impl Donation {
    pub const MIN_DONOR_AGE: u8 = 18;
    pub const MAX_DONOR_AGE: u8 = 100;

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.donor_name.trim().is_empty() {
            return Err(LedgerError::MissingDonorName);
        }
        if !(Self::MIN_DONOR_AGE..=Self::MAX_DONOR_AGE).contains(&self.age) {
            return Err(LedgerError::DonorAgeOutOfRange(self.age));
        }
        if self.units == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        Ok(())
    }
}

/// A quantity of fungible units of one blood type.
///
/// Lots held by an [`InventoryStore`](crate::InventoryStore) always have
/// `units > 0`; a fully consumed lot is removed rather than left at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub(crate) id: LotId,
    pub(crate) blood_type: BloodType,
    pub(crate) units: u32,
    pub(crate) donor: Option<Donor>,
}

impl Lot {
    pub fn id(&self) -> LotId {
        self.id
    }

    pub fn blood_type(&self) -> BloodType {
        self.blood_type
    }

    pub fn units(&self) -> u32 {
        self.units
    }

    pub fn donor(&self) -> Option<&Donor> {
        self.donor.as_ref()
    }
}

/// Units taken from a single lot while satisfying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotAllocation {
    pub lot_id: LotId,
    pub units: u32,
    /// `true` when the lot was fully consumed and removed.
    pub depleted: bool,
}
