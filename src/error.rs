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

//! Error types for inventory intake, transfers, and chain verification.

use crate::base::{BloodType, Sequence};
use crate::chain::ChainFault;
use thiserror::Error;

/// Ledger errors.
///
/// Request validation and availability failures are raised before any state is
/// touched. [`LedgerError::InternalInvariantViolation`] signals that the
/// inventory and the engine disagree and must not be retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Units are zero
    #[error("invalid quantity (must be positive)")]
    InvalidQuantity,

    /// Blood type code outside the supported set
    #[error("unknown blood type '{0}'")]
    UnknownBloodType(String),

    /// Transfer timestamp is earlier than the last recorded transfer
    #[error("timestamp precedes the last ledger record")]
    TimestampRegression,

    /// Donation has a blank donor name
    #[error("missing donor name")]
    MissingDonorName,

    /// Donation has no donor age
    #[error("missing donor age")]
    MissingDonorAge,

    /// Donor is outside the accepted age range
    #[error("donor age {0} outside accepted range 18-100")]
    DonorAgeOutOfRange(u8),

    /// Not enough units on hand to cover the whole request
    #[error("insufficient {blood_type} inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        blood_type: BloodType,
        requested: u32,
        available: u64,
    },

    /// Stored chain does not match its recomputed fingerprints or links
    #[error("chain integrity violation at record {sequence}: {fault}")]
    ChainIntegrity { sequence: Sequence, fault: ChainFault },

    /// Lots ran out during allocation despite a passing availability check
    #[error("internal invariant violated: {blood_type} lots exhausted with {shortfall} units unallocated")]
    InternalInvariantViolation { blood_type: BloodType, shortfall: u64 },
}

impl LedgerError {
    /// Returns `true` for errors caused by malformed input rather than state.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuantity
                | Self::UnknownBloodType(_)
                | Self::TimestampRegression
                | Self::MissingDonorName
                | Self::MissingDonorAge
                | Self::DonorAgeOutOfRange(_)
        )
    }
}
