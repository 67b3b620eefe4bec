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

//! Hash chain verification.
//!
//! Verification walks the records in order and stops at the first fault:
//! a sequence number out of place, a link that does not point at the
//! preceding record (or at [`GENESIS_HASH`] for the first one), or a stored
//! fingerprint that differs from the recomputed one.

use crate::LedgerError;
use crate::base::Sequence;
use crate::record::{GENESIS_HASH, HashEncoding, LedgerRecord};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Kind of corruption found in a chain.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFault {
    #[error("sequence number out of order")]
    SequenceGap,

    #[error("first record does not link to genesis")]
    GenesisMismatch,

    #[error("previous hash does not match preceding record")]
    BrokenLink,

    #[error("stored hash differs from recomputed fingerprint")]
    HashMismatch,
}

/// Outcome of verifying a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainVerification {
    Valid { records: usize },
    Broken { sequence: Sequence, fault: ChainFault },
}

impl ChainVerification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Sequence number of the first offending record, if any.
    pub fn offending_sequence(&self) -> Option<Sequence> {
        match self {
            Self::Valid { .. } => None,
            Self::Broken { sequence, .. } => Some(*sequence),
        }
    }

    /// Converts a broken chain into [`LedgerError::ChainIntegrity`].
    pub fn into_result(self) -> Result<usize, LedgerError> {
        match self {
            Self::Valid { records } => Ok(records),
            Self::Broken { sequence, fault } => Err(LedgerError::ChainIntegrity { sequence, fault }),
        }
    }
}

impl fmt::Display for ChainVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid { records } => write!(f, "chain valid ({records} records)"),
            Self::Broken { sequence, fault } => write!(f, "chain broken at record {sequence}: {fault}"),
        }
    }
}

/// Verifies `records` as a complete chain starting from genesis.
///
/// An empty chain is valid.
pub fn verify(records: &[LedgerRecord], encoding: HashEncoding) -> ChainVerification {
    let mut expected_sequence = Sequence::FIRST;
    let mut expected_previous = GENESIS_HASH;

    for record in records {
        let broken = |fault| ChainVerification::Broken {
            sequence: expected_sequence,
            fault,
        };

        if record.sequence != expected_sequence {
            return broken(ChainFault::SequenceGap);
        }
        if record.previous_hash != expected_previous {
            return if expected_sequence == Sequence::FIRST {
                broken(ChainFault::GenesisMismatch)
            } else {
                broken(ChainFault::BrokenLink)
            };
        }
        if record.expected_hash(encoding) != record.record_hash {
            return broken(ChainFault::HashMismatch);
        }

        expected_sequence = expected_sequence.next();
        expected_previous = &record.record_hash;
    }

    ChainVerification::Valid {
        records: records.len(),
    }
}
