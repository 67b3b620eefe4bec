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

//! Ledger records and their fingerprints.
//!
//! A record's fingerprint is the SHA-256 of its transfer fields followed by
//! the previous record's fingerprint, rendered as lowercase hex. The first
//! record links to [`GENESIS_HASH`].

use crate::base::{BloodType, Sequence};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `previous_hash` of the first record in every chain.
pub const GENESIS_HASH: &str = "0";

/// Renders the timestamp field of fingerprint input.
///
/// Microseconds are written as six digits and omitted entirely when zero, so
/// `2025-01-01 08:30:00` and `2025-01-01 08:30:00.000001`. Sub-microsecond
/// precision is dropped.
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    let micros = timestamp.nanosecond() % 1_000_000_000 / 1_000;
    let seconds = timestamp.format("%Y-%m-%d %H:%M:%S");
    if micros == 0 {
        seconds.to_string()
    } else {
        format!("{seconds}.{micros:06}")
    }
}

/// How record fields are laid out before hashing.
///
/// `Concatenated` writes the fields back to back, so `("ab", "c")` and
/// `("a", "bc")` hash identically. `LengthPrefixed` precedes each field with
/// its byte length as a big-endian `u64`. Switching encodings changes every
/// fingerprint, so a chain must be verified with the encoding it was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashEncoding {
    #[default]
    Concatenated,
    LengthPrefixed,
}

impl HashEncoding {
    /// Fingerprints a transfer given the hash of the record it follows.
    pub fn fingerprint(
        &self,
        recipient: &str,
        blood_type: BloodType,
        units: u32,
        timestamp: &DateTime<Utc>,
        previous_hash: &str,
    ) -> String {
        let units = units.to_string();
        let timestamp = canonical_timestamp(timestamp);
        let fields: [&[u8]; 5] = [
            recipient.as_bytes(),
            blood_type.code().as_bytes(),
            units.as_bytes(),
            timestamp.as_bytes(),
            previous_hash.as_bytes(),
        ];

        let mut hasher = Sha256::new();
        for field in fields {
            if *self == HashEncoding::LengthPrefixed {
                hasher.update((field.len() as u64).to_be_bytes());
            }
            hasher.update(field);
        }
        hex::encode(hasher.finalize())
    }
}

/// One completed transfer in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub sequence: Sequence,
    pub recipient: String,
    pub blood_type: BloodType,
    pub units: u32,
    pub timestamp: DateTime<Utc>,
    pub record_hash: String,
    pub previous_hash: String,
}

impl LedgerRecord {
    pub(crate) fn new(
        encoding: HashEncoding,
        sequence: Sequence,
        recipient: String,
        blood_type: BloodType,
        units: u32,
        timestamp: DateTime<Utc>,
        previous_hash: String,
    ) -> Self {
        let record_hash =
            encoding.fingerprint(&recipient, blood_type, units, &timestamp, &previous_hash);
        Self {
            sequence,
            recipient,
            blood_type,
            units,
            timestamp,
            record_hash,
            previous_hash,
        }
    }

    /// Recomputes the fingerprint from the stored fields.
    pub fn expected_hash(&self, encoding: HashEncoding) -> String {
        encoding.fingerprint(
            &self.recipient,
            self.blood_type,
            self.units,
            &self.timestamp,
            &self.previous_hash,
        )
    }
}
