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

//! Ledger configuration.

use crate::record::HashEncoding;
use serde::{Deserialize, Serialize};

/// Settings fixed for the lifetime of a [`LedgerEngine`](crate::LedgerEngine).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Field layout used when fingerprinting and verifying records.
    pub hash_encoding: HashEncoding,
}

impl LedgerConfig {
    pub fn with_hash_encoding(mut self, hash_encoding: HashEncoding) -> Self {
        self.hash_encoding = hash_encoding;
        self
    }
}
