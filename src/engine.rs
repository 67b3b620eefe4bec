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

//! Transfer engine.
//!
//! The [`LedgerEngine`] owns the inventory and the append-only record chain.
//! A transfer either allocates every requested unit and appends exactly one
//! record, or fails without touching either.
//!
//! # Thread Safety
//!
//! Inventory and chain sit behind a single [`RwLock`]. Mutations hold the
//! write lock for their whole duration, so concurrent readers observe the
//! state either before or after a transfer, never in between.

use crate::base::{BloodType, LotId, Sequence};
use crate::chain::{self, ChainVerification};
use crate::config::LedgerConfig;
use crate::inventory::InventoryStore;
use crate::lot::{Donation, Lot};
use crate::record::{GENESIS_HASH, LedgerRecord};
use crate::LedgerError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

#[derive(Debug)]
struct LedgerState {
    inventory: InventoryStore,
    records: Vec<LedgerRecord>,
}

/// Ledger of blood unit transfers backed by an inventory of donor lots.
///
/// # Invariants
///
/// - Units are conserved: intake minus recorded transfers equals units on hand,
///   per blood type.
/// - Record sequence numbers start at 1 and increase by one.
/// - Each record links to the fingerprint of the one before it, the first to
///   [`GENESIS_HASH`].
/// - Record timestamps never decrease along the chain.
#[derive(Debug)]
pub struct LedgerEngine {
    config: LedgerConfig,
    state: RwLock<LedgerState>,
}

impl LedgerEngine {
    /// Creates an engine over `inventory` with an empty chain.
    pub fn new(inventory: InventoryStore) -> Self {
        Self::with_config(inventory, LedgerConfig::default())
    }

    pub fn with_config(inventory: InventoryStore, config: LedgerConfig) -> Self {
        Self::from_parts(inventory, Vec::new(), config)
    }

    /// Restores an engine from persisted inventory and records.
    ///
    /// The records are taken as-is; call [`verify_chain`](Self::verify_chain)
    /// to check them.
    pub fn from_parts(
        inventory: InventoryStore,
        records: Vec<LedgerRecord>,
        config: LedgerConfig,
    ) -> Self {
        LedgerEngine {
            config,
            state: RwLock::new(LedgerState { inventory, records }),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Records a transfer of `units` of `blood_type` to `recipient` at `now`.
    ///
    /// Lots are consumed oldest first. The returned record is the one appended
    /// to the chain.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidQuantity`] - `units` is zero.
    /// - [`LedgerError::TimestampRegression`] - `now` is before the last record.
    /// - [`LedgerError::InsufficientInventory`] - fewer than `units` on hand.
    /// - [`LedgerError::InternalInvariantViolation`] - inventory ran out mid-allocation.
    ///
    /// No state changes on error.
    pub fn request_transfer(
        &self,
        recipient: impl Into<String>,
        blood_type: BloodType,
        units: u32,
        now: DateTime<Utc>,
    ) -> Result<LedgerRecord, LedgerError> {
        self.transfer(recipient.into(), blood_type, units, now, false)
    }

    /// Like [`request_transfer`](Self::request_transfer), but a `now` earlier
    /// than the last record is raised to that record's timestamp instead of
    /// being rejected.
    ///
    /// The comparison happens under the write lock, so threads sharing the
    /// engine can pass their own wall-clock readings without racing each other.
    pub fn request_transfer_not_before_last(
        &self,
        recipient: impl Into<String>,
        blood_type: BloodType,
        units: u32,
        now: DateTime<Utc>,
    ) -> Result<LedgerRecord, LedgerError> {
        self.transfer(recipient.into(), blood_type, units, now, true)
    }

    #[instrument(skip(self, recipient), fields(recipient = %recipient))]
    fn transfer(
        &self,
        recipient: String,
        blood_type: BloodType,
        units: u32,
        now: DateTime<Utc>,
        clamp_to_last: bool,
    ) -> Result<LedgerRecord, LedgerError> {

        if units == 0 {
            warn!("transfer rejected: zero units");
            return Err(LedgerError::InvalidQuantity);
        }

        let mut state = self.state.write();

        let last = state.records.last();
        let now = match last {
            Some(record) if clamp_to_last => now.max(record.timestamp),
            _ => now,
        };
        if last.is_some_and(|record| now < record.timestamp) {
            warn!("transfer rejected: timestamp precedes last record");
            return Err(LedgerError::TimestampRegression);
        }
        let sequence = last.map_or(Sequence::FIRST, |record| record.sequence.next());
        let previous_hash = last.map_or_else(
            || GENESIS_HASH.to_string(),
            |record| record.record_hash.clone(),
        );

        let available = state.inventory.available_units(blood_type);
        if available < u64::from(units) {
            warn!(available, "transfer rejected: insufficient inventory");
            return Err(LedgerError::InsufficientInventory {
                blood_type,
                requested: units,
                available,
            });
        }

        let allocations = state.inventory.consume(blood_type, units)?;

        let record = LedgerRecord::new(
            self.config.hash_encoding,
            sequence,
            recipient,
            blood_type,
            units,
            now,
            previous_hash,
        );
        state.records.push(record.clone());

        info!(
            sequence = %record.sequence,
            lots = allocations.len(),
            hash = %record.record_hash,
            "transfer recorded"
        );
        Ok(record)
    }

    /// Adds an unattributed lot to the inventory.
    pub fn add_lot(&self, blood_type: BloodType, units: u32) -> Result<LotId, LedgerError> {
        self.state.write().inventory.add_lot(blood_type, units)
    }

    /// Registers a donation as a new lot.
    pub fn register_donation(&self, donation: Donation) -> Result<LotId, LedgerError> {
        self.state.write().inventory.register_donation(donation)
    }

    /// Seeds one lot per blood type. See [`InventoryStore::seed_initial_stock`].
    pub fn seed_initial_stock<R: Rng>(&self, rng: &mut R) -> Vec<LotId> {
        self.state.write().inventory.seed_initial_stock(rng)
    }

    pub fn available_units(&self, blood_type: BloodType) -> u64 {
        self.state.read().inventory.available_units(blood_type)
    }

    /// Units on hand per blood type, omitting empty types.
    pub fn inventory_summary(&self) -> BTreeMap<BloodType, u64> {
        self.state.read().inventory.summary()
    }

    /// Lots of `blood_type` in the order they will be consumed.
    pub fn lots(&self, blood_type: BloodType) -> Vec<Lot> {
        self.state.read().inventory.lots(blood_type).cloned().collect()
    }

    pub fn lot(&self, id: LotId) -> Option<Lot> {
        self.state.read().inventory.lot(id).cloned()
    }

    /// Consistent copy of every lot and record, for persistence.
    pub fn snapshot(&self) -> (Vec<Lot>, Vec<LedgerRecord>) {
        let state = self.state.read();
        (
            state.inventory.all_lots().cloned().collect(),
            state.records.clone(),
        )
    }

    /// Copy of the chain in append order.
    pub fn history(&self) -> Vec<LedgerRecord> {
        self.state.read().records.clone()
    }

    /// Recomputes and checks every fingerprint and link in the chain.
    pub fn verify_chain(&self) -> ChainVerification {
        let state = self.state.read();
        let result = chain::verify(&state.records, self.config.hash_encoding);
        if let ChainVerification::Broken { sequence, fault } = result {
            warn!(%sequence, %fault, "chain verification failed");
        }
        result
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.state.read().records.last().map(|record| record.timestamp)
    }

    /// Number of records in the chain.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }
}

impl Default for LedgerEngine {
    fn default() -> Self {
        Self::new(InventoryStore::new())
    }
}
