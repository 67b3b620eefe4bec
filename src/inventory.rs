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

//! Inventory of donor lots.
//!
//! Lots are grouped by blood type and keyed by [`LotId`], so iterating a
//! group yields lots in creation order. Allocation walks that order and takes
//! whole lots until the final, partially consumed one.
//!
//! ```
//! use blood_ledger::{BloodType, InventoryStore};
//!
//! let mut store = InventoryStore::new();
//! store.add_lot(BloodType::OPositive, 5).unwrap();
//! store.add_lot(BloodType::OPositive, 10).unwrap();
//!
//! let allocations = store.consume(BloodType::OPositive, 7).unwrap();
//! assert_eq!(allocations.len(), 2);
//! assert_eq!(store.available_units(BloodType::OPositive), 8);
//! ```

use crate::LedgerError;
use crate::base::{BloodType, LotId};
use crate::lot::{Donation, Donor, Lot, LotAllocation};
use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Owner of all inventory lots.
///
/// # Invariants
///
/// - Every stored lot has `units > 0`.
/// - Lot IDs are strictly increasing in creation order and never reused, even
///   after the lot is depleted.
#[derive(Debug, Clone, Default)]
pub struct InventoryStore {
    lots: BTreeMap<BloodType, BTreeMap<LotId, Lot>>,
    next_id: u64,
}

impl InventoryStore {
    pub const INITIAL_STOCK_MIN: u32 = 60;
    pub const INITIAL_STOCK_MAX: u32 = 100;

    /// Creates an empty store. The first lot receives ID 1.
    pub fn new() -> Self {
        Self {
            lots: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Rebuilds a store from previously persisted lots.
    ///
    /// Lots with zero units, IDs already restored, and an ID with no
    /// successor are dropped; the first lot seen for an ID wins. New lots
    /// continue numbering after the highest restored ID.
    pub fn from_lots(lots: impl IntoIterator<Item = Lot>) -> Self {
        let mut store = Self::new();
        for lot in lots {
            if lot.units == 0 {
                warn!(lot_id = %lot.id, "dropping empty lot on restore");
                continue;
            }
            if store.lot(lot.id).is_some() {
                warn!(lot_id = %lot.id, "dropping duplicate lot on restore");
                continue;
            }
            let Some(next_id) = lot.id.0.checked_add(1) else {
                warn!(lot_id = %lot.id, "dropping lot with exhausted id on restore");
                continue;
            };
            store.next_id = store.next_id.max(next_id);
            store
                .lots
                .entry(lot.blood_type)
                .or_default()
                .insert(lot.id, lot);
        }
        store
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.lots
                .values()
                .flat_map(BTreeMap::values)
                .all(|lot| lot.units > 0),
            "Invariant violated: empty lot left in store"
        );
        debug_assert!(
            self.lots.values().all(|group| !group.is_empty()),
            "Invariant violated: empty blood type group left in store"
        );
    }

    /// Sum of units across all lots of `blood_type`.
    pub fn available_units(&self, blood_type: BloodType) -> u64 {
        self.lots
            .get(&blood_type)
            .map(|group| group.values().map(|lot| u64::from(lot.units)).sum())
            .unwrap_or(0)
    }

    /// Sum of units across every lot in the store.
    pub fn total_units(&self) -> u64 {
        BloodType::ALL
            .into_iter()
            .map(|blood_type| self.available_units(blood_type))
            .sum()
    }

    /// Adds a lot without donor attribution.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidQuantity`] if `units` is zero.
    pub fn add_lot(&mut self, blood_type: BloodType, units: u32) -> Result<LotId, LedgerError> {
        if units == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        Ok(self.insert_lot(blood_type, units, None))
    }

    /// Validates a donation and stores it as a new lot attributed to the donor.
    pub fn register_donation(&mut self, donation: Donation) -> Result<LotId, LedgerError> {
        donation.validate()?;
        let donor = Donor {
            name: donation.donor_name.trim().to_string(),
            age: donation.age,
        };
        Ok(self.insert_lot(donation.blood_type, donation.units, Some(donor)))
    }

    /// Adds one lot per blood type with a random quantity between
    /// [`INITIAL_STOCK_MIN`](Self::INITIAL_STOCK_MIN) and
    /// [`INITIAL_STOCK_MAX`](Self::INITIAL_STOCK_MAX) inclusive.
    pub fn seed_initial_stock<R: Rng>(&mut self, rng: &mut R) -> Vec<LotId> {
        BloodType::ALL
            .into_iter()
            .map(|blood_type| {
                let units = rng.gen_range(Self::INITIAL_STOCK_MIN..=Self::INITIAL_STOCK_MAX);
                self.insert_lot(blood_type, units, None)
            })
            .collect()
    }

    fn insert_lot(&mut self, blood_type: BloodType, units: u32, donor: Option<Donor>) -> LotId {
        let id = LotId(self.next_id);
        self.next_id += 1;
        info!(lot_id = %id, %blood_type, units, "lot added");
        self.lots.entry(blood_type).or_default().insert(
            id,
            Lot {
                id,
                blood_type,
                units,
                donor,
            },
        );
        self.assert_invariants();
        id
    }

    /// Takes `amount` units of `blood_type`, oldest lots first.
    ///
    /// Whole lots are removed while they fit in the remaining amount; the
    /// last lot touched is decremented. The returned allocations are in
    /// consumption order. Nothing is mutated when an error is returned.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidQuantity`] if `amount` is zero.
    /// - [`LedgerError::InsufficientInventory`] if fewer than `amount` units are on hand.
    /// - [`LedgerError::InternalInvariantViolation`] if the lots run out during allocation.
    pub fn consume(
        &mut self,
        blood_type: BloodType,
        amount: u32,
    ) -> Result<Vec<LotAllocation>, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        let available = self.available_units(blood_type);
        if available < u64::from(amount) {
            return Err(LedgerError::InsufficientInventory {
                blood_type,
                requested: amount,
                available,
            });
        }

        let allocations = self.plan(blood_type, amount)?;
        self.apply(blood_type, &allocations);
        Ok(allocations)
    }

    /// Computes FIFO allocations without touching any lot.
    fn plan(&self, blood_type: BloodType, amount: u32) -> Result<Vec<LotAllocation>, LedgerError> {
        let mut remaining = amount;
        let mut allocations = Vec::new();

        for lot in self.lots(blood_type) {
            if remaining == 0 {
                break;
            }
            let taken = lot.units.min(remaining);
            allocations.push(LotAllocation {
                lot_id: lot.id,
                units: taken,
                depleted: taken == lot.units,
            });
            remaining -= taken;
        }

        if remaining > 0 {
            error!(%blood_type, shortfall = remaining, "lots exhausted during allocation");
            return Err(LedgerError::InternalInvariantViolation {
                blood_type,
                shortfall: u64::from(remaining),
            });
        }
        Ok(allocations)
    }

    fn apply(&mut self, blood_type: BloodType, allocations: &[LotAllocation]) {
        let Some(group) = self.lots.get_mut(&blood_type) else {
            return;
        };
        for allocation in allocations {
            debug!(
                lot_id = %allocation.lot_id,
                units = allocation.units,
                depleted = allocation.depleted,
                "lot allocated"
            );
            if allocation.depleted {
                group.remove(&allocation.lot_id);
            } else if let Some(lot) = group.get_mut(&allocation.lot_id) {
                lot.units -= allocation.units;
            }
        }
        if group.is_empty() {
            self.lots.remove(&blood_type);
        }
        self.assert_invariants();
    }

    /// Lots of `blood_type` in FIFO order.
    pub fn lots(&self, blood_type: BloodType) -> impl Iterator<Item = &Lot> {
        self.lots
            .get(&blood_type)
            .into_iter()
            .flat_map(BTreeMap::values)
    }

    /// Every lot in the store, grouped by blood type.
    pub fn all_lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.values().flat_map(BTreeMap::values)
    }

    /// Looks up a lot by ID. Returns `None` once the lot has been depleted.
    pub fn lot(&self, id: LotId) -> Option<&Lot> {
        self.lots.values().find_map(|group| group.get(&id))
    }

    /// Units on hand per blood type, omitting types with no stock.
    pub fn summary(&self) -> BTreeMap<BloodType, u64> {
        self.lots
            .keys()
            .map(|&blood_type| (blood_type, self.available_units(blood_type)))
            .filter(|(_, units)| *units > 0)
            .collect()
    }
}
