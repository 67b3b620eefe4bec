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

//! # Blood Ledger
//!
//! This library records transfers of blood units from a pooled donor inventory
//! to requesting parties. Each transfer is appended to a hash chain, and the
//! lots that cover it are chosen oldest first.
//!
//! ## Core Components
//!
//! - [`InventoryStore`]: Donor lots per blood type with FIFO consumption
//! - [`LedgerEngine`]: Validates, allocates, and records transfers
//! - [`LedgerRecord`]: One hash-linked transfer entry
//! - [`LedgerError`]: Error types for intake, transfer, and verification failures
//!
//! ## Example
//!
//! ```
//! use blood_ledger::{BloodType, InventoryStore, LedgerEngine, GENESIS_HASH};
//! use chrono::Utc;
//!
//! let engine = LedgerEngine::new(InventoryStore::new());
//! engine.add_lot(BloodType::OPositive, 60).unwrap();
//!
//! let record = engine
//!     .request_transfer("HospitalX", BloodType::OPositive, 60, Utc::now())
//!     .unwrap();
//! assert_eq!(record.previous_hash, GENESIS_HASH);
//! assert_eq!(engine.available_units(BloodType::OPositive), 0);
//! assert!(engine.verify_chain().is_valid());
//! ```
//!
//! ## Thread Safety
//!
//! The engine serializes all mutations behind one lock and may be shared
//! across threads with [`std::sync::Arc`].

mod base;
pub mod chain;
mod config;
mod engine;
pub mod error;
mod inventory;
mod lot;
mod record;

pub use base::{BloodType, LotId, Sequence};
pub use chain::{ChainFault, ChainVerification};
pub use config::LedgerConfig;
pub use engine::LedgerEngine;
pub use error::LedgerError;
pub use inventory::InventoryStore;
pub use lot::{Donation, Donor, Lot, LotAllocation};
pub use record::{GENESIS_HASH, HashEncoding, LedgerRecord, canonical_timestamp};
