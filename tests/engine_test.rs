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

//! Engine public API integration tests.

use blood_ledger::{
    BloodType, ChainFault, ChainVerification, GENESIS_HASH, HashEncoding, InventoryStore,
    LedgerConfig, LedgerEngine, LedgerError, LedgerRecord, LotId, Sequence,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn engine_with(lots: &[(BloodType, u32)]) -> LedgerEngine {
    let mut store = InventoryStore::new();
    for &(blood_type, units) in lots {
        store.add_lot(blood_type, units).unwrap();
    }
    LedgerEngine::new(store)
}

#[test]
fn transfer_consumes_lots_fifo() {
    let engine = engine_with(&[(BloodType::OPositive, 5), (BloodType::OPositive, 10)]);

    engine
        .request_transfer("HospitalX", BloodType::OPositive, 7, t(0))
        .unwrap();

    assert!(engine.lot(LotId(1)).is_none());
    assert_eq!(engine.lot(LotId(2)).unwrap().units(), 8);

    engine
        .request_transfer("HospitalX", BloodType::OPositive, 8, t(1))
        .unwrap();

    assert!(engine.lot(LotId(2)).is_none());
    assert_eq!(engine.available_units(BloodType::OPositive), 0);
    assert_eq!(engine.len(), 2);
}

#[test]
fn request_exceeding_inventory_is_all_or_nothing() {
    let engine = engine_with(&[(BloodType::OPositive, 5), (BloodType::OPositive, 10)]);

    let result = engine.request_transfer("HospitalX", BloodType::OPositive, 20, t(0));
    assert_eq!(
        result,
        Err(LedgerError::InsufficientInventory {
            blood_type: BloodType::OPositive,
            requested: 20,
            available: 15,
        })
    );

    // Lots and chain untouched
    assert_eq!(engine.lot(LotId(1)).unwrap().units(), 5);
    assert_eq!(engine.lot(LotId(2)).unwrap().units(), 10);
    assert!(engine.is_empty());
}

#[test]
fn scenario_full_depletion_then_rejection() {
    let engine = engine_with(&[(BloodType::OPositive, 60)]);

    let record = engine
        .request_transfer("HospitalX", BloodType::OPositive, 60, t(0))
        .unwrap();
    assert_eq!(record.sequence, Sequence(1));
    assert_eq!(record.previous_hash, GENESIS_HASH);
    assert!(engine.lot(LotId(1)).is_none());
    assert_eq!(engine.len(), 1);

    let result = engine.request_transfer("HospitalY", BloodType::OPositive, 1, t(1));
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientInventory { available: 0, .. })
    ));
    assert_eq!(engine.len(), 1);
}

#[test]
fn records_link_to_predecessor() {
    let engine = engine_with(&[(BloodType::APositive, 10), (BloodType::BNegative, 10)]);

    let first = engine
        .request_transfer("HospitalX", BloodType::APositive, 3, t(0))
        .unwrap();
    let second = engine
        .request_transfer("HospitalY", BloodType::BNegative, 4, t(1))
        .unwrap();
    let third = engine
        .request_transfer("HospitalX", BloodType::APositive, 2, t(1))
        .unwrap();

    assert_eq!(first.previous_hash, GENESIS_HASH);
    assert_eq!(second.previous_hash, first.record_hash);
    assert_eq!(third.previous_hash, second.record_hash);
    assert_eq!(
        [first.sequence, second.sequence, third.sequence],
        [Sequence(1), Sequence(2), Sequence(3)]
    );
    assert_eq!(engine.history(), vec![first, second, third]);
}

#[test]
fn returned_record_matches_request() {
    let engine = engine_with(&[(BloodType::AbNegative, 4)]);
    let record = engine
        .request_transfer("St. Mary's", BloodType::AbNegative, 4, t(5))
        .unwrap();

    assert_eq!(record.recipient, "St. Mary's");
    assert_eq!(record.blood_type, BloodType::AbNegative);
    assert_eq!(record.units, 4);
    assert_eq!(record.timestamp, t(5));
    assert_eq!(record.record_hash, record.expected_hash(HashEncoding::Concatenated));
}

#[test]
fn zero_units_rejected_without_mutation() {
    let engine = engine_with(&[(BloodType::ONegative, 3)]);

    let result = engine.request_transfer("HospitalX", BloodType::ONegative, 0, t(0));
    assert_eq!(result, Err(LedgerError::InvalidQuantity));
    assert_eq!(engine.available_units(BloodType::ONegative), 3);
    assert!(engine.is_empty());
}

#[test]
fn unknown_blood_type_rejected_at_parse() {
    let result = "Z+".parse::<BloodType>();
    assert_eq!(result, Err(LedgerError::UnknownBloodType("Z+".to_string())));
}

#[test]
fn timestamp_regression_rejected_without_mutation() {
    let engine = engine_with(&[(BloodType::BPositive, 10)]);
    engine
        .request_transfer("HospitalX", BloodType::BPositive, 1, t(10))
        .unwrap();

    let result = engine.request_transfer("HospitalX", BloodType::BPositive, 1, t(9));
    assert_eq!(result, Err(LedgerError::TimestampRegression));
    assert_eq!(engine.available_units(BloodType::BPositive), 9);
    assert_eq!(engine.len(), 1);

    // Equal timestamps are allowed
    engine
        .request_transfer("HospitalX", BloodType::BPositive, 1, t(10))
        .unwrap();
    assert_eq!(engine.last_timestamp(), Some(t(10)));
}

#[test]
fn other_blood_types_are_untouched() {
    let engine = engine_with(&[
        (BloodType::OPositive, 5),
        (BloodType::ONegative, 5),
        (BloodType::OPositive, 5),
    ]);

    engine
        .request_transfer("HospitalX", BloodType::OPositive, 7, t(0))
        .unwrap();

    assert_eq!(engine.lot(LotId(2)).unwrap().units(), 5);
    assert!(engine.lot(LotId(1)).is_none());
    assert_eq!(engine.lot(LotId(3)).unwrap().units(), 3);
}

#[test]
fn verify_chain_is_idempotent() {
    let engine = engine_with(&[(BloodType::APositive, 30)]);
    for i in 0..5 {
        engine
            .request_transfer(format!("Hospital{i}"), BloodType::APositive, 3, t(i))
            .unwrap();
    }

    let first = engine.verify_chain();
    assert_eq!(first, ChainVerification::Valid { records: 5 });
    for _ in 0..3 {
        assert_eq!(engine.verify_chain(), first);
    }
}

#[test]
fn tampered_history_fails_verification() {
    let engine = engine_with(&[(BloodType::APositive, 30)]);
    for i in 0..4 {
        engine
            .request_transfer("HospitalX", BloodType::APositive, 2, t(i))
            .unwrap();
    }

    let (lots, mut records) = engine.snapshot();
    records[1].recipient = "HospitalZ".to_string();

    let restored = LedgerEngine::from_parts(
        InventoryStore::from_lots(lots),
        records,
        LedgerConfig::default(),
    );
    let verification = restored.verify_chain();
    assert!(!verification.is_valid());
    assert_eq!(verification.offending_sequence(), Some(Sequence(2)));
    assert_eq!(
        verification.into_result(),
        Err(LedgerError::ChainIntegrity {
            sequence: Sequence(2),
            fault: ChainFault::HashMismatch,
        })
    );
}

#[test]
fn rehashed_record_breaks_following_link() {
    let engine = engine_with(&[(BloodType::APositive, 30)]);
    for i in 0..3 {
        engine
            .request_transfer("HospitalX", BloodType::APositive, 2, t(i))
            .unwrap();
    }

    let (lots, mut records) = engine.snapshot();
    records[0].units = 20;
    records[0].record_hash = records[0].expected_hash(HashEncoding::Concatenated);

    let restored = LedgerEngine::from_parts(
        InventoryStore::from_lots(lots),
        records,
        LedgerConfig::default(),
    );
    assert_eq!(
        restored.verify_chain(),
        ChainVerification::Broken {
            sequence: Sequence(2),
            fault: ChainFault::BrokenLink,
        }
    );
}

#[test]
fn restored_engine_continues_chain() {
    let engine = engine_with(&[(BloodType::ONegative, 10)]);
    engine
        .request_transfer("HospitalX", BloodType::ONegative, 4, t(0))
        .unwrap();

    let (lots, records) = engine.snapshot();
    let restored = LedgerEngine::from_parts(
        InventoryStore::from_lots(lots),
        records,
        LedgerConfig::default(),
    );

    let next = restored
        .request_transfer("HospitalY", BloodType::ONegative, 6, t(1))
        .unwrap();
    assert_eq!(next.sequence, Sequence(2));
    assert_eq!(next.previous_hash, engine.history()[0].record_hash);
    assert!(restored.verify_chain().is_valid());
    assert_eq!(restored.available_units(BloodType::ONegative), 0);
}

#[test]
fn length_prefixed_engine_verifies_its_own_chain() {
    let config = LedgerConfig::default().with_hash_encoding(HashEncoding::LengthPrefixed);
    let mut store = InventoryStore::new();
    store.add_lot(BloodType::BPositive, 10).unwrap();
    let engine = LedgerEngine::with_config(store, config);

    let record = engine
        .request_transfer("HospitalX", BloodType::BPositive, 5, t(0))
        .unwrap();
    assert_eq!(record.record_hash, record.expected_hash(HashEncoding::LengthPrefixed));
    assert!(engine.verify_chain().is_valid());

    // The same records do not verify under the other encoding
    let (lots, records) = engine.snapshot();
    let reread = LedgerEngine::from_parts(
        InventoryStore::from_lots(lots),
        records,
        LedgerConfig::default(),
    );
    assert_eq!(
        reread.verify_chain().offending_sequence(),
        Some(Sequence(1))
    );
}

#[test]
fn history_is_a_snapshot() {
    let engine = engine_with(&[(BloodType::APositive, 10)]);
    engine
        .request_transfer("HospitalX", BloodType::APositive, 1, t(0))
        .unwrap();

    let before = engine.history();
    engine
        .request_transfer("HospitalX", BloodType::APositive, 1, t(1))
        .unwrap();

    assert_eq!(before.len(), 1);
    assert_eq!(engine.history().len(), 2);
    assert_eq!(engine.history()[0], before[0]);
}

#[test]
fn inventory_summary_tracks_engine_mutations() {
    let engine = LedgerEngine::default();
    engine.add_lot(BloodType::APositive, 4).unwrap();
    engine.add_lot(BloodType::ANegative, 2).unwrap();
    engine
        .request_transfer("HospitalX", BloodType::ANegative, 2, t(0))
        .unwrap();

    let summary = engine.inventory_summary();
    assert_eq!(summary.get(&BloodType::APositive), Some(&4));
    assert_eq!(summary.get(&BloodType::ANegative), None);
}

#[test]
fn whole_second_record_from_prior_ledger_verifies() {
    // sha256("HospitalXO+602025-01-01 08:30:000")
    let record = LedgerRecord {
        sequence: Sequence(1),
        recipient: "HospitalX".to_string(),
        blood_type: BloodType::OPositive,
        units: 60,
        timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 8, 30, 0).unwrap(),
        record_hash: "2b5904a31e1ce39522353742e95013e39abd62a5b6681ce0d54e7a2962d1e145"
            .to_string(),
        previous_hash: GENESIS_HASH.to_string(),
    };

    let restored =
        LedgerEngine::from_parts(InventoryStore::new(), vec![record], LedgerConfig::default());
    assert_eq!(restored.verify_chain(), ChainVerification::Valid { records: 1 });
}

#[test]
fn not_before_last_raises_stale_timestamp() {
    let engine = engine_with(&[(BloodType::BPositive, 10)]);
    engine
        .request_transfer("HospitalX", BloodType::BPositive, 1, t(10))
        .unwrap();

    let record = engine
        .request_transfer_not_before_last("HospitalY", BloodType::BPositive, 1, t(3))
        .unwrap();
    assert_eq!(record.timestamp, t(10));

    let later = engine
        .request_transfer_not_before_last("HospitalY", BloodType::BPositive, 1, t(12))
        .unwrap();
    assert_eq!(later.timestamp, t(12));
    assert!(engine.verify_chain().is_valid());
}

#[test]
fn not_before_last_still_rejects_insufficient_inventory() {
    let engine = engine_with(&[(BloodType::BPositive, 1)]);
    let result =
        engine.request_transfer_not_before_last("HospitalX", BloodType::BPositive, 2, t(0));
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientInventory { available: 1, .. })
    ));
    assert!(engine.is_empty());
}
