//! Unit tests for the escalation ledger

use alloy_primitives::{Address, Bytes, U256};
use chrono::{Duration, Utc};
use guarded_wallet_core::{EntryStatus, PausedTransactionLedger, PendingTransaction};

fn tx(target: u8, amount: u8) -> PendingTransaction {
    PendingTransaction {
        target: Address::repeat_byte(target),
        value: U256::from(amount),
        payload: Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb, amount]),
    }
}

#[test]
fn test_sequential_nonces() {
    let mut ledger = PausedTransactionLedger::new();
    let now = Utc::now();

    for expected in 0..5u64 {
        let nonce = ledger.reserve_nonce().unwrap();
        assert_eq!(nonce, expected);
        ledger.insert(nonce, tx(1, expected as u8), now);
    }

    assert_eq!(ledger.len(), 5);
    assert_eq!(ledger.get(3), tx(1, 3));
}

#[test]
fn test_absent_slot_is_empty_sentinel() {
    let mut ledger = PausedTransactionLedger::new();
    ledger.insert(0, tx(1, 1), Utc::now());

    let absent = ledger.get(1);
    assert!(absent.is_empty());
    assert_eq!(absent.target, Address::ZERO);
    assert_eq!(absent.value, U256::ZERO);
}

#[test]
fn test_pending_iterates_in_escalation_order() {
    let mut ledger = PausedTransactionLedger::new();
    let now = Utc::now();
    for nonce in 0..4 {
        ledger.insert(nonce, tx(nonce as u8, 0), now);
    }
    ledger.record_approval(1, now).unwrap();

    let pending: Vec<u64> = ledger.pending().map(|(nonce, _)| nonce).collect();
    assert_eq!(pending, vec![0, 2, 3]);
}

#[test]
fn test_approval_history() {
    let mut ledger = PausedTransactionLedger::new();
    let created = Utc::now();
    ledger.insert(0, tx(1, 1), created);

    let later = created + Duration::minutes(5);
    ledger.record_approval(0, later).unwrap();

    let entry = ledger.entry(0).unwrap();
    assert_eq!(entry.status, EntryStatus::Approved);
    assert_eq!(entry.created_at, created);
    assert_eq!(entry.last_approved_at, Some(later));
}

#[test]
fn test_expiry_boundary() {
    let mut ledger = PausedTransactionLedger::new();
    let created = Utc::now();
    ledger.insert(0, tx(1, 1), created);
    let entry = ledger.entry(0).unwrap();

    assert!(!entry.is_expired(3_600, created));
    assert!(!entry.is_expired(3_600, created + Duration::hours(1)));
    assert!(entry.is_expired(3_600, created + Duration::hours(1) + Duration::seconds(1)));
    // an unrepresentable TTL never expires
    assert!(!entry.is_expired(u64::MAX, created + Duration::days(365_000)));
}

#[test]
fn test_ledger_serializes() {
    let mut ledger = PausedTransactionLedger::new();
    ledger.insert(0, tx(1, 1), Utc::now());

    let json = serde_json::to_string(&ledger).unwrap();
    let restored: PausedTransactionLedger = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.get(0), ledger.get(0));
    assert_eq!(restored.nonce_counter(), 1);
}
