//! Account invariants
//!
//! Every escalation consumes exactly one nonce and leaves its transaction
//! retrievable under that nonce; nothing else touches the ledger.

use crate::fixture::{BOB, ENTRY_POINT, FACTORY, Fixture, USDC, guardian_sign, usdc};
use alloy_primitives::{Address, U256};
use guarded_wallet_core::calldata::{encode_approve, encode_transfer};
use guarded_wallet_core::{
    Error, ExecutionOutcome, PendingTransaction, PolicyConfig, TransferRequest,
};
use proptest::prelude::*;

fn pay_bob(whole: u64) -> TransferRequest {
    TransferRequest::new(USDC, U256::ZERO, encode_transfer(BOB, usdc(whole)))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// Invariant: above the ceiling the nonce advances by exactly one per request
#[tokio::test]
async fn invariant_escalation_consumes_one_nonce() {
    let f = Fixture::new(PolicyConfig::default());

    for expected in 0..5u64 {
        let before = f.account.next_nonce().await;
        let outcome = f.account.execute(ENTRY_POINT, pay_bob(1_000 + expected)).await.unwrap();

        assert_eq!(outcome, ExecutionOutcome::Escalated { nonce: expected });
        assert_eq!(f.account.next_nonce().await, before + 1);
        assert_eq!(
            f.account.pending(expected).await,
            PendingTransaction::from(pay_bob(1_000 + expected))
        );
    }
}

/// Invariant: below the ceiling the ledger is untouched
#[tokio::test]
async fn invariant_small_transfers_leave_ledger_alone() {
    let f = Fixture::new(PolicyConfig::default());

    for whole in [0, 1, 500, 999] {
        let outcome = f.account.execute(ENTRY_POINT, pay_bob(whole)).await.unwrap();
        assert!(!outcome.is_escalated());
    }

    assert_eq!(f.account.next_nonce().await, 0);
    assert!(f.account.pending(0).await.is_empty());
    assert!(f.account.ledger_entry(0).await.is_none());
}

/// Invariant: approvals are priced the same way as transfers
#[tokio::test]
async fn invariant_approve_payloads_escalate_like_transfers() {
    let f = Fixture::new(PolicyConfig::default());
    let request = TransferRequest::new(USDC, U256::ZERO, encode_approve(BOB, usdc(5_000)));

    let outcome = f.account.execute(FACTORY, request.clone()).await.unwrap();

    assert_eq!(outcome.nonce(), Some(0));
    assert_eq!(f.tokens.allowance(USDC, f.account.address(), BOB), U256::ZERO);
    assert_eq!(f.account.pending(0).await, PendingTransaction::from(request));
}

/// Invariant: failed approvals leave the entry untouched
#[tokio::test]
async fn invariant_rejected_approval_changes_nothing() {
    let f = Fixture::new(PolicyConfig::default());
    let nonce = f.account.execute(ENTRY_POINT, pay_bob(2_000)).await.unwrap().nonce().unwrap();
    let before = f.account.ledger_entry(nonce).await.unwrap();

    // owner key is not the guardian
    let sig = guardian_sign(&f.owner_key, &f.account.pending(nonce).await);
    let err = f.account.approve(ENTRY_POINT, nonce, &sig).await.unwrap_err();

    assert!(matches!(err, Error::GuardianMismatch { .. }));
    assert_eq!(f.account.ledger_entry(nonce).await.unwrap(), before);
    assert_eq!(f.tokens.balance(USDC, BOB), U256::ZERO);
    assert_eq!(f.account.next_nonce().await, nonce + 1);
}

/// Invariant: unprivileged callers never reach the ledger
#[tokio::test]
async fn invariant_unauthorized_callers_rejected() {
    let f = Fixture::new(PolicyConfig::default());
    let stranger = Address::repeat_byte(0x66);

    let err = f.account.execute(stranger, pay_bob(5_000)).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(addr) if addr == stranger));
    assert_eq!(f.account.next_nonce().await, 0);
    assert_eq!(f.executor.call_count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Invariant: for any mix of amounts, nonces equal the escalation count
    /// and owner and guardian never change
    #[test]
    fn invariant_nonce_matches_escalations(amounts in prop::collection::vec(0u64..3_000, 1..12)) {
        let f = Fixture::new(PolicyConfig::default());
        let owner = f.account.owner();
        let guardian = f.account.guardian();

        let rt = runtime();
        let mut escalated = Vec::new();
        for whole in &amounts {
            let outcome = rt.block_on(f.account.execute(ENTRY_POINT, pay_bob(*whole))).unwrap();
            prop_assert_eq!(outcome.is_escalated(), *whole >= 1_000);
            if let Some(nonce) = outcome.nonce() {
                prop_assert_eq!(nonce, escalated.len() as u64);
                escalated.push(*whole);
            }
        }

        prop_assert_eq!(rt.block_on(f.account.next_nonce()), escalated.len() as u64);
        for (nonce, whole) in escalated.iter().enumerate() {
            let stored = rt.block_on(f.account.pending(nonce as u64));
            prop_assert_eq!(stored, PendingTransaction::from(pay_bob(*whole)));
        }

        let executed: u64 = amounts.iter().filter(|w| **w < 1_000).sum();
        prop_assert_eq!(f.tokens.balance(USDC, BOB), usdc(executed));
        prop_assert_eq!(f.account.owner(), owner);
        prop_assert_eq!(f.account.guardian(), guardian);
    }
}
