//! End-to-end swap-then-relay flow

use crate::fixture::{ACCOUNT, ENTRY_POINT, FACTORY, Fixture, USDC, WETH, usdc};
use alloy_primitives::{Address, B256, U256};
use guarded_wallet_core::external::RelayRouter;
use guarded_wallet_core::{AccountEvent, Error, PolicyConfig, SwapParams};

const ARBITRUM: u64 = 4_949_039_107_694_359_620;

/// A pool paying 1 WETH unit per USDC base unit and a relay charging 50
fn market() -> Fixture {
    let f = Fixture::new(PolicyConfig::default());
    f.swap.set_rate(USDC, WETH, 1, 1);
    f.relay.set_fee(ARBITRUM, U256::from(50));
    f
}

#[tokio::test]
async fn test_fee_shortfall_after_swap() {
    let f = market();
    f.account.receive(U256::from(49)).await.unwrap();

    let err = f
        .account
        .swap_and_relay(ENTRY_POINT, SwapParams::new(USDC, WETH, U256::from(1_000)), ARBITRUM)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    match err {
        Error::InsufficientFee { current, required } => {
            assert_eq!(current, U256::from(49));
            assert_eq!(required, U256::from(50));
        }
        other => panic!("expected InsufficientFee, got {:?}", other),
    }

    // the swap already happened and its output stays with the account
    assert_eq!(f.tokens.balance(WETH, ACCOUNT), U256::from(1_000));
    assert_eq!(f.swap.swaps().len(), 1);
    assert!(f.relay.messages().is_empty());
    assert!(f.tokens.approval_log().is_empty());
}

#[tokio::test]
async fn test_relay_with_sufficient_balance() {
    let f = market();
    f.account.receive(U256::from(50)).await.unwrap();

    let transfer = f
        .account
        .swap_and_relay(FACTORY, SwapParams::new(USDC, WETH, U256::from(1_000)), ARBITRUM)
        .await
        .unwrap();

    assert_ne!(transfer.message_id, B256::ZERO);
    assert_eq!(transfer.destination, ARBITRUM);
    assert_eq!(transfer.token, WETH);
    assert_eq!(transfer.amount, U256::from(1_000));
    assert_eq!(transfer.fee, U256::from(50));
    assert_eq!(f.account.native_balance().await, U256::ZERO);

    // allowance granted to the relay equals the swap output exactly
    let approvals = f.tokens.approval_log();
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].owner, ACCOUNT);
    assert_eq!(approvals[0].spender, f.relay.address());
    assert_eq!(approvals[0].amount, U256::from(1_000));

    // the relay pulled the output and recorded the envelope
    let messages = f.relay.messages();
    assert_eq!(messages[0].id, transfer.message_id);
    assert_eq!(messages[0].envelope.receiver, ACCOUNT);
    assert_eq!(messages[0].envelope.fee_token, None);
    assert_eq!(f.tokens.balance(WETH, ACCOUNT), U256::ZERO);

    let events = f.account.events().await;
    assert!(events.iter().any(|e| matches!(
        e,
        AccountEvent::TransferRelayed { message_id, .. } if *message_id == transfer.message_id
    )));
}

#[tokio::test]
async fn test_swap_recipient_forced_to_account() {
    let f = market();
    f.account.receive(U256::from(100)).await.unwrap();

    let mut params = SwapParams::new(USDC, WETH, usdc(1)).with_fee(500);
    params.recipient = Address::repeat_byte(0x66);
    f.account
        .swap_and_relay(FACTORY, params, ARBITRUM)
        .await
        .unwrap();

    let swap = &f.swap.swaps()[0];
    assert_eq!(swap.recipient, ACCOUNT);
    assert_eq!(swap.fee, 500);
    assert_eq!(f.tokens.balance(WETH, Address::repeat_byte(0x66)), U256::ZERO);
}

#[tokio::test]
async fn test_slippage_bound_aborts_before_quote() {
    let f = market();
    f.account.receive(U256::from(100)).await.unwrap();

    let params = SwapParams::new(USDC, WETH, U256::from(1_000)).with_min_out(U256::from(1_001));
    let err = f
        .account
        .swap_and_relay(FACTORY, params, ARBITRUM)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Swap(_)));
    assert_eq!(f.account.native_balance().await, U256::from(100));
    assert_eq!(f.tokens.balance(USDC, ACCOUNT), usdc(1_000_000));
}

#[tokio::test]
async fn test_unsupported_destination() {
    let f = market();
    f.account.receive(U256::from(100)).await.unwrap();

    let err = f
        .account
        .swap_and_relay(FACTORY, SwapParams::new(USDC, WETH, U256::from(10)), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Relay(_)));
    assert!(err.is_retryable());
}
