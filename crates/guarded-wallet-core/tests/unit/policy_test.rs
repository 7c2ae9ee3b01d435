//! Unit tests for the price-threshold policy
//!
//! These tests verify:
//! - Decimal normalization across token and feed precisions
//! - Ceiling comparison (strictly below executes, at or above escalates)
//! - Feed failure handling in both modes
//! - Rejection of non-positive prices

use alloy_primitives::{Address, U256};
use guarded_wallet_core::calldata::encode_transfer;
use guarded_wallet_core::external::memory::{MemoryPriceFeed, MemoryPriceFeeds, MemoryTokens};
use guarded_wallet_core::policy::{
    FeedFailureMode, PolicyConfig, PolicyDecision, PriceThresholdPolicy, usd_value,
};
use guarded_wallet_core::{Error, TransferRequest};
use std::sync::Arc;

const WETH: Address = Address::repeat_byte(0xee);
const RECIPIENT: Address = Address::repeat_byte(0x99);

/// WETH (18 decimals) priced at `answer` by an 8-decimal feed
fn weth_market(answer: i128) -> (MemoryPriceFeeds, MemoryTokens, Arc<MemoryPriceFeed>) {
    let feed = Arc::new(MemoryPriceFeed::new(Address::repeat_byte(0xf1), 8, answer));
    let feeds = MemoryPriceFeeds::new();
    feeds.register(WETH, Arc::clone(&feed));
    let tokens = MemoryTokens::new();
    tokens.register(WETH, 18);
    (feeds, tokens, feed)
}

fn weth_transfer(wei: U256) -> TransferRequest {
    TransferRequest::new(WETH, U256::ZERO, encode_transfer(RECIPIENT, wei))
}

fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18))
}

// ============================================================================
// Valuation
// ============================================================================

#[test]
fn test_usd_value_eighteen_decimals() {
    // 0.5 ETH at $2,000.00000000
    let half = ether(1) / U256::from(2);
    let value = usd_value(half, U256::from(200_000_000_000u64), 18, 8).unwrap();
    assert_eq!(value, U256::from(1_000));
}

#[test]
fn test_usd_value_zero_decimals() {
    let value = usd_value(U256::from(7), U256::from(3), 0, 0).unwrap();
    assert_eq!(value, U256::from(21));
}

#[test]
fn test_usd_value_truncates_fractional_dollars() {
    // 0.4999.. ETH at $2,000 is $999.99..
    let just_below = ether(1) / U256::from(2) - U256::from(1);
    let value = usd_value(just_below, U256::from(200_000_000_000u64), 18, 8).unwrap();
    assert_eq!(value, U256::from(999));
}

// ============================================================================
// Ceiling
// ============================================================================

#[tokio::test]
async fn test_exact_ceiling_escalates() {
    let (feeds, tokens, _) = weth_market(200_000_000_000);
    let policy = PriceThresholdPolicy::new(PolicyConfig::default());

    let decision = policy
        .evaluate(&weth_transfer(ether(1) / U256::from(2)), &feeds, &tokens)
        .await
        .unwrap();

    assert!(decision.requires_additional_approval());
    let valuation = decision.valuation().unwrap();
    assert_eq!(valuation.token_decimals, 18);
    assert_eq!(valuation.feed_decimals, 8);
    assert_eq!(valuation.usd_value, U256::from(1_000));
}

#[tokio::test]
async fn test_one_wei_below_ceiling_executes() {
    let (feeds, tokens, _) = weth_market(200_000_000_000);
    let policy = PriceThresholdPolicy::new(PolicyConfig::default());

    let amount = ether(1) / U256::from(2) - U256::from(1);
    let decision = policy
        .evaluate(&weth_transfer(amount), &feeds, &tokens)
        .await
        .unwrap();
    assert_eq!(decision, PolicyDecision::Approve);
}

#[tokio::test]
async fn test_custom_ceiling() {
    let (feeds, tokens, _) = weth_market(200_000_000_000);
    let policy =
        PriceThresholdPolicy::new(PolicyConfig::default().with_usd_ceiling(U256::from(10_000)));

    let decision = policy
        .evaluate(&weth_transfer(ether(4)), &feeds, &tokens)
        .await
        .unwrap();
    assert!(decision.is_approved());

    let decision = policy
        .evaluate(&weth_transfer(ether(5)), &feeds, &tokens)
        .await
        .unwrap();
    assert!(decision.requires_additional_approval());
}

#[tokio::test]
async fn test_price_change_is_observed() {
    let (feeds, tokens, feed) = weth_market(100_000_000);
    let policy = PriceThresholdPolicy::new(PolicyConfig::default());
    let request = weth_transfer(ether(1));

    assert!(policy.evaluate(&request, &feeds, &tokens).await.unwrap().is_approved());

    feed.set_answer(100_000_000_000);
    assert!(
        policy
            .evaluate(&request, &feeds, &tokens)
            .await
            .unwrap()
            .requires_additional_approval()
    );
}

// ============================================================================
// Unpriced payloads and feed failures
// ============================================================================

#[tokio::test]
async fn test_unrecognized_selector_never_priced() {
    let (feeds, tokens, feed) = weth_market(200_000_000_000);
    feed.fail();
    let policy = PriceThresholdPolicy::new(
        PolicyConfig::default().with_feed_failure_mode(FeedFailureMode::FailClosed),
    );

    // transferFrom(address,address,uint256)
    let mut payload = vec![0x23, 0xb8, 0x72, 0xdd];
    payload.extend_from_slice(&[0xff; 96]);
    let request = TransferRequest::new(WETH, U256::ZERO, payload);

    let decision = policy.evaluate(&request, &feeds, &tokens).await.unwrap();
    assert_eq!(decision, PolicyDecision::Approve);
}

#[tokio::test]
async fn test_missing_feed_fail_open_reports_token() {
    let (feeds, tokens, _) = weth_market(200_000_000_000);
    feeds.remove(&WETH);
    let policy = PriceThresholdPolicy::new(PolicyConfig::default());

    let decision = policy
        .evaluate(&weth_transfer(ether(1_000_000)), &feeds, &tokens)
        .await
        .unwrap();
    match decision {
        PolicyDecision::ApproveUnpriced { token, .. } => assert_eq!(token, WETH),
        other => panic!("expected unpriced approval, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_feed_fail_closed_escalates() {
    let (feeds, tokens, _) = weth_market(200_000_000_000);
    feeds.remove(&WETH);
    let policy = PriceThresholdPolicy::new(
        PolicyConfig::default().with_feed_failure_mode(FeedFailureMode::FailClosed),
    );

    let decision = policy
        .evaluate(&weth_transfer(U256::from(1)), &feeds, &tokens)
        .await
        .unwrap();
    assert!(decision.requires_additional_approval());
    assert!(decision.valuation().is_none());
}

#[tokio::test]
async fn test_zero_price_rejected() {
    let (feeds, tokens, _) = weth_market(0);
    let policy = PriceThresholdPolicy::new(PolicyConfig::default());

    let err = policy
        .evaluate(&weth_transfer(ether(1)), &feeds, &tokens)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NonPositivePrice { answer: 0, .. }));
}

#[tokio::test]
async fn test_valuation_overflow_is_error() {
    let (feeds, tokens, _) = weth_market(i128::MAX);
    let policy = PriceThresholdPolicy::new(PolicyConfig::default());

    let err = policy
        .evaluate(&weth_transfer(U256::MAX), &feeds, &tokens)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ArithmeticOverflow(_)));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_policy_config_defaults() {
    let config = PolicyConfig::default();
    assert_eq!(config.usd_ceiling, U256::from(1_000));
    assert_eq!(config.feed_failure_mode, FeedFailureMode::FailOpen);
    assert!(!config.replay_protection);
    assert!(config.pending_ttl_secs.is_none());
    assert!(config.enabled);
}

#[test]
fn test_policy_config_json() {
    let config: PolicyConfig =
        serde_json::from_str(r#"{ "feed_failure_mode": "fail_closed", "pending_ttl_secs": 3600 }"#)
            .unwrap();
    assert_eq!(config.feed_failure_mode, FeedFailureMode::FailClosed);
    assert_eq!(config.pending_ttl_secs, Some(3600));
    assert_eq!(config.usd_ceiling, U256::from(1_000));
}
