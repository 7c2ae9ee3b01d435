//! Fuzz tests for the price-threshold policy
//!
//! Property-based testing of valuation arithmetic and of which payloads the
//! policy is willing to price at all.

use alloy_primitives::{Address, U256};
use guarded_wallet_core::TransferRequest;
use guarded_wallet_core::calldata::encode_transfer;
use guarded_wallet_core::external::memory::{MemoryPriceFeed, MemoryPriceFeeds, MemoryTokens};
use guarded_wallet_core::policy::{PolicyConfig, PriceThresholdPolicy, usd_value};
use proptest::prelude::*;
use std::sync::Arc;

const TOKEN: Address = Address::repeat_byte(0x0c);

// ============================================================================
// Strategies for generating test data
// ============================================================================

/// Four-byte selectors other than `transfer` and `approve`
fn foreign_selector_strategy() -> impl Strategy<Value = [u8; 4]> {
    any::<[u8; 4]>().prop_filter("priced selector", |s| {
        *s != [0xa9, 0x05, 0x9c, 0xbb] && *s != [0x09, 0x5e, 0xa7, 0xb3]
    })
}

fn payload_tail_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..200)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// Token with 6 decimals priced at $1,000,000 by an 8-decimal feed
fn expensive_market() -> (MemoryPriceFeeds, MemoryTokens) {
    let feeds = MemoryPriceFeeds::new();
    feeds.register(
        TOKEN,
        Arc::new(MemoryPriceFeed::new(
            Address::repeat_byte(0xf0),
            8,
            100_000_000_000_000,
        )),
    );
    let tokens = MemoryTokens::new();
    tokens.register(TOKEN, 6);
    (feeds, tokens)
}

// ============================================================================
// Selector filtering
// ============================================================================

proptest! {
    /// Payloads that are not token transfers or approvals never escalate
    #[test]
    fn unpriced_selectors_never_escalate(
        selector in foreign_selector_strategy(),
        tail in payload_tail_strategy(),
        value in any::<u128>(),
    ) {
        let (feeds, tokens) = expensive_market();
        let policy = PriceThresholdPolicy::new(PolicyConfig::default().with_usd_ceiling(U256::from(1)));

        let mut payload = selector.to_vec();
        payload.extend_from_slice(&tail);
        let request = TransferRequest::new(TOKEN, U256::from(value), payload);

        let decision = runtime()
            .block_on(policy.evaluate(&request, &feeds, &tokens))
            .unwrap();
        prop_assert!(decision.is_approved());
    }

    /// Payloads shorter than a selector are never priced
    #[test]
    fn short_payloads_never_escalate(payload in prop::collection::vec(any::<u8>(), 0..4)) {
        let (feeds, tokens) = expensive_market();
        let policy = PriceThresholdPolicy::new(PolicyConfig::default().with_usd_ceiling(U256::from(1)));
        let request = TransferRequest::new(TOKEN, U256::ZERO, payload);

        let decision = runtime()
            .block_on(policy.evaluate(&request, &feeds, &tokens))
            .unwrap();
        prop_assert!(decision.is_approved());
    }

    /// Escalation happens exactly when the valuation reaches the ceiling
    #[test]
    fn transfer_escalates_iff_at_or_above_ceiling(
        amount in 0u64..10_000_000_000,
        ceiling in 0u64..100_000_000_000,
    ) {
        let (feeds, tokens) = expensive_market();
        let policy = PriceThresholdPolicy::new(
            PolicyConfig::default().with_usd_ceiling(U256::from(ceiling)),
        );
        let request = TransferRequest::new(
            TOKEN,
            U256::ZERO,
            encode_transfer(Address::repeat_byte(0x99), U256::from(amount)),
        );

        let decision = runtime()
            .block_on(policy.evaluate(&request, &feeds, &tokens))
            .unwrap();

        // $1,000,000 per whole token, 6 decimals: one base unit is $1
        let usd = u128::from(amount);
        prop_assert_eq!(decision.requires_additional_approval(), usd >= u128::from(ceiling));
    }
}

// ============================================================================
// Valuation arithmetic
// ============================================================================

proptest! {
    /// Matches a plain u128 computation when nothing can overflow
    #[test]
    fn usd_value_matches_u128(
        amount in 0u64..u64::MAX,
        price in 1u32..u32::MAX,
        token_decimals in 0u8..=18,
        feed_decimals in 0u8..=18,
    ) {
        let expected = (u128::from(amount) * u128::from(price))
            / 10u128.pow(u32::from(token_decimals) + u32::from(feed_decimals));

        let value = usd_value(
            U256::from(amount),
            U256::from(price),
            token_decimals,
            feed_decimals,
        )
        .unwrap();
        prop_assert_eq!(value, U256::from(expected));
    }

    /// Larger amounts never value lower
    #[test]
    fn usd_value_monotonic_in_amount(
        a in any::<u128>(),
        b in any::<u128>(),
        price in 1u64..u64::MAX,
        decimals in 0u8..=36,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let low = usd_value(U256::from(lo), U256::from(price), decimals, 8).unwrap();
        let high = usd_value(U256::from(hi), U256::from(price), decimals, 8).unwrap();
        prop_assert!(low <= high);
    }

    /// Overflow is reported, never wrapped
    #[test]
    fn usd_value_overflow_is_an_error(price in 2u64..u64::MAX) {
        let result = usd_value(U256::MAX, U256::from(price), 18, 8);
        prop_assert!(result.is_err());
    }

    /// Truncation drops at most one fiat unit relative to exact division
    #[test]
    fn usd_value_truncates_toward_zero(
        amount in 0u64..u64::MAX,
        price in 1u64..1_000_000_000_000,
    ) {
        let value = usd_value(U256::from(amount), U256::from(price), 6, 8).unwrap();
        let scale = U256::from(100_000_000_000_000u64);
        let product = U256::from(amount) * U256::from(price);
        prop_assert!(value * scale <= product);
        prop_assert!(product < (value + U256::from(1)) * scale);
    }
}
