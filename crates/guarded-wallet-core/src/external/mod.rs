//! External collaborator ports
//!
//! The account never owns pricing, token, exchange, relay or entry point
//! state. It talks to them through the traits below, held as shared handles
//! fixed at construction. In-memory implementations for tests and local
//! simulation live in [`memory`].

use crate::Result;
use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use async_trait::async_trait;

pub mod memory;

pub use memory::{
    ChannelConsumer, MemoryEntryPoint, MemoryExecutor, MemoryPriceFeed, MemoryPriceFeeds,
    MemoryRelayRouter, MemorySwapRouter, MemoryTokens,
};

/// Identifier of a destination execution domain
pub type DomainId = u64;

/// Identifier assigned by the relay to a sent message
pub type MessageId = B256;

/// Outcome of invoking a target: return data, or raw revert data
pub type CallResult = std::result::Result<Bytes, Bytes>;

/// Resolves price feeds for tokens
#[async_trait]
pub trait PriceFeedRegistry: Send + Sync {
    /// Feed pricing `token`, or `None` if no feed is registered
    async fn feed_for(&self, token: Address) -> Option<Arc<dyn PriceFeed>>;
}

/// A single price feed
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Feed identity, used in notices
    fn address(&self) -> Address;

    /// Latest signed answer. May fail if the feed reverts.
    async fn latest_price(&self) -> Result<i128>;

    /// Decimal precision of the answer
    async fn decimals(&self) -> Result<u8>;
}

/// Token contracts
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Decimal precision of `token`; fails if `token` is not a token
    async fn decimals(&self, token: Address) -> Result<u8>;

    /// Set `spender`'s allowance over `owner`'s `token` balance
    async fn approve(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<()>;

    /// Balance of `holder` in `token`
    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256>;
}

/// One-way channel to the off-chain verification service.
///
/// Dispatch only enqueues; the response, if any, is consumed elsewhere.
pub trait OffchainConsumer: Send + Sync {
    /// Enqueue a verification request
    fn request_verification(&self, request: VerificationRequest) -> Result<()>;
}

/// Exchange router
#[async_trait]
pub trait SwapRouter: Send + Sync {
    /// Swap exactly `params.amount_in` of the input token; returns amount out
    async fn swap_exact_input(&self, payer: Address, params: &SwapParams) -> Result<U256>;
}

/// Cross-domain message relay
#[async_trait]
pub trait RelayRouter: Send + Sync {
    /// Relay identity, used as the token spender
    fn address(&self) -> Address;

    /// Native-denominated fee for delivering `envelope` to `destination`
    async fn quote_fee(&self, destination: DomainId, envelope: &RelayEnvelope) -> Result<U256>;

    /// Send `envelope`, paying `fee` in native value
    async fn send(
        &self,
        sender: Address,
        destination: DomainId,
        envelope: &RelayEnvelope,
        fee: U256,
    ) -> Result<MessageId>;
}

/// The transaction-sponsoring entry point's deposit ledger
#[async_trait]
pub trait EntryPoint: Send + Sync {
    /// Entry point identity
    fn address(&self) -> Address;

    /// Credit `amount` of native value to `account`'s deposit
    async fn credit_balance(&self, account: Address, amount: U256) -> Result<()>;

    /// Current deposit of `account`
    async fn balance_of(&self, account: Address) -> Result<U256>;

    /// Withdraw from `account`'s deposit to `recipient`
    async fn withdraw_to(&self, account: Address, recipient: Address, amount: U256)
    -> Result<()>;
}

/// Host runtime that performs the final call to a target
#[async_trait]
pub trait CallExecutor: Send + Sync {
    /// Invoke `target` from `from` with `value` and `payload`
    async fn call(&self, from: Address, target: Address, value: U256, payload: &Bytes)
    -> CallResult;
}

/// Swap parameters for an exact-input single-pool swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapParams {
    /// Asset given up
    pub token_in: Address,
    /// Asset received
    pub token_out: Address,
    /// Pool fee tier in hundredths of a basis point
    pub fee: u32,
    /// Receiver of the output asset; the orchestrator sets this to itself
    pub recipient: Address,
    /// Exact input amount
    pub amount_in: U256,
    /// Minimum acceptable output
    pub amount_out_minimum: U256,
}

impl SwapParams {
    /// Create swap params with no slippage bound
    pub fn new(token_in: Address, token_out: Address, amount_in: U256) -> Self {
        Self {
            token_in,
            token_out,
            fee: 3000,
            recipient: Address::ZERO,
            amount_in,
            amount_out_minimum: U256::ZERO,
        }
    }

    /// Set the pool fee tier
    pub fn with_fee(mut self, fee: u32) -> Self {
        self.fee = fee;
        self
    }

    /// Set the minimum acceptable output
    pub fn with_min_out(mut self, amount: U256) -> Self {
        self.amount_out_minimum = amount;
        self
    }
}

/// Token amount carried by a cross-domain message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token: Address,
    pub amount: U256,
}

/// Cross-domain message envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEnvelope {
    /// Receiver on the destination domain
    pub receiver: Address,
    /// Arbitrary data payload (empty for pure token transfers)
    pub data: Bytes,
    /// Tokens moved with the message
    pub token_amounts: Vec<TokenAmount>,
    /// Asset the fee is paid in; `None` means native value
    pub fee_token: Option<Address>,
}

impl RelayEnvelope {
    /// Envelope moving a single token amount with the fee paid natively
    pub fn token_transfer(receiver: Address, token: Address, amount: U256) -> Self {
        Self {
            receiver,
            data: Bytes::new(),
            token_amounts: vec![TokenAmount { token, amount }],
            fee_token: None,
        }
    }
}

/// Request dispatched to the off-chain verification service on escalation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// Unique request ID
    pub id: String,
    /// Billing subscription of the account
    pub subscription_id: u64,
    /// Escalation nonce the request refers to
    pub nonce: u64,
    /// Stringified arguments: nonce, target, amount, fiat value
    pub args: Vec<String>,
}

impl VerificationRequest {
    /// Create a new verification request
    pub fn new(subscription_id: u64, nonce: u64, args: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subscription_id,
            nonce,
            args,
        }
    }
}

/// Handles to every collaborator the account talks to
#[derive(Clone)]
pub struct Collaborators {
    pub price_feeds: Arc<dyn PriceFeedRegistry>,
    pub tokens: Arc<dyn TokenLedger>,
    pub consumer: Arc<dyn OffchainConsumer>,
    pub swap_router: Arc<dyn SwapRouter>,
    pub relay_router: Arc<dyn RelayRouter>,
    pub entry_point: Arc<dyn EntryPoint>,
    pub executor: Arc<dyn CallExecutor>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("entry_point", &self.entry_point.address())
            .field("relay_router", &self.relay_router.address())
            .finish_non_exhaustive()
    }
}
