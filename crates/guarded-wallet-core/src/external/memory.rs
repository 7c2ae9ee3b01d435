//! In-memory collaborators for testing and local simulation
//!
//! Each type here stands in for one external system. They keep their state
//! behind `parking_lot` locks and share a single [`MemoryTokens`] ledger so
//! that swaps, relays and forwarded token calls all see the same balances.

use super::{
    CallExecutor, CallResult, DomainId, EntryPoint, MessageId, OffchainConsumer, PriceFeed,
    PriceFeedRegistry, RelayEnvelope, RelayRouter, SwapParams, SwapRouter, TokenLedger,
    VerificationRequest, async_trait,
};
use crate::calldata::{self, Operation};
use crate::types::{address_word, keccak256_hash, u256_word};
use crate::{Error, Result};
use alloy_primitives::{Address, B256, Bytes, U256};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

// ============================================================================
// Price feeds
// ============================================================================

/// A price feed whose answer can be set or made to revert
#[derive(Debug)]
pub struct MemoryPriceFeed {
    address: Address,
    decimals: u8,
    /// `None` makes `latest_price` fail
    answer: RwLock<Option<i128>>,
}

impl MemoryPriceFeed {
    /// Create a feed reporting `answer` with `decimals` precision
    pub fn new(address: Address, decimals: u8, answer: i128) -> Self {
        Self {
            address,
            decimals,
            answer: RwLock::new(Some(answer)),
        }
    }

    /// Change the reported answer
    pub fn set_answer(&self, answer: i128) {
        *self.answer.write() = Some(answer);
    }

    /// Make subsequent price queries fail
    pub fn fail(&self) {
        *self.answer.write() = None;
    }
}

#[async_trait]
impl PriceFeed for MemoryPriceFeed {
    fn address(&self) -> Address {
        self.address
    }

    async fn latest_price(&self) -> Result<i128> {
        self.answer
            .read()
            .ok_or_else(|| Error::FeedUnavailable(format!("feed {} reverted", self.address)))
    }

    async fn decimals(&self) -> Result<u8> {
        Ok(self.decimals)
    }
}

/// Token -> feed registry
#[derive(Debug, Default)]
pub struct MemoryPriceFeeds {
    feeds: RwLock<HashMap<Address, Arc<MemoryPriceFeed>>>,
}

impl MemoryPriceFeeds {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `feed` as the price source for `token`
    pub fn register(&self, token: Address, feed: Arc<MemoryPriceFeed>) {
        self.feeds.write().insert(token, feed);
    }

    /// Remove the feed for `token`
    pub fn remove(&self, token: &Address) {
        self.feeds.write().remove(token);
    }
}

#[async_trait]
impl PriceFeedRegistry for MemoryPriceFeeds {
    async fn feed_for(&self, token: Address) -> Option<Arc<dyn PriceFeed>> {
        self.feeds
            .read()
            .get(&token)
            .map(|feed| Arc::clone(feed) as Arc<dyn PriceFeed>)
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// One `approve` call seen by the token ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRecord {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub amount: U256,
}

#[derive(Debug, Default)]
struct TokenState {
    decimals: HashMap<Address, u8>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    approvals: Vec<ApprovalRecord>,
}

/// Shared ERC-20 style ledger for every registered token
#[derive(Debug, Default)]
pub struct MemoryTokens {
    state: RwLock<TokenState>,
}

impl MemoryTokens {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token with its decimal precision
    pub fn register(&self, token: Address, decimals: u8) {
        self.state.write().decimals.insert(token, decimals);
    }

    /// Whether `token` is registered
    pub fn is_token(&self, token: &Address) -> bool {
        self.state.read().decimals.contains_key(token)
    }

    /// Credit `amount` of `token` to `holder`
    pub fn mint(&self, token: Address, holder: Address, amount: U256) -> Result<()> {
        let mut state = self.state.write();
        ensure_registered(&state, token)?;
        let balance = state.balances.entry((token, holder)).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(Error::ArithmeticOverflow("mint"))?;
        Ok(())
    }

    /// Balance of `holder` in `token`
    pub fn balance(&self, token: Address, holder: Address) -> U256 {
        self.state
            .read()
            .balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    /// Remaining allowance of `spender` over `owner`'s `token`
    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.state
            .read()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    /// Every approval granted so far, in order
    pub fn approval_log(&self) -> Vec<ApprovalRecord> {
        self.state.read().approvals.clone()
    }

    /// Move `amount` of `token` from `from` to `to`
    pub fn transfer(&self, token: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        let mut state = self.state.write();
        move_balance(&mut state, token, from, to, amount)
    }

    /// Move `amount` of `token` from `from` to `to` on `spender`'s allowance
    pub fn transfer_from(
        &self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let mut state = self.state.write();
        let allowance = state
            .allowances
            .get(&(token, from, spender))
            .copied()
            .unwrap_or_default();
        if allowance < amount {
            return Err(Error::Token(format!(
                "allowance {} below {} for spender {}",
                allowance, amount, spender
            )));
        }
        move_balance(&mut state, token, from, to, amount)?;
        state
            .allowances
            .insert((token, from, spender), allowance - amount);
        Ok(())
    }

    /// Set an allowance and record it
    pub fn set_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<()> {
        let mut state = self.state.write();
        ensure_registered(&state, token)?;
        state.allowances.insert((token, owner, spender), amount);
        state.approvals.push(ApprovalRecord {
            token,
            owner,
            spender,
            amount,
        });
        Ok(())
    }
}

fn ensure_registered(state: &TokenState, token: Address) -> Result<()> {
    if state.decimals.contains_key(&token) {
        Ok(())
    } else {
        Err(Error::InvalidToken(format!("{} is not a token", token)))
    }
}

fn move_balance(
    state: &mut TokenState,
    token: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<()> {
    ensure_registered(state, token)?;
    let from_balance = state
        .balances
        .get(&(token, from))
        .copied()
        .unwrap_or_default();
    if from_balance < amount {
        return Err(Error::Token(format!(
            "balance {} of {} below {}",
            from_balance, from, amount
        )));
    }
    state.balances.insert((token, from), from_balance - amount);
    let to_balance = state.balances.entry((token, to)).or_default();
    *to_balance = to_balance
        .checked_add(amount)
        .ok_or(Error::ArithmeticOverflow("token transfer"))?;
    Ok(())
}

#[async_trait]
impl TokenLedger for MemoryTokens {
    async fn decimals(&self, token: Address) -> Result<u8> {
        self.state
            .read()
            .decimals
            .get(&token)
            .copied()
            .ok_or_else(|| Error::InvalidToken(format!("{} has no decimals()", token)))
    }

    async fn approve(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<()> {
        self.set_allowance(token, owner, spender, amount)
    }

    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256> {
        let state = self.state.read();
        ensure_registered(&state, token)?;
        Ok(state
            .balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default())
    }
}

// ============================================================================
// Call execution
// ============================================================================

/// Executes calls against [`MemoryTokens`] and counts them.
///
/// Token `transfer`/`approve` payloads are applied to the ledger; calls to
/// non-token targets succeed with empty return data unless a revert has been
/// scripted for the target.
#[derive(Debug)]
pub struct MemoryExecutor {
    tokens: Arc<MemoryTokens>,
    calls: AtomicUsize,
    reverts: RwLock<HashMap<Address, Bytes>>,
}

impl MemoryExecutor {
    /// Create an executor over a token ledger
    pub fn new(tokens: Arc<MemoryTokens>) -> Self {
        Self {
            tokens,
            calls: AtomicUsize::new(0),
            reverts: RwLock::new(HashMap::new()),
        }
    }

    /// Make every call to `target` revert with `data`
    pub fn revert_on(&self, target: Address, data: impl Into<Bytes>) {
        self.reverts.write().insert(target, data.into());
    }

    /// Number of calls executed so far, including reverted ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallExecutor for MemoryExecutor {
    async fn call(
        &self,
        from: Address,
        target: Address,
        _value: U256,
        payload: &Bytes,
    ) -> CallResult {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(data) = self.reverts.read().get(&target) {
            return Err(data.clone());
        }

        if !self.tokens.is_token(&target) {
            return Ok(Bytes::new());
        }

        let applied = match calldata::decode(target, payload) {
            Operation::Transfer { token, to, amount } => {
                self.tokens.transfer(token, from, to, amount)
            }
            Operation::Approve {
                token,
                spender,
                amount,
            } => self.tokens.set_allowance(token, from, spender, amount),
            Operation::Other(_) => return Err(Bytes::new()),
        };

        match applied {
            // ERC-20 calls return `true`
            Ok(()) => Ok(Bytes::from(u256_word(U256::from(1)).to_vec())),
            Err(e) => Err(revert_reason(&e.to_string())),
        }
    }
}

/// Solidity `Error(string)` revert data
pub fn revert_reason(message: &str) -> Bytes {
    let bytes = message.as_bytes();
    let padding = (32 - (bytes.len() % 32)) % 32;

    let mut encoded = vec![0x08, 0xc3, 0x79, 0xa0];
    encoded.extend_from_slice(&u256_word(U256::from(32)));
    encoded.extend_from_slice(&u256_word(U256::from(bytes.len())));
    encoded.extend_from_slice(bytes);
    encoded.extend(std::iter::repeat_n(0u8, padding));
    Bytes::from(encoded)
}

// ============================================================================
// Off-chain consumer
// ============================================================================

/// Delivers verification requests over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
    sender: mpsc::UnboundedSender<VerificationRequest>,
}

impl ChannelConsumer {
    /// Create a consumer and the receiving end handed to the off-chain side
    pub fn new() -> (Self, mpsc::UnboundedReceiver<VerificationRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl OffchainConsumer for ChannelConsumer {
    fn request_verification(&self, request: VerificationRequest) -> Result<()> {
        self.sender
            .send(request)
            .map_err(|_| Error::Dispatch("verification channel closed".into()))
    }
}

// ============================================================================
// Swap router
// ============================================================================

/// Fixed-rate exchange over [`MemoryTokens`]
#[derive(Debug)]
pub struct MemorySwapRouter {
    address: Address,
    tokens: Arc<MemoryTokens>,
    /// (token_in, token_out) -> (numerator, denominator)
    rates: RwLock<HashMap<(Address, Address), (U256, U256)>>,
    swaps: Mutex<Vec<SwapParams>>,
}

impl MemorySwapRouter {
    /// Create a router with no pools
    pub fn new(address: Address, tokens: Arc<MemoryTokens>) -> Self {
        Self {
            address,
            tokens,
            rates: RwLock::new(HashMap::new()),
            swaps: Mutex::new(Vec::new()),
        }
    }

    /// Quote `token_in -> token_out` at `numerator / denominator`
    pub fn set_rate(&self, token_in: Address, token_out: Address, numerator: u64, denominator: u64) {
        self.rates.write().insert(
            (token_in, token_out),
            (U256::from(numerator), U256::from(denominator)),
        );
    }

    /// Swaps executed so far
    pub fn swaps(&self) -> Vec<SwapParams> {
        self.swaps.lock().clone()
    }
}

#[async_trait]
impl SwapRouter for MemorySwapRouter {
    async fn swap_exact_input(&self, payer: Address, params: &SwapParams) -> Result<U256> {
        let (numerator, denominator) = self
            .rates
            .read()
            .get(&(params.token_in, params.token_out))
            .copied()
            .ok_or_else(|| {
                Error::Swap(format!(
                    "no pool for {} -> {}",
                    params.token_in, params.token_out
                ))
            })?;

        let amount_out = params
            .amount_in
            .checked_mul(numerator)
            .and_then(|v| v.checked_div(denominator))
            .ok_or(Error::ArithmeticOverflow("swap quote"))?;

        if amount_out < params.amount_out_minimum {
            return Err(Error::Swap(format!(
                "too little received: {} < {}",
                amount_out, params.amount_out_minimum
            )));
        }

        self.tokens
            .transfer(params.token_in, payer, self.address, params.amount_in)
            .map_err(|e| Error::Swap(e.to_string()))?;
        self.tokens
            .mint(params.token_out, params.recipient, amount_out)
            .map_err(|e| Error::Swap(e.to_string()))?;

        self.swaps.lock().push(params.clone());
        Ok(amount_out)
    }
}

// ============================================================================
// Relay router
// ============================================================================

/// A message accepted by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: MessageId,
    pub sender: Address,
    pub destination: DomainId,
    pub envelope: RelayEnvelope,
    pub fee: U256,
}

/// Flat-fee relay that pulls carried tokens on its allowance
#[derive(Debug)]
pub struct MemoryRelayRouter {
    address: Address,
    tokens: Arc<MemoryTokens>,
    fees: RwLock<HashMap<DomainId, U256>>,
    messages: Mutex<Vec<SentMessage>>,
}

impl MemoryRelayRouter {
    /// Create a relay with no supported destinations
    pub fn new(address: Address, tokens: Arc<MemoryTokens>) -> Self {
        Self {
            address,
            tokens,
            fees: RwLock::new(HashMap::new()),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Support `destination` at a flat native `fee`
    pub fn set_fee(&self, destination: DomainId, fee: U256) {
        self.fees.write().insert(destination, fee);
    }

    /// Messages sent so far
    pub fn messages(&self) -> Vec<SentMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl RelayRouter for MemoryRelayRouter {
    fn address(&self) -> Address {
        self.address
    }

    async fn quote_fee(&self, destination: DomainId, _envelope: &RelayEnvelope) -> Result<U256> {
        self.fees
            .read()
            .get(&destination)
            .copied()
            .ok_or_else(|| Error::Relay(format!("unsupported destination {}", destination)))
    }

    async fn send(
        &self,
        sender: Address,
        destination: DomainId,
        envelope: &RelayEnvelope,
        fee: U256,
    ) -> Result<MessageId> {
        let required = self.quote_fee(destination, envelope).await?;
        if fee < required {
            return Err(Error::Relay(format!("fee {} below quote {}", fee, required)));
        }

        for carried in &envelope.token_amounts {
            self.tokens
                .transfer_from(carried.token, self.address, sender, self.address, carried.amount)
                .map_err(|e| Error::Relay(e.to_string()))?;
        }

        let mut messages = self.messages.lock();
        let mut preimage = Vec::with_capacity(96);
        preimage.extend_from_slice(&address_word(sender));
        preimage.extend_from_slice(&u256_word(U256::from(destination)));
        preimage.extend_from_slice(&u256_word(U256::from(messages.len())));
        let id = B256::from(keccak256_hash(&preimage));

        messages.push(SentMessage {
            id,
            sender,
            destination,
            envelope: envelope.clone(),
            fee,
        });
        Ok(id)
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Deposit ledger of the entry point
#[derive(Debug)]
pub struct MemoryEntryPoint {
    address: Address,
    deposits: RwLock<HashMap<Address, U256>>,
}

impl MemoryEntryPoint {
    /// Create an entry point with no deposits
    pub fn new(address: Address) -> Self {
        Self {
            address,
            deposits: RwLock::new(HashMap::new()),
        }
    }

    /// Deposit of `account`
    pub fn deposit_of(&self, account: &Address) -> U256 {
        self.deposits
            .read()
            .get(account)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EntryPoint for MemoryEntryPoint {
    fn address(&self) -> Address {
        self.address
    }

    async fn credit_balance(&self, account: Address, amount: U256) -> Result<()> {
        let mut deposits = self.deposits.write();
        let deposit = deposits.entry(account).or_default();
        *deposit = deposit
            .checked_add(amount)
            .ok_or(Error::ArithmeticOverflow("deposit"))?;
        Ok(())
    }

    async fn balance_of(&self, account: Address) -> Result<U256> {
        Ok(self.deposit_of(&account))
    }

    async fn withdraw_to(
        &self,
        account: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<()> {
        let mut deposits = self.deposits.write();
        let deposit = deposits.entry(account).or_default();
        if *deposit < amount {
            return Err(Error::EntryPoint(format!(
                "withdraw {} exceeds deposit {}",
                amount, deposit
            )));
        }
        *deposit -= amount;
        tracing::debug!(%account, %recipient, %amount, "deposit withdrawn");
        Ok(())
    }
}
