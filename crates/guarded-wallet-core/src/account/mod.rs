//! # Guarded Smart Account
//!
//! The account is the aggregate root: it owns the escalation ledger, the
//! native balance and the event log, and it holds shared handles to every
//! external collaborator.
//!
//! ## Authorization
//!
//! Only privileged callers (the entry point and the deploying factory) may
//! drive [`SmartAccount::execute`], [`SmartAccount::approve`] and the
//! cross-domain orchestrator. Owner signatures are checked by the entry point
//! through [`SmartAccount::validate_user_op`]; guardian signatures are checked
//! on approval.
//!
//! ## Serialization
//!
//! All mutable state sits behind one async mutex that each public operation
//! holds from start to finish, so no caller ever observes a half-applied
//! operation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use guarded_wallet_core::{AccountConfig, SmartAccount, TransferRequest};
//!
//! let account = SmartAccount::initialize(config, collaborators)?;
//! match account.execute(entry_point, request).await? {
//!     ExecutionOutcome::Executed { return_data } => { /* done */ }
//!     ExecutionOutcome::Escalated { nonce } => { /* wait for the guardian */ }
//! }
//! ```

mod config;
mod factory;
mod gate;
pub mod user_op;

pub use config::AccountConfig;
pub use factory::AccountFactory;
pub use user_op::{ENTRY_POINT_V06, ENTRY_POINT_V07, UserOperation, encode_execute};

use crate::events::AccountEvent;
use crate::external::Collaborators;
use crate::ledger::{LedgerEntry, PausedTransactionLedger};
use crate::policy::PriceThresholdPolicy;
use crate::signature::SignatureVerifier;
use crate::types::{CallerSet, Nonce, PendingTransaction};
use crate::{Error, Result};
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Result of routing one request through the gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The target was invoked
    Executed { return_data: Bytes },
    /// The request was parked for guardian approval
    Escalated { nonce: Nonce },
}

impl ExecutionOutcome {
    /// Whether the request was escalated
    pub fn is_escalated(&self) -> bool {
        matches!(self, ExecutionOutcome::Escalated { .. })
    }

    /// Ledger nonce of an escalated request
    pub fn nonce(&self) -> Option<Nonce> {
        match self {
            ExecutionOutcome::Escalated { nonce } => Some(*nonce),
            ExecutionOutcome::Executed { .. } => None,
        }
    }
}

/// User-operation validation result reported to the entry point.
///
/// A signature by someone other than the owner is a non-zero code, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValidationCode {
    /// Signed by the owner
    Valid = 0,
    /// Signed by anyone else
    SignatureFailed = 1,
}

impl ValidationCode {
    /// Numeric code as returned to the entry point
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether validation succeeded
    pub fn is_valid(self) -> bool {
        self == ValidationCode::Valid
    }
}

/// State mutated by account operations
#[derive(Debug, Default)]
pub(crate) struct AccountState {
    pub(crate) ledger: PausedTransactionLedger,
    pub(crate) native_balance: U256,
    pub(crate) events: Vec<AccountEvent>,
}

impl AccountState {
    pub(crate) fn emit(&mut self, event: AccountEvent) {
        debug!(event = event.kind(), "event emitted");
        self.events.push(event);
    }

    pub(crate) fn credit(&mut self, amount: U256) -> Result<()> {
        self.native_balance = self
            .native_balance
            .checked_add(amount)
            .ok_or(Error::ArithmeticOverflow("native balance"))?;
        Ok(())
    }
}

/// A smart account guarded by a price-threshold policy and a guardian key
pub struct SmartAccount {
    pub(crate) config: AccountConfig,
    pub(crate) callers: CallerSet,
    pub(crate) policy: PriceThresholdPolicy,
    pub(crate) verifier: SignatureVerifier,
    pub(crate) collaborators: Collaborators,
    pub(crate) state: Mutex<AccountState>,
}

impl std::fmt::Debug for SmartAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartAccount")
            .field("address", &self.config.address)
            .field("owner", &self.config.owner)
            .field("guardian", &self.config.guardian)
            .field("callers", &self.callers)
            .finish_non_exhaustive()
    }
}

impl SmartAccount {
    /// Fix owner and guardian and bind the collaborators.
    ///
    /// The identities cannot change afterwards.
    pub fn initialize(config: AccountConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let entry_point = collaborators.entry_point.address();
        if entry_point != config.entry_point {
            return Err(Error::InvalidConfig(format!(
                "entry point collaborator {} does not match configured {}",
                entry_point, config.entry_point
            )));
        }

        let callers = config.privileged_callers();
        let policy = PriceThresholdPolicy::new(config.policy.clone());

        let mut state = AccountState::default();
        state.emit(AccountEvent::AccountInitialized {
            account: config.address,
            owner: config.owner,
            guardian: config.guardian,
            entry_point: config.entry_point,
        });

        info!(
            account = %config.address,
            owner = %config.owner,
            guardian = %config.guardian,
            callers = %callers,
            "account initialized"
        );

        Ok(Self {
            config,
            callers,
            policy,
            verifier: SignatureVerifier::new(),
            collaborators,
            state: Mutex::new(state),
        })
    }

    /// The account's own identity
    pub fn address(&self) -> Address {
        self.config.address
    }

    /// Owner identity
    pub fn owner(&self) -> Address {
        self.config.owner
    }

    /// Guardian identity
    pub fn guardian(&self) -> Address {
        self.config.guardian
    }

    /// Entry point identity
    pub fn entry_point(&self) -> Address {
        self.config.entry_point
    }

    /// Full configuration
    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    /// Identities allowed to drive the gate
    pub fn callers(&self) -> &CallerSet {
        &self.callers
    }

    /// Collaborator handles the account was bound to
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Native value held by the account
    pub async fn native_balance(&self) -> U256 {
        self.state.lock().await.native_balance
    }

    /// Every event emitted so far
    pub async fn events(&self) -> Vec<AccountEvent> {
        self.state.lock().await.events.clone()
    }

    /// Escalated transaction under `nonce`, or the empty transaction
    pub async fn pending(&self, nonce: Nonce) -> PendingTransaction {
        self.state.lock().await.ledger.get(nonce)
    }

    /// Ledger entry under `nonce`
    pub async fn ledger_entry(&self, nonce: Nonce) -> Option<LedgerEntry> {
        self.state.lock().await.ledger.entry(nonce).cloned()
    }

    /// Nonce the next escalation will receive
    pub async fn next_nonce(&self) -> Nonce {
        self.state.lock().await.ledger.nonce_counter()
    }

    /// Drop approved ledger entries. Restricted to privileged callers.
    pub async fn prune_approved(&self, caller: Address) -> Result<usize> {
        self.callers.authorize(caller)?;
        let pruned = self.state.lock().await.ledger.prune_approved();
        info!(account = %self.config.address, pruned, "pruned approved escalations");
        Ok(pruned)
    }

    /// Credit native value sent to the account
    pub async fn receive(&self, amount: U256) -> Result<()> {
        self.state.lock().await.credit(amount)
    }

    /// Forward `amount` of attached native value to the entry point deposit
    pub async fn deposit(&self, amount: U256) -> Result<()> {
        let _state = self.state.lock().await;
        self.collaborators
            .entry_point
            .credit_balance(self.config.address, amount)
            .await?;
        info!(account = %self.config.address, %amount, "deposited to entry point");
        Ok(())
    }

    /// Current entry point deposit of the account
    pub async fn deposit_balance(&self) -> Result<U256> {
        self.collaborators
            .entry_point
            .balance_of(self.config.address)
            .await
    }

    /// Withdraw from the entry point deposit. Owner or the account itself only.
    pub async fn withdraw_deposit_to(
        &self,
        caller: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<()> {
        if caller != self.config.owner && caller != self.config.address {
            return Err(Error::Unauthorized(caller));
        }

        let _state = self.state.lock().await;
        self.collaborators
            .entry_point
            .withdraw_to(self.config.address, recipient, amount)
            .await?;
        info!(account = %self.config.address, %recipient, %amount, "deposit withdrawn");
        Ok(())
    }
}
