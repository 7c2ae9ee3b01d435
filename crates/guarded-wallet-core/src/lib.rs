//! # Guarded Wallet Core
//!
//! Core library for a smart account that gates outgoing value behind a
//! layered authorization policy.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Signature Verification**: Owner signatures over pre-hashed user
//!   operations, guardian signatures over prefixed escalated transactions
//! - **Price-Threshold Policy**: Token transfers and approvals valued through
//!   price feeds; anything at or above the fiat ceiling needs the guardian
//! - **Escalation Ledger**: Nonce-indexed store of paused transactions
//! - **Authorization Gate**: Routes privileged requests to execution or
//!   escalation and executes approved entries
//! - **Cross-Domain Transfers**: Swap, then relay the output with a native fee
//! - **ERC-4337 Support**: User operations, deposits and counterfactual
//!   account addresses
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use guarded_wallet_core::{AccountConfig, PolicyConfig, SmartAccount, TransferRequest};
//!
//! let config = AccountConfig::new(account, owner, guardian)
//!     .with_factory(factory)
//!     .with_policy(PolicyConfig::default().with_usd_ceiling(U256::from(1_000)));
//!
//! let account = SmartAccount::initialize(config, collaborators)?;
//!
//! // Small transfers execute immediately, large ones are escalated
//! let outcome = account.execute(entry_point, request).await?;
//!
//! // The guardian signs the escalated transaction out of band
//! if let Some(nonce) = outcome.nonce() {
//!     account.approve(entry_point, nonce, &guardian_signature).await?;
//! }
//! ```
//!
//! ## Security Model
//!
//! - Only the entry point and the deploying factory can drive the account
//! - Owner and guardian are fixed at initialization
//! - A missing price feed fails open unless configured otherwise
//! - Callee reverts are forwarded byte for byte

pub mod account;
pub mod bridge;
pub mod calldata;
pub mod error;
pub mod events;
pub mod external;
pub mod ledger;
pub mod policy;
pub mod signature;
pub mod types;

pub use account::{
    AccountConfig, AccountFactory, ENTRY_POINT_V06, ENTRY_POINT_V07, ExecutionOutcome,
    SmartAccount, UserOperation, ValidationCode,
};
pub use bridge::CrossDomainTransfer;
pub use calldata::Operation;
pub use error::{Error, Result};
pub use events::AccountEvent;
pub use external::{Collaborators, SwapParams, VerificationRequest};
pub use ledger::{EntryStatus, LedgerEntry, PausedTransactionLedger};
pub use policy::{FeedFailureMode, PolicyConfig, PolicyDecision, PriceThresholdPolicy};
pub use signature::SignatureVerifier;
pub use types::{
    CallerSet, Digest, Nonce, PendingTransaction, Signature, TransferRequest, keccak256_hash,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
