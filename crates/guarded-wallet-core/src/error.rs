//! Error types for guarded account operations

use alloy_primitives::{Address, Bytes, U256};
use thiserror::Error;

/// Result type alias for guarded account operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while authorizing, escalating or relaying
#[derive(Debug, Error)]
pub enum Error {
    // ============ Authorization Errors ============
    /// Caller is not one of the privileged identities
    #[error("Unauthorized caller: {0}")]
    Unauthorized(Address),

    /// Signature could not be parsed or recovered
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// Signature recovered to an identity other than the owner
    #[error("Owner mismatch: expected {expected}, recovered {recovered}")]
    OwnerMismatch { expected: Address, recovered: Address },

    /// Signature recovered to an identity other than the guardian
    #[error("Guardian mismatch: expected {expected}, recovered {recovered}")]
    GuardianMismatch { expected: Address, recovered: Address },

    // ============ Ledger Errors ============
    /// Approval references a nonce that was never escalated
    #[error("Unknown escalation nonce: {0}")]
    UnknownNonce(u64),

    /// Escalated entry outlived the configured retention window
    #[error("Escalation {0} has expired")]
    EscalationExpired(u64),

    /// Escalated entry was already approved and replay protection is on
    #[error("Escalation {0} was already approved")]
    AlreadyApproved(u64),

    // ============ Value Movement Errors ============
    /// Relay fee exceeds the native balance
    #[error("Insufficient fee balance: have {current}, need {required}")]
    InsufficientFee { current: U256, required: U256 },

    /// Invoked target failed; carries its raw revert data untouched
    #[error("Callee reverted: 0x{}", hex::encode(.0))]
    CalleeFailure(Bytes),

    // ============ Pricing Errors ============
    /// Price feed missing or erroring
    #[error("Price feed unavailable: {0}")]
    FeedUnavailable(String),

    /// Feed reported a zero or negative price
    #[error("Non-positive price {answer} reported by feed {feed}")]
    NonPositivePrice { feed: Address, answer: i128 },

    /// Checked arithmetic overflowed
    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    /// Target does not behave like a token
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token balance or allowance movement failed
    #[error("Token error: {0}")]
    Token(String),

    // ============ Configuration Errors ============
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ============ Collaborator Errors ============
    /// Off-chain verification request could not be enqueued
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Swap router failure
    #[error("Swap error: {0}")]
    Swap(String),

    /// Cross-domain relay failure
    #[error("Relay error: {0}")]
    Relay(String),

    /// Entry point deposit failure
    #[error("Entry point error: {0}")]
    EntryPoint(String),

    // ============ Serialization Errors ============
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may sensibly retry the same operation later.
    ///
    /// Nothing is ever retried internally.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientFee { .. } | Error::FeedUnavailable(_) | Error::Relay(_)
        )
    }

    /// Raw revert data when the error is a forwarded callee failure
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            Error::CalleeFailure(data) => Some(data),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Deserialization(e.to_string())
    }
}
