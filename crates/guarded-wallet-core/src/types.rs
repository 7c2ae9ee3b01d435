//! Core types for the guarded account
//!
//! This module defines the values that flow between the authorization gate,
//! the policy, the ledger and the orchestrator: recoverable signatures,
//! transfer requests, escalated transactions and the privileged caller set.

use crate::{Error, Result};
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Escalation ledger key
pub type Nonce = u64;

/// 32-byte message digest
pub type Digest = [u8; 32];

/// Recoverable ECDSA signature (r, s, recovery id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// R component (32 bytes)
    pub r: [u8; 32],
    /// S component (32 bytes)
    pub s: [u8; 32],
    /// Recovery ID (0 or 1)
    pub recovery_id: u8,
}

impl Signature {
    /// Length of the canonical `r || s || v` encoding
    pub const LEN: usize = 65;

    /// Create a new signature
    pub fn new(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Self {
        Self { r, s, recovery_id }
    }

    /// Parse the canonical 65-byte `r || s || v` encoding.
    ///
    /// `v` may be given raw (0/1) or Ethereum-style (27/28).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(Error::MalformedSignature(format!(
                "expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }

        let recovery_id = match bytes[64] {
            0 | 27 => 0,
            1 | 28 => 1,
            v => {
                return Err(Error::MalformedSignature(format!(
                    "invalid recovery byte {}",
                    v
                )));
            }
        };

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, recovery_id })
    }

    /// Encode as `r || s || v` with `v = recovery_id + 27`
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v();
        bytes
    }

    /// Get v value for legacy Ethereum signatures
    pub fn v(&self) -> u8 {
        self.recovery_id + 27
    }
}

/// An execution request submitted to the authorization gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Contract or account to invoke
    pub target: Address,
    /// Native value forwarded with the call
    pub value: U256,
    /// Raw call payload
    pub payload: Bytes,
}

impl TransferRequest {
    /// Create a new request
    pub fn new(target: Address, value: U256, payload: impl Into<Bytes>) -> Self {
        Self {
            target,
            value,
            payload: payload.into(),
        }
    }
}

/// An escalated request awaiting guardian approval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// Contract or account to invoke
    pub target: Address,
    /// Native value forwarded with the call
    pub value: U256,
    /// Raw call payload
    pub payload: Bytes,
}

impl PendingTransaction {
    /// Whether this is the zero transaction returned for unset ledger slots
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// ABI encoding of the `(address, uint256, bytes)` struct.
    ///
    /// This is the byte string a guardian signs (after the signed-message
    /// prefix is applied). The nonce is not part of it.
    pub fn abi_encode(&self) -> Vec<u8> {
        let padding = (32 - (self.payload.len() % 32)) % 32;
        let mut encoded = Vec::with_capacity(32 * 5 + self.payload.len() + padding);

        // offset of the dynamic tuple
        encoded.extend_from_slice(&u256_word(U256::from(32)));
        encoded.extend_from_slice(&address_word(self.target));
        encoded.extend_from_slice(&u256_word(self.value));
        // offset of `payload` inside the tuple (3 head words)
        encoded.extend_from_slice(&u256_word(U256::from(96)));
        encoded.extend_from_slice(&u256_word(U256::from(self.payload.len())));
        encoded.extend_from_slice(&self.payload);
        encoded.extend(std::iter::repeat_n(0u8, padding));

        encoded
    }
}

impl From<TransferRequest> for PendingTransaction {
    fn from(req: TransferRequest) -> Self {
        Self {
            target: req.target,
            value: req.value,
            payload: req.payload,
        }
    }
}

impl From<PendingTransaction> for TransferRequest {
    fn from(tx: PendingTransaction) -> Self {
        Self {
            target: tx.target,
            value: tx.value,
            payload: tx.payload,
        }
    }
}

/// Identities allowed to drive the authorization gate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerSet {
    callers: BTreeSet<Address>,
}

impl CallerSet {
    /// Build a caller set from any collection of identities
    pub fn new(callers: impl IntoIterator<Item = Address>) -> Self {
        Self {
            callers: callers.into_iter().collect(),
        }
    }

    /// Check whether `caller` is privileged
    pub fn contains(&self, caller: &Address) -> bool {
        self.callers.contains(caller)
    }

    /// Fail with `Unauthorized` unless `caller` is privileged
    pub fn authorize(&self, caller: Address) -> Result<()> {
        if self.contains(&caller) {
            Ok(())
        } else {
            Err(Error::Unauthorized(caller))
        }
    }

    /// Number of privileged identities
    pub fn len(&self) -> usize {
        self.callers.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }
}

impl fmt::Display for CallerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.callers.iter().map(|a| a.to_string()).collect();
        write!(f, "[{}]", joined.join(", "))
    }
}

/// Left-pad an address to a 32-byte ABI word
pub fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

/// Big-endian 32-byte ABI word
pub fn u256_word(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

/// Compute Keccak256 hash of data
pub fn keccak256_hash(data: &[u8]) -> Digest {
    use tiny_keccak::{Hasher, Keccak};
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}
