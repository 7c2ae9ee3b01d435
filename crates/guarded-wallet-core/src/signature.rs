//! Signer recovery for owner and guardian signatures
//!
//! Two digests are authenticated here and they are deliberately built
//! differently:
//!
//! - **Owner**: the operation digest handed over by the upstream framework is
//!   used as-is, with no prefix.
//! - **Guardian**: the ABI encoding of the escalated transaction is hashed and
//!   wrapped in the `"\x19Ethereum Signed Message:\n32"` prefix before recovery.

use crate::types::{Digest, PendingTransaction, Signature, keccak256_hash};
use crate::{Error, Result};
use alloy_primitives::Address;
use k256::ecdsa::{self, RecoveryId, SigningKey, VerifyingKey};

const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Stateless signer recovery
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Create a new verifier
    pub fn new() -> Self {
        Self
    }

    /// Recover the identity that produced `signature` over `message_hash`.
    ///
    /// Fails with `MalformedSignature` if the bytes are not a canonical
    /// 65-byte signature or no public key can be recovered from them.
    pub fn recover(&self, message_hash: &Digest, signature: &[u8]) -> Result<Address> {
        let sig = Signature::from_bytes(signature)?;
        recover_address(message_hash, &sig)
    }

    /// Recover and require the owner; used by callers that need a hard failure
    pub fn verify_owner(
        &self,
        operation_hash: &Digest,
        signature: &[u8],
        owner: Address,
    ) -> Result<()> {
        let recovered = self.recover(operation_hash, signature)?;
        if recovered != owner {
            return Err(Error::OwnerMismatch {
                expected: owner,
                recovered,
            });
        }
        Ok(())
    }

    /// Recover the guardian's approval over an escalated transaction
    pub fn verify_guardian(
        &self,
        tx: &PendingTransaction,
        signature: &[u8],
        guardian: Address,
    ) -> Result<()> {
        let digest = guardian_digest(tx);
        let recovered = self.recover(&digest, signature)?;
        if recovered != guardian {
            return Err(Error::GuardianMismatch {
                expected: guardian,
                recovered,
            });
        }
        Ok(())
    }
}

/// Digest a guardian signs to approve `tx`
pub fn guardian_digest(tx: &PendingTransaction) -> Digest {
    eth_signed_message_hash(&keccak256_hash(&tx.abi_encode()))
}

/// EIP-191 personal-message hash of a 32-byte digest
pub fn eth_signed_message_hash(hash: &Digest) -> Digest {
    let mut prefixed = Vec::with_capacity(SIGNED_MESSAGE_PREFIX.len() + 32);
    prefixed.extend_from_slice(SIGNED_MESSAGE_PREFIX);
    prefixed.extend_from_slice(hash);
    keccak256_hash(&prefixed)
}

/// Recover the Ethereum address behind a parsed signature
pub fn recover_address(message_hash: &Digest, signature: &Signature) -> Result<Address> {
    let recovery_id = RecoveryId::try_from(signature.recovery_id)
        .map_err(|_| Error::MalformedSignature("invalid recovery id".into()))?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&signature.r);
    sig_bytes[32..].copy_from_slice(&signature.s);

    let sig = ecdsa::Signature::from_slice(&sig_bytes)
        .map_err(|e| Error::MalformedSignature(e.to_string()))?;

    let key = VerifyingKey::recover_from_prehash(message_hash, &sig, recovery_id)
        .map_err(|e| Error::MalformedSignature(format!("recovery failed: {}", e)))?;

    Ok(address_from_key(&key))
}

/// Sign a prehashed digest, producing a recoverable signature.
///
/// Owners sign operation digests directly; guardians sign
/// [`guardian_digest`] of the escalated transaction.
pub fn sign_prehash(key: &SigningKey, digest: &Digest) -> Result<Signature> {
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(digest)
        .map_err(|e| Error::MalformedSignature(format!("signing failed: {}", e)))?;

    let bytes = sig.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);

    Ok(Signature::new(r, s, recovery_id.to_byte()))
}

/// Derive the Ethereum address of a public key
pub fn address_from_key(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    // skip the 0x04 tag
    let hash = keccak256_hash(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
