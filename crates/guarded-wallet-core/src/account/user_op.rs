//! ERC-4337 user operations
//!
//! The entry point hands the account a user operation together with its
//! hash. The owner's signature covers that hash directly, so the account
//! never re-derives it during validation. [`UserOperation::hash`] is provided
//! for signers and tests that need to produce the same digest.

use crate::types::{Digest, address_word, keccak256_hash, u256_word};
use alloy_primitives::{Address, Bytes, U256, address};
use serde::{Deserialize, Serialize};

/// ERC-4337 EntryPoint v0.6 address (same on most chains)
pub const ENTRY_POINT_V06: Address = address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

/// ERC-4337 EntryPoint v0.7 address
pub const ENTRY_POINT_V07: Address = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");

/// Selector of `execute(address,uint256,bytes)`
pub const EXECUTE_SELECTOR: [u8; 4] = [0xb6, 0x1d, 0x27, 0xf6];

/// ERC-4337 UserOperation (v0.6 format)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// Smart account address
    pub sender: Address,
    /// Anti-replay nonce
    pub nonce: U256,
    /// Account initialization code (empty if account exists)
    pub init_code: Bytes,
    /// Encoded call to execute
    pub call_data: Bytes,
    /// Gas for the execution phase
    pub call_gas_limit: U256,
    /// Gas for verification and account creation
    pub verification_gas_limit: U256,
    /// Pre-verification gas
    pub pre_verification_gas: U256,
    /// Maximum fee per gas
    pub max_fee_per_gas: U256,
    /// Maximum priority fee per gas
    pub max_priority_fee_per_gas: U256,
    /// Paymaster and data (empty if self-paying)
    pub paymaster_and_data: Bytes,
    /// Owner signature over the operation hash
    pub signature: Bytes,
}

impl UserOperation {
    /// Create a new UserOperation
    pub fn new(sender: Address, nonce: U256, call_data: impl Into<Bytes>) -> Self {
        Self {
            sender,
            nonce,
            init_code: Bytes::new(),
            call_data: call_data.into(),
            call_gas_limit: U256::from(100_000),
            verification_gas_limit: U256::from(100_000),
            pre_verification_gas: U256::from(21_000),
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        }
    }

    /// Set gas limits
    pub fn with_gas_limits(
        mut self,
        call_gas: u64,
        verification_gas: u64,
        pre_verification_gas: u64,
    ) -> Self {
        self.call_gas_limit = U256::from(call_gas);
        self.verification_gas_limit = U256::from(verification_gas);
        self.pre_verification_gas = U256::from(pre_verification_gas);
        self
    }

    /// Set signature
    pub fn with_signature(mut self, signature: impl Into<Bytes>) -> Self {
        self.signature = signature.into();
        self
    }

    /// v0.6 operation hash:
    /// `keccak256(abi.encode(keccak256(pack(op)), entry_point, chain_id))`
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> Digest {
        let inner = keccak256_hash(&self.pack_for_hash());

        let mut outer = Vec::with_capacity(96);
        outer.extend_from_slice(&inner);
        outer.extend_from_slice(&address_word(entry_point));
        outer.extend_from_slice(&u256_word(U256::from(chain_id)));
        keccak256_hash(&outer)
    }

    /// Every field except the signature, with dynamic fields hashed
    fn pack_for_hash(&self) -> Vec<u8> {
        let mut packed = Vec::with_capacity(32 * 10);
        packed.extend_from_slice(&address_word(self.sender));
        packed.extend_from_slice(&u256_word(self.nonce));
        packed.extend_from_slice(&keccak256_hash(&self.init_code));
        packed.extend_from_slice(&keccak256_hash(&self.call_data));
        packed.extend_from_slice(&u256_word(self.call_gas_limit));
        packed.extend_from_slice(&u256_word(self.verification_gas_limit));
        packed.extend_from_slice(&u256_word(self.pre_verification_gas));
        packed.extend_from_slice(&u256_word(self.max_fee_per_gas));
        packed.extend_from_slice(&u256_word(self.max_priority_fee_per_gas));
        packed.extend_from_slice(&keccak256_hash(&self.paymaster_and_data));
        packed
    }
}

/// Build call data for the account's `execute(address,uint256,bytes)`
pub fn encode_execute(to: Address, value: U256, data: &[u8]) -> Bytes {
    let padding = (32 - (data.len() % 32)) % 32;
    let mut encoded = Vec::with_capacity(4 + 32 * 4 + data.len() + padding);

    encoded.extend_from_slice(&EXECUTE_SELECTOR);
    encoded.extend_from_slice(&address_word(to));
    encoded.extend_from_slice(&u256_word(value));
    // offset of `data` (3 head words)
    encoded.extend_from_slice(&u256_word(U256::from(96)));
    encoded.extend_from_slice(&u256_word(U256::from(data.len())));
    encoded.extend_from_slice(data);
    encoded.extend(std::iter::repeat_n(0u8, padding));

    Bytes::from(encoded)
}
