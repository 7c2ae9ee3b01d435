//! Counterfactual account deployment
//!
//! Account addresses are derived CREATE2-style:
//! `keccak256(0xff || factory || salt || keccak256(init))[12..]`, where
//! `init` binds both the owner and the guardian.

use super::{AccountConfig, SmartAccount};
use crate::Result;
use crate::external::Collaborators;
use crate::policy::PolicyConfig;
use crate::types::{address_word, keccak256_hash};
use alloy_primitives::{Address, B256, Bytes};
use tracing::info;

/// Signature of the factory's deployment call
const CREATE_ACCOUNT_SIGNATURE: &[u8] = b"createAccount(address,address,uint256)";

/// Deploys guarded accounts at deterministic addresses
#[derive(Debug, Clone)]
pub struct AccountFactory {
    address: Address,
    entry_point: Address,
    chain_id: u64,
}

impl AccountFactory {
    /// Create a factory bound to an entry point
    pub fn new(address: Address, entry_point: Address) -> Self {
        Self {
            address,
            entry_point,
            chain_id: 1,
        }
    }

    /// Set the chain ID stamped on created accounts
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Factory identity
    pub fn address(&self) -> Address {
        self.address
    }

    /// Address an account for `(owner, guardian, salt)` will have
    pub fn account_address(&self, owner: Address, guardian: Address, salt: B256) -> Address {
        let mut init = Vec::with_capacity(64);
        init.extend_from_slice(&address_word(owner));
        init.extend_from_slice(&address_word(guardian));
        let init_hash = keccak256_hash(&init);

        let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
        preimage.push(0xff);
        preimage.extend_from_slice(self.address.as_slice());
        preimage.extend_from_slice(salt.as_slice());
        preimage.extend_from_slice(&init_hash);

        let hash = keccak256_hash(&preimage);
        Address::from_slice(&hash[12..])
    }

    /// `initCode` for a user operation that deploys the account
    pub fn init_code(&self, owner: Address, guardian: Address, salt: B256) -> Bytes {
        let selector = keccak256_hash(CREATE_ACCOUNT_SIGNATURE);

        let mut code = Vec::with_capacity(20 + 4 + 32 * 3);
        code.extend_from_slice(self.address.as_slice());
        code.extend_from_slice(&selector[..4]);
        code.extend_from_slice(&address_word(owner));
        code.extend_from_slice(&address_word(guardian));
        code.extend_from_slice(salt.as_slice());
        Bytes::from(code)
    }

    /// Deploy and initialize an account at its counterfactual address.
    ///
    /// The new account's privileged callers are the entry point and this
    /// factory.
    pub fn create_account(
        &self,
        owner: Address,
        guardian: Address,
        salt: B256,
        policy: PolicyConfig,
        collaborators: Collaborators,
    ) -> Result<SmartAccount> {
        let address = self.account_address(owner, guardian, salt);
        let config = AccountConfig::new(address, owner, guardian)
            .with_entry_point(self.entry_point)
            .with_factory(self.address)
            .with_chain_id(self.chain_id)
            .with_policy(policy);

        let account = SmartAccount::initialize(config, collaborators)?;
        info!(factory = %self.address, %address, %salt, "account created");
        Ok(account)
    }
}
