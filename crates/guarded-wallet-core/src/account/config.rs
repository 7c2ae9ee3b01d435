//! Account configuration

use super::user_op::ENTRY_POINT_V06;
use crate::policy::PolicyConfig;
use crate::types::CallerSet;
use crate::{Error, Result};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Configuration for a guarded smart account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// The account's own identity
    pub address: Address,
    /// Primary key; signs user operations
    pub owner: Address,
    /// Secondary key; approves escalated transactions
    pub guardian: Address,
    /// EntryPoint contract address
    pub entry_point: Address,
    /// Factory that deployed the account
    pub factory: Address,
    /// Chain the account lives on
    pub chain_id: u64,
    /// Escalation policy
    pub policy: PolicyConfig,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            address: Address::ZERO,
            owner: Address::ZERO,
            guardian: Address::ZERO,
            entry_point: ENTRY_POINT_V06,
            factory: Address::ZERO,
            chain_id: 1,
            policy: PolicyConfig::default(),
        }
    }
}

impl AccountConfig {
    /// Create a configuration with the default entry point and policy
    pub fn new(address: Address, owner: Address, guardian: Address) -> Self {
        Self {
            address,
            owner,
            guardian,
            ..Self::default()
        }
    }

    /// Set the entry point
    pub fn with_entry_point(mut self, entry_point: Address) -> Self {
        self.entry_point = entry_point;
        self
    }

    /// Set the deploying factory
    pub fn with_factory(mut self, factory: Address) -> Self {
        self.factory = factory;
        self
    }

    /// Set the chain ID
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Set the escalation policy
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Load from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Identities allowed to drive the gate: the entry point and the factory
    pub fn privileged_callers(&self) -> CallerSet {
        CallerSet::new(
            [self.entry_point, self.factory]
                .into_iter()
                .filter(|caller| !caller.is_zero()),
        )
    }

    /// Reject configurations that leave a required identity unset
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("address", self.address),
            ("owner", self.owner),
            ("guardian", self.guardian),
            ("entry_point", self.entry_point),
        ];
        for (name, identity) in required {
            if identity.is_zero() {
                return Err(Error::InvalidConfig(format!("{} must be set", name)));
            }
        }
        Ok(())
    }
}
