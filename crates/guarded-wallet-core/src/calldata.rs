//! Structured decoding of token call payloads
//!
//! Only the two money-moving ERC-20 entry points are recognized. Everything
//! else, including a recognized selector with truncated arguments, decodes
//! to [`Operation::Other`] and is never priced.

use crate::types::{address_word, u256_word};
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// `transfer(address,uint256)`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// `approve(address,uint256)`
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// selector + address word + amount word
const TOKEN_CALL_LEN: usize = 4 + 32 + 32;

/// A decoded call payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Operation {
    /// `token.transfer(to, amount)`
    Transfer {
        token: Address,
        to: Address,
        amount: U256,
    },
    /// `token.approve(spender, amount)`
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    /// Anything that does not move tokens directly
    Other(Bytes),
}

impl Operation {
    /// Token amount moved or authorized, if this is a token operation
    pub fn amount(&self) -> Option<U256> {
        match self {
            Operation::Transfer { amount, .. } | Operation::Approve { amount, .. } => Some(*amount),
            Operation::Other(_) => None,
        }
    }

    /// Token contract the operation targets
    pub fn token(&self) -> Option<Address> {
        match self {
            Operation::Transfer { token, .. } | Operation::Approve { token, .. } => Some(*token),
            Operation::Other(_) => None,
        }
    }

    /// Whether the operation moves or authorizes token value
    pub fn is_money_moving(&self) -> bool {
        !matches!(self, Operation::Other(_))
    }
}

/// Decode a payload sent to `target`
pub fn decode(target: Address, payload: &[u8]) -> Operation {
    if payload.len() < TOKEN_CALL_LEN {
        return Operation::Other(Bytes::copy_from_slice(payload));
    }

    let selector = &payload[..4];
    let counterparty = Address::from_slice(&payload[16..36]);
    let amount = U256::from_be_slice(&payload[36..68]);

    if selector == TRANSFER_SELECTOR {
        Operation::Transfer {
            token: target,
            to: counterparty,
            amount,
        }
    } else if selector == APPROVE_SELECTOR {
        Operation::Approve {
            token: target,
            spender: counterparty,
            amount,
        }
    } else {
        Operation::Other(Bytes::copy_from_slice(payload))
    }
}

/// Encode `transfer(to, amount)`
pub fn encode_transfer(to: Address, amount: U256) -> Bytes {
    encode_token_call(TRANSFER_SELECTOR, to, amount)
}

/// Encode `approve(spender, amount)`
pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    encode_token_call(APPROVE_SELECTOR, spender, amount)
}

fn encode_token_call(selector: [u8; 4], counterparty: Address, amount: U256) -> Bytes {
    let mut encoded = Vec::with_capacity(TOKEN_CALL_LEN);
    encoded.extend_from_slice(&selector);
    encoded.extend_from_slice(&address_word(counterparty));
    encoded.extend_from_slice(&u256_word(amount));
    Bytes::from(encoded)
}
