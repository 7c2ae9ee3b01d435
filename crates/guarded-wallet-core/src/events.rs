//! Notices and receipts emitted by the account
//!
//! Events are appended to the account's log for observability only. Nothing
//! inside the account reads them back.

use crate::external::{DomainId, MessageId};
use crate::types::Nonce;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Event recorded by a [`SmartAccount`](crate::SmartAccount)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountEvent {
    /// Owner and guardian were fixed
    AccountInitialized {
        account: Address,
        owner: Address,
        guardian: Address,
        entry_point: Address,
    },
    /// A request was parked in the ledger under `nonce`
    EscalationRequired { nonce: Nonce },
    /// No usable price feed for `token`; the request was not priced
    FeedNotFound { token: Address },
    /// A guardian approval executed the entry under `nonce`
    EscalationApproved { nonce: Nonce, approvals: u32 },
    /// Swap output was handed to the relay
    TransferRelayed {
        message_id: MessageId,
        destination: DomainId,
        receiver: Address,
        token: Address,
        amount: U256,
        fee: U256,
    },
}

impl AccountEvent {
    /// Short name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            AccountEvent::AccountInitialized { .. } => "account_initialized",
            AccountEvent::EscalationRequired { .. } => "escalation_required",
            AccountEvent::FeedNotFound { .. } => "feed_not_found",
            AccountEvent::EscalationApproved { .. } => "escalation_approved",
            AccountEvent::TransferRelayed { .. } => "transfer_relayed",
        }
    }
}
