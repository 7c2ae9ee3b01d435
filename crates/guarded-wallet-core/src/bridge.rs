//! Cross-domain transfer orchestration
//!
//! Swaps one asset for another and relays the output to a destination
//! domain, paying the relay fee from the account's native balance.
//!
//! ## Ordering
//!
//! The fee is quoted, and checked against the balance, only after the swap
//! has run. A shortfall aborts the relay step but leaves the swapped output
//! with the account.

use crate::SmartAccount;
use crate::events::AccountEvent;
use crate::external::{DomainId, MessageId, RelayEnvelope, SwapParams};
use crate::{Error, Result};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Receipt of one swap-and-relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossDomainTransfer {
    /// Destination domain
    pub destination: DomainId,
    /// Receiver on the destination domain
    pub receiver: Address,
    /// Relayed asset
    pub token: Address,
    /// Relayed amount (the swap output)
    pub amount: U256,
    /// Native fee paid to the relay
    pub fee: U256,
    /// Relay message identifier
    pub message_id: MessageId,
}

impl SmartAccount {
    /// Swap via the exchange router, then relay the output to `destination`.
    ///
    /// The swap output is always received by the account itself, whatever
    /// recipient `params` names.
    pub async fn swap_and_relay(
        &self,
        caller: Address,
        params: SwapParams,
        destination: DomainId,
    ) -> Result<CrossDomainTransfer> {
        self.callers.authorize(caller)?;
        let mut state = self.state.lock().await;
        let account = self.config.address;

        let params = SwapParams {
            recipient: account,
            ..params
        };
        let amount = self
            .collaborators
            .swap_router
            .swap_exact_input(account, &params)
            .await?;
        debug!(
            token_in = %params.token_in,
            token_out = %params.token_out,
            amount_in = %params.amount_in,
            amount_out = %amount,
            "swap executed"
        );

        let envelope = RelayEnvelope::token_transfer(account, params.token_out, amount);
        let relay = &self.collaborators.relay_router;
        let fee = relay.quote_fee(destination, &envelope).await?;

        if fee > state.native_balance {
            warn!(
                %account,
                destination,
                balance = %state.native_balance,
                %fee,
                "relay fee exceeds native balance"
            );
            return Err(Error::InsufficientFee {
                current: state.native_balance,
                required: fee,
            });
        }

        self.collaborators
            .tokens
            .approve(params.token_out, account, relay.address(), amount)
            .await?;

        let message_id = relay.send(account, destination, &envelope, fee).await?;
        state.native_balance -= fee;

        state.emit(AccountEvent::TransferRelayed {
            message_id,
            destination,
            receiver: account,
            token: params.token_out,
            amount,
            fee,
        });
        info!(
            %account,
            %message_id,
            destination,
            token = %params.token_out,
            %amount,
            %fee,
            "transfer relayed"
        );

        Ok(CrossDomainTransfer {
            destination,
            receiver: account,
            token: params.token_out,
            amount,
            fee,
            message_id,
        })
    }
}
