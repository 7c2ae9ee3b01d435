//! Authorization gate
//!
//! Routes privileged requests either straight to the target or into the
//! escalation ledger, and executes ledger entries once the guardian approves.

use super::{AccountState, ExecutionOutcome, SmartAccount, UserOperation, ValidationCode};
use crate::calldata;
use crate::events::AccountEvent;
use crate::external::VerificationRequest;
use crate::ledger::EntryStatus;
use crate::policy::{PolicyDecision, Valuation};
use crate::types::{Digest, Nonce, TransferRequest};
use crate::{Error, Result};
use alloy_primitives::{Address, Bytes, U256};
use chrono::Utc;
use tracing::{debug, info, warn};

impl SmartAccount {
    /// Execute `request` now, or escalate it to the guardian.
    ///
    /// Callee failures are returned as [`Error::CalleeFailure`] carrying the
    /// callee's raw revert data.
    pub async fn execute(
        &self,
        caller: Address,
        request: TransferRequest,
    ) -> Result<ExecutionOutcome> {
        self.callers.authorize(caller)?;
        let mut state = self.state.lock().await;
        self.route(&mut state, request).await
    }

    /// Route each request through the gate in order.
    ///
    /// Stops at the first failure; outcomes of earlier requests stand.
    pub async fn execute_batch(
        &self,
        caller: Address,
        requests: Vec<TransferRequest>,
    ) -> Result<Vec<ExecutionOutcome>> {
        self.callers.authorize(caller)?;
        let mut state = self.state.lock().await;

        let mut outcomes = Vec::with_capacity(requests.len());
        for (index, request) in requests.into_iter().enumerate() {
            let outcome = self.route(&mut state, request).await.inspect_err(|e| {
                warn!(account = %self.config.address, index, error = %e, "batch aborted");
            })?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Execute the ledger entry under `nonce` on the guardian's signature.
    ///
    /// An unset nonce fails with `UnknownNonce` before the signature is
    /// looked at. Unless replay protection is configured the same entry can
    /// be approved, and executed, more than once.
    pub async fn approve(&self, caller: Address, nonce: Nonce, signature: &[u8]) -> Result<Bytes> {
        self.callers.authorize(caller)?;
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let tx = state.ledger.get(nonce);
        if tx.is_empty() {
            return Err(Error::UnknownNonce(nonce));
        }

        if let Some(entry) = state.ledger.entry(nonce) {
            if let Some(ttl) = self.config.policy.pending_ttl_secs {
                if entry.is_expired(ttl, now) {
                    return Err(Error::EscalationExpired(nonce));
                }
            }
            if self.config.policy.replay_protection && entry.status == EntryStatus::Approved {
                return Err(Error::AlreadyApproved(nonce));
            }
        }

        self.verifier
            .verify_guardian(&tx, signature, self.config.guardian)?;

        let return_data = self
            .invoke(&mut state, tx.target, tx.value, &tx.payload)
            .await?;

        state.ledger.record_approval(nonce, now)?;
        let approvals = state
            .ledger
            .entry(nonce)
            .map(|entry| entry.approvals)
            .unwrap_or_default();
        state.emit(AccountEvent::EscalationApproved { nonce, approvals });

        info!(
            account = %self.config.address,
            nonce,
            approvals,
            target = %tx.target,
            "escalation approved and executed"
        );
        Ok(return_data)
    }

    /// Check the owner's signature over `op_hash` and pay the prefund.
    ///
    /// Only the entry point may call this. A signature by anyone but the
    /// owner yields [`ValidationCode::SignatureFailed`]; a signature that
    /// cannot be parsed at all is an error.
    pub async fn validate_user_op(
        &self,
        caller: Address,
        op: &UserOperation,
        op_hash: &Digest,
        missing_funds: U256,
    ) -> Result<ValidationCode> {
        if caller != self.config.entry_point {
            return Err(Error::Unauthorized(caller));
        }
        let mut state = self.state.lock().await;

        let recovered = self.verifier.recover(op_hash, &op.signature)?;
        let code = if recovered == self.config.owner {
            ValidationCode::Valid
        } else {
            debug!(
                account = %self.config.address,
                %recovered,
                owner = %self.config.owner,
                "user operation not signed by owner"
            );
            ValidationCode::SignatureFailed
        };

        if !missing_funds.is_zero() {
            match state.native_balance.checked_sub(missing_funds) {
                Some(remaining) => {
                    self.collaborators
                        .entry_point
                        .credit_balance(self.config.address, missing_funds)
                        .await?;
                    state.native_balance = remaining;
                    debug!(account = %self.config.address, %missing_funds, "prefund paid");
                }
                None => warn!(
                    account = %self.config.address,
                    %missing_funds,
                    balance = %state.native_balance,
                    "balance too low to pay prefund"
                ),
            }
        }

        Ok(code)
    }

    pub(super) async fn route(
        &self,
        state: &mut AccountState,
        request: TransferRequest,
    ) -> Result<ExecutionOutcome> {
        let decision = self
            .policy
            .evaluate(
                &request,
                self.collaborators.price_feeds.as_ref(),
                self.collaborators.tokens.as_ref(),
            )
            .await?;

        // the notice is logged only once the request has gone through
        let unpriced = decision.is_unpriced().then_some(request.target);

        match decision {
            PolicyDecision::RequireAdditionalApproval { reason, valuation } => {
                let nonce = self.escalate(state, request, valuation.as_ref(), unpriced)?;
                debug!(nonce, %reason, "escalation reason");
                Ok(ExecutionOutcome::Escalated { nonce })
            }
            PolicyDecision::Approve | PolicyDecision::ApproveUnpriced { .. } => {
                let return_data = self
                    .invoke(state, request.target, request.value, &request.payload)
                    .await?;
                if let Some(token) = unpriced {
                    state.emit(AccountEvent::FeedNotFound { token });
                }
                Ok(ExecutionOutcome::Executed { return_data })
            }
        }
    }

    /// Park `request` under the next nonce and notify the off-chain side.
    ///
    /// The notification is enqueued before the entry is stored so a closed
    /// channel leaves the ledger untouched.
    fn escalate(
        &self,
        state: &mut AccountState,
        request: TransferRequest,
        valuation: Option<&Valuation>,
        unpriced: Option<Address>,
    ) -> Result<Nonce> {
        let nonce = state.ledger.reserve_nonce()?;

        let amount = valuation
            .map(|v| v.amount)
            .or_else(|| calldata::decode(request.target, &request.payload).amount())
            .unwrap_or_default();
        let fiat = valuation
            .map(|v| v.usd_value.to_string())
            .unwrap_or_else(|| "unpriced".to_string());

        let verification = VerificationRequest::new(
            self.config.policy.subscription_id,
            nonce,
            vec![
                nonce.to_string(),
                request.target.to_string(),
                amount.to_string(),
                fiat.clone(),
            ],
        );
        let request_id = verification.id.clone();
        self.collaborators
            .consumer
            .request_verification(verification)?;

        state.ledger.insert(nonce, request.into(), Utc::now());
        if let Some(token) = unpriced {
            state.emit(AccountEvent::FeedNotFound { token });
        }
        state.emit(AccountEvent::EscalationRequired { nonce });

        info!(
            account = %self.config.address,
            nonce,
            %amount,
            usd_value = %fiat,
            request_id = %request_id,
            "escalation required"
        );
        Ok(nonce)
    }

    /// Call `target`, debiting `value` from the native balance on success
    pub(crate) async fn invoke(
        &self,
        state: &mut AccountState,
        target: Address,
        value: U256,
        payload: &Bytes,
    ) -> Result<Bytes> {
        let Some(remaining) = state.native_balance.checked_sub(value) else {
            warn!(
                %target,
                %value,
                balance = %state.native_balance,
                "call value exceeds native balance"
            );
            return Err(Error::CalleeFailure(Bytes::new()));
        };

        match self
            .collaborators
            .executor
            .call(self.config.address, target, value, payload)
            .await
        {
            Ok(return_data) => {
                state.native_balance = remaining;
                debug!(%target, %value, "call executed");
                Ok(return_data)
            }
            Err(revert) => {
                debug!(%target, revert = %revert, "callee reverted");
                Err(Error::CalleeFailure(revert))
            }
        }
    }
}
