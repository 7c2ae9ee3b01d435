//! Price-threshold policy for guarded accounts
//!
//! The policy decides whether a request must be escalated to the guardian.
//! Only direct token `transfer`/`approve` payloads are priced; their amount
//! is converted to whole fiat units through the token's price feed and
//! compared against a ceiling.
//!
//! ## Valuation
//!
//! ```text
//! usd_value = amount * price / 10^(token_decimals + feed_decimals)
//! ```
//!
//! All arithmetic is unsigned, checked and truncating. Non-positive feed
//! answers are rejected rather than reinterpreted.
//!
//! ## Missing pricing data
//!
//! A missing or reverting feed cannot be evaluated. What happens then is set
//! by [`FeedFailureMode`]: `FailOpen` lets the request through unescalated,
//! `FailClosed` escalates it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use guarded_wallet_core::policy::{PolicyConfig, PriceThresholdPolicy};
//!
//! let policy = PriceThresholdPolicy::new(
//!     PolicyConfig::default().with_usd_ceiling(U256::from(1_000)),
//! );
//! let decision = policy.evaluate(&request, feeds.as_ref(), tokens.as_ref()).await?;
//! ```

use crate::calldata;
use crate::external::{PriceFeedRegistry, TokenLedger};
use crate::{Error, Result, TransferRequest};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default ceiling, in whole fiat units
pub const DEFAULT_USD_CEILING: u64 = 1_000;

/// Decision from policy evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyDecision {
    /// Below the ceiling, or not a priced operation
    Approve,
    /// Pricing data unavailable and the policy fails open
    ApproveUnpriced { token: Address, reason: String },
    /// Guardian approval required
    RequireAdditionalApproval {
        reason: String,
        valuation: Option<Valuation>,
    },
}

impl PolicyDecision {
    /// Check if the request may execute immediately
    pub fn is_approved(&self) -> bool {
        matches!(
            self,
            PolicyDecision::Approve | PolicyDecision::ApproveUnpriced { .. }
        )
    }

    /// Check if the decision requires guardian approval
    pub fn requires_additional_approval(&self) -> bool {
        matches!(self, PolicyDecision::RequireAdditionalApproval { .. })
    }

    /// Whether the decision was reached without pricing data
    pub fn is_unpriced(&self) -> bool {
        matches!(
            self,
            PolicyDecision::ApproveUnpriced { .. }
                | PolicyDecision::RequireAdditionalApproval {
                    valuation: None,
                    ..
                }
        )
    }

    /// Valuation behind the decision, if one was computed
    pub fn valuation(&self) -> Option<&Valuation> {
        match self {
            PolicyDecision::RequireAdditionalApproval { valuation, .. } => valuation.as_ref(),
            _ => None,
        }
    }
}

/// Inputs and result of one fiat valuation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub token: Address,
    pub amount: U256,
    pub price: U256,
    pub token_decimals: u8,
    pub feed_decimals: u8,
    pub usd_value: U256,
}

/// What to do when a price feed is missing or reverts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedFailureMode {
    /// Execute without escalation and emit a notice
    #[default]
    FailOpen,
    /// Escalate to the guardian
    FailClosed,
}

/// Escalation policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Fiat ceiling in whole units; values at or above it escalate
    pub usd_ceiling: U256,
    /// Behaviour when pricing data is unavailable
    pub feed_failure_mode: FeedFailureMode,
    /// Reject a second approval of the same escalation
    pub replay_protection: bool,
    /// Age after which a pending escalation can no longer be approved
    pub pending_ttl_secs: Option<u64>,
    /// Subscription billed for off-chain verification requests
    pub subscription_id: u64,
    /// Whether escalation is enabled at all
    pub enabled: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            usd_ceiling: U256::from(DEFAULT_USD_CEILING),
            feed_failure_mode: FeedFailureMode::FailOpen,
            replay_protection: false,
            pending_ttl_secs: None,
            subscription_id: 0,
            enabled: true,
        }
    }
}

impl PolicyConfig {
    /// Create a new policy config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable escalation entirely (use with caution!)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the fiat ceiling
    pub fn with_usd_ceiling(mut self, ceiling: U256) -> Self {
        self.usd_ceiling = ceiling;
        self
    }

    /// Set the feed failure mode
    pub fn with_feed_failure_mode(mut self, mode: FeedFailureMode) -> Self {
        self.feed_failure_mode = mode;
        self
    }

    /// Enable or disable approval replay protection
    pub fn with_replay_protection(mut self, enabled: bool) -> Self {
        self.replay_protection = enabled;
        self
    }

    /// Expire pending escalations after `secs`
    pub fn with_pending_ttl_secs(mut self, secs: u64) -> Self {
        self.pending_ttl_secs = Some(secs);
        self
    }

    /// Set the off-chain subscription ID
    pub fn with_subscription_id(mut self, id: u64) -> Self {
        self.subscription_id = id;
        self
    }
}

/// Evaluates requests against the fiat ceiling
#[derive(Debug, Clone)]
pub struct PriceThresholdPolicy {
    config: PolicyConfig,
}

impl PriceThresholdPolicy {
    /// Create a new policy
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Get the current policy configuration
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Evaluate a request.
    ///
    /// Fails only when the target cannot report token decimals, the feed
    /// reports a non-positive price, or the valuation overflows.
    pub async fn evaluate(
        &self,
        request: &TransferRequest,
        feeds: &dyn PriceFeedRegistry,
        tokens: &dyn TokenLedger,
    ) -> Result<PolicyDecision> {
        if !self.config.enabled {
            return Ok(PolicyDecision::Approve);
        }

        let operation = calldata::decode(request.target, &request.payload);
        let Some(amount) = operation.amount() else {
            debug!(target = %request.target, "payload is not a token transfer or approval");
            return Ok(PolicyDecision::Approve);
        };

        let Some(feed) = feeds.feed_for(request.target).await else {
            return Ok(self.feed_unavailable(request.target, "no price feed registered".into()));
        };

        let answer = match feed.latest_price().await {
            Ok(answer) => answer,
            Err(e) => return Ok(self.feed_unavailable(request.target, e.to_string())),
        };
        let feed_decimals = match feed.decimals().await {
            Ok(decimals) => decimals,
            Err(e) => return Ok(self.feed_unavailable(request.target, e.to_string())),
        };

        if answer <= 0 {
            return Err(Error::NonPositivePrice {
                feed: feed.address(),
                answer,
            });
        }
        let price = U256::from(answer.unsigned_abs());

        let token_decimals = tokens.decimals(request.target).await?;
        let usd_value = usd_value(amount, price, token_decimals, feed_decimals)?;

        debug!(
            token = %request.target,
            %amount,
            %price,
            %usd_value,
            ceiling = %self.config.usd_ceiling,
            "valued token operation"
        );

        if usd_value < self.config.usd_ceiling {
            return Ok(PolicyDecision::Approve);
        }

        Ok(PolicyDecision::RequireAdditionalApproval {
            reason: format!(
                "Operation value {} meets or exceeds ceiling {}",
                usd_value, self.config.usd_ceiling
            ),
            valuation: Some(Valuation {
                token: request.target,
                amount,
                price,
                token_decimals,
                feed_decimals,
                usd_value,
            }),
        })
    }

    fn feed_unavailable(&self, token: Address, reason: String) -> PolicyDecision {
        warn!(%token, %reason, mode = ?self.config.feed_failure_mode, "price feed unavailable");
        match self.config.feed_failure_mode {
            FeedFailureMode::FailOpen => PolicyDecision::ApproveUnpriced { token, reason },
            FeedFailureMode::FailClosed => PolicyDecision::RequireAdditionalApproval {
                reason: format!("Price feed unavailable for {}: {}", token, reason),
                valuation: None,
            },
        }
    }
}

/// Whole fiat units of `amount` tokens at `price`.
///
/// Truncates; fails with `ArithmeticOverflow` rather than wrapping.
pub fn usd_value(amount: U256, price: U256, token_decimals: u8, feed_decimals: u8) -> Result<U256> {
    let exponent = u64::from(token_decimals) + u64::from(feed_decimals);
    let scale = U256::from(10u8)
        .checked_pow(U256::from(exponent))
        .ok_or(Error::ArithmeticOverflow("decimal scale"))?;

    amount
        .checked_mul(price)
        .ok_or(Error::ArithmeticOverflow("amount * price"))?
        .checked_div(scale)
        .ok_or(Error::ArithmeticOverflow("decimal scale"))
}
