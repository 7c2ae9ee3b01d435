//! Ledger of escalated transactions awaiting guardian approval
//!
//! Entries are keyed by a monotonically increasing nonce and are never
//! deleted by the account itself: approval only marks them. A slot that was
//! never escalated reads back as an empty [`PendingTransaction`], which
//! callers detect through [`PendingTransaction::is_empty`].
//!
//! Retention is left to the host. [`PausedTransactionLedger::prune_approved`]
//! drops resolved entries for hosts that want bounded growth.

use crate::types::{Nonce, PendingTransaction};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of an escalated entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Waiting for the guardian
    Pending,
    /// Approved and executed at least once
    Approved,
}

/// One escalated transaction and its approval history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The escalated request
    pub transaction: PendingTransaction,
    /// Current status
    pub status: EntryStatus,
    /// Number of successful approvals
    pub approvals: u32,
    /// Escalation timestamp
    pub created_at: DateTime<Utc>,
    /// Timestamp of the latest approval
    pub last_approved_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    fn new(transaction: PendingTransaction, now: DateTime<Utc>) -> Self {
        Self {
            transaction,
            status: EntryStatus::Pending,
            approvals: 0,
            created_at: now,
            last_approved_at: None,
        }
    }

    /// Whether the entry is older than `ttl_secs` at `now`.
    ///
    /// A TTL too large to represent never expires.
    pub fn is_expired(&self, ttl_secs: u64, now: DateTime<Utc>) -> bool {
        let Some(ttl) = i64::try_from(ttl_secs).ok().and_then(Duration::try_seconds) else {
            return false;
        };
        self.created_at
            .checked_add_signed(ttl)
            .is_some_and(|deadline| now > deadline)
    }
}

/// Nonce-indexed store of escalated transactions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PausedTransactionLedger {
    entries: BTreeMap<Nonce, LedgerEntry>,
    next_nonce: Nonce,
}

impl PausedTransactionLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// The nonce the next escalation will receive, without consuming it.
    ///
    /// Fails if the counter cannot advance past it.
    pub fn reserve_nonce(&self) -> Result<Nonce> {
        self.next_nonce
            .checked_add(1)
            .ok_or(Error::ArithmeticOverflow("escalation nonce"))?;
        Ok(self.next_nonce)
    }

    /// Current value of the nonce counter
    pub fn nonce_counter(&self) -> Nonce {
        self.next_nonce
    }

    /// Store `transaction` under `nonce` and advance the counter past it
    pub fn insert(&mut self, nonce: Nonce, transaction: PendingTransaction, now: DateTime<Utc>) {
        self.entries
            .insert(nonce, LedgerEntry::new(transaction, now));
        self.next_nonce = self.next_nonce.max(nonce.saturating_add(1));
    }

    /// Transaction stored under `nonce`, or the empty transaction
    pub fn get(&self, nonce: Nonce) -> PendingTransaction {
        self.entries
            .get(&nonce)
            .map(|entry| entry.transaction.clone())
            .unwrap_or_default()
    }

    /// Full entry stored under `nonce`
    pub fn entry(&self, nonce: Nonce) -> Option<&LedgerEntry> {
        self.entries.get(&nonce)
    }

    /// Mark `nonce` as approved once more
    pub fn record_approval(&mut self, nonce: Nonce, now: DateTime<Utc>) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&nonce)
            .ok_or(Error::UnknownNonce(nonce))?;
        entry.status = EntryStatus::Approved;
        entry.approvals = entry.approvals.saturating_add(1);
        entry.last_approved_at = Some(now);
        Ok(())
    }

    /// Nonces still waiting for the guardian, in escalation order
    pub fn pending(&self) -> impl Iterator<Item = (Nonce, &LedgerEntry)> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.status == EntryStatus::Pending)
            .map(|(nonce, entry)| (*nonce, entry))
    }

    /// Drop every approved entry; returns how many were removed
    pub fn prune_approved(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.status != EntryStatus::Approved);
        before - self.entries.len()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
