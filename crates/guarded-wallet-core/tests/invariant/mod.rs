//! Invariant tests module
//!
//! This module contains tests that verify critical invariants:
//! - Escalation nonces advance once per escalation
//! - Ledger entries are retrievable and never rewritten
//! - Owner and guardian stay fixed

pub mod account_invariant;
