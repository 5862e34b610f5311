//! Ledger Module
//!
//! This module owns the durable side of a distribution run:
//! - LedgerStore: persistence seam for ledger records and submission intents
//! - SqliteLedger: SQLite-backed store
//! - LedgerDeltaCalculator: derives each user's amount for the cycle

mod calculator;
mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use calculator::{LedgerDeltaCalculator, baseline_earned_amount};
pub use store::{LedgerStore, SqliteLedger};
