//! This crate computes what each eligible user is owed since their last completed
//! payout, groups those obligations into bounded batches, publishes each batch as a
//! content-addressed manifest and submits a matching job to the on-chain job contract.

pub mod types; // Ledger records, obligations, batches, manifests and receipts.
pub mod error; // Error types for each collaborator and for the run as a whole.
pub mod config; // Defines and loads distributor configuration.
pub mod ledger; // Ledger persistence and per-user delta computation.
pub mod users; // Source of accounts and their settings.
pub mod eligibility; // Wallet-based eligibility filtering.
pub mod batch; // Batching and the distribution run itself.
pub mod manifest; // Manifest serialization and content-addressed publishing.
pub mod chain; // Settlement key, job contract client and job submission.

// Re-export commonly used types and configurations for easier access.
pub use types::*;
pub use config::Config;
pub use batch::DistributionOrchestrator;
