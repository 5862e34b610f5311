//! Batch Module
//!
//! This module handles batching and the run that drives it:
//! - PaymentBatcher: Splits ordered obligations into bounded batches
//! - DistributionOrchestrator: Sweeps users, batches, publishes and submits

mod engine;
pub mod orchestrator;


pub use engine::PaymentBatcher;
pub use orchestrator::DistributionOrchestrator;
