//! Settlement Chain Module
//!
//! This module handles everything that touches the on-chain job contract:
//! - SettlementKey: the signing account, loaded from an external key file
//! - JobContract: the consumed contract interface (submit, claim, complete, ...)
//! - EvmJobContract: ethers-rs implementation signing with the settlement key
//! - ChainJobSubmitter: the only part of the interface the distribution run drives

mod contract;
mod evm;
mod key;
mod submitter;

pub use contract::{JobContract, JobStatus, JobView};
pub use evm::EvmJobContract;
pub use key::SettlementKey;
pub use submitter::{ChainJobSubmitter, TaskCountMode};

#[cfg(test)]
pub use contract::MockJobContract;
