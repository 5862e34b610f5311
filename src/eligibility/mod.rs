//! Eligibility Module
//!
//! Decides which users can be paid at all: a user needs at least one wallet
//! on a supported chain saved in their settings.

mod filter;

pub use filter::{EligibilityFilter, WalletKey};
