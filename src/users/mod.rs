//! User Source Module
//!
//! Supplies the accounts swept by a distribution run together with their
//! settings. The pipeline only reads from it.

mod source;

pub use source::{SqliteUserSource, UserSource};

#[cfg(test)]
pub use source::MockUserSource;
