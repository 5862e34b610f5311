//! Content Store Module
//!
//! The seam between manifest publishing and whatever content-addressed store
//! holds the bytes.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the store hands back for an uploaded blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredContent {
    /// Content identifier, a deterministic function of the bytes
    pub content_id: String,
    pub display_name: String,
}

/// Content-addressed blob storage
///
/// Uploading identical bytes twice must return the same identifier; that is a
/// property of the store and is not re-checked here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, data: Vec<u8>, name: &str) -> Result<StoredContent, StoreError>;
}
