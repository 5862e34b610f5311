//! Manifest Publisher Module
//!
//! Serializes a batch (one plain entry per obligation, in batch order) and
//! publishes the bytes to the content-addressed store. A publish failure is
//! fatal for the run; nothing is retried here.

use super::ContentStore;
use crate::error::StoreError;
use crate::{Batch, Manifest, ManifestEntry};
use std::sync::Arc;
use tracing::info;

/// Publishes batches through an explicitly injected store client
#[derive(Clone)]
pub struct ManifestPublisher {
    store: Arc<dyn ContentStore>,
}

impl ManifestPublisher {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Serialized manifest bytes for a batch
    ///
    /// Identical batches always produce identical bytes: entries keep batch
    /// order and wallet maps are ordered by chain name.
    pub fn encode(batch: &Batch) -> Result<Vec<u8>, StoreError> {
        let entries: Vec<ManifestEntry> = batch.obligations.iter().map(ManifestEntry::from).collect();
        Ok(serde_json::to_vec(&entries)?)
    }

    /// File name given to the uploaded manifest
    pub fn manifest_name(batch: &Batch) -> String {
        format!("payments-batch-{}.json", batch.index)
    }

    /// Publish a batch and return its manifest
    ///
    /// # Errors
    /// Serialization or store failures; the caller treats either as fatal.
    pub async fn publish(&self, batch: &Batch) -> Result<Manifest, StoreError> {
        let bytes = Self::encode(batch)?;
        let stored = self.store.put(bytes, &Self::manifest_name(batch)).await?;

        info!(
            "Published manifest {} for batch #{} ({} obligations)",
            stored.content_id,
            batch.index,
            batch.len()
        );

        Ok(Manifest {
            id: stored.content_id,
            name: stored.display_name,
            batch_index: batch.index,
            entry_count: batch.len(),
        })
    }
}
