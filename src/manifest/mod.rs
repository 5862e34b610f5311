//! Manifest Module
//!
//! Turns a batch into a content-addressed manifest:
//! - ContentStore: seam to the content-addressed store
//! - IpfsClient: IPFS HTTP API implementation
//! - ManifestPublisher: serializes a batch and publishes it through an injected store

mod ipfs;
mod publisher;
mod store;

pub use ipfs::IpfsClient;
pub use publisher::ManifestPublisher;
pub use store::{ContentStore, StoredContent};

#[cfg(test)]
pub use store::MockContentStore;

/// Deterministic stand-in for a content identifier
#[cfg(test)]
pub(crate) fn sha256_content_id(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("sha256-{}", hex::encode(Sha256::digest(data)))
}
