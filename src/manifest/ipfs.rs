//! IPFS Content Store
//!
//! Uploads manifests through the IPFS node's HTTP RPC (`/api/v0/add`).

use super::{ContentStore, StoredContent};
use crate::error::StoreError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

/// Response body of `/api/v0/add`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddResponse {
    name: String,
    hash: String,
}

/// Client for an IPFS node's HTTP API
///
/// Constructed once per run and injected into the publisher.
#[derive(Debug, Clone)]
pub struct IpfsClient {
    http: reqwest::Client,
    api_url: String,
}

impl IpfsClient {
    /// # Arguments
    /// * `api_url` - Base URL of the node's API (e.g., "http://localhost:5001")
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    pub fn with_client(http: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { http, api_url }
    }

    fn add_url(&self) -> String {
        format!("{}/api/v0/add", self.api_url)
    }
}

#[async_trait]
impl ContentStore for IpfsClient {
    async fn put(&self, data: Vec<u8>, name: &str) -> Result<StoredContent, StoreError> {
        let size = data.len();
        let part = Part::bytes(data)
            .file_name(name.to_string())
            .mime_str("application/json")?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.add_url())
            .query(&[("pin", "true")])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let added: AddResponse = response.json().await?;
        debug!(cid = %added.hash, name = %added.name, size, "Uploaded manifest to IPFS");

        Ok(StoredContent {
            content_id: added.hash,
            display_name: added.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_url_ignores_trailing_slash() {
        let client = IpfsClient::new("http://localhost:5001/");

        assert_eq!(client.add_url(), "http://localhost:5001/api/v0/add");
    }

    #[test]
    fn test_add_response_parses_node_output() {
        let body = r#"{"Name":"payments-batch-0.json","Hash":"QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG","Size":"17"}"#;

        let parsed: AddResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.name, "payments-batch-0.json");
        assert_eq!(parsed.hash, "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
    }
}
