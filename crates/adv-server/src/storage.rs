//! Upload collaborator for rendered route documents.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use std::time::Duration;

/// Thin client for an HTTP object store: PUT bytes, get back the URL.
pub struct StorageClient {
    client: Client,
    base_url: String,
}

impl StorageClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Store a document and return its retrievable URL.
    pub async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let url = self.object_url(path);
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .context("storage upload failed")?;
        if !response.status().is_success() {
            bail!("storage upload HTTP {}", response.status());
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_url_and_path_cleanly() {
        let client = StorageClient::new("https://store.example.com/bucket/");
        assert_eq!(
            client.object_url("/plans/x.gpx"),
            "https://store.example.com/bucket/plans/x.gpx"
        );
    }
}
