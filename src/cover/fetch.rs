use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};

use super::{FetchedImage, ImageFetcher};

/// Some image CDNs refuse requests without a browser-like user agent.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await
            .context("Cover request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Cover server returned {status}");
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = resp.bytes().await.context("Failed to read cover body")?;

        Ok(FetchedImage {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
