mod google;
mod openbd;
mod rakuten;

pub use google::{GoogleBooksProvider, parse_google_books};
pub use openbd::{OpenBdProvider, parse_openbd};
pub use rakuten::{RakutenBooksProvider, parse_rakuten};

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

use crate::config::{Config, HttpConfig};
use crate::record::PartialRecord;

/// Trait for book metadata sources.
///
/// Implement [`fetch`](MetadataProvider::fetch) to add a source. The resolver
/// only ever calls [`lookup`](MetadataProvider::lookup), which turns every
/// failure into "no contribution" so one broken provider cannot abort a lookup.
///
/// # Example
///
/// ```rust,no_run
/// use bookscanner::providers::{MetadataProvider, OpenBdProvider};
///
/// # async fn example() {
/// let provider = OpenBdProvider::new(reqwest::Client::new(), "https://api.openbd.jp/v1".into());
/// if let Some(partial) = provider.lookup("9784101010014").await {
///     println!("Title: {:?}", partial.title);
/// }
/// # }
/// ```
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// The display name of this provider (e.g., "OpenBD").
    fn name(&self) -> &str;

    /// Query the provider once.
    ///
    /// `Ok(None)` means the provider answered but has no such book.
    async fn fetch(&self, isbn: &str) -> Result<Option<PartialRecord>>;

    /// Query the provider, logging and swallowing any failure.
    async fn lookup(&self, isbn: &str) -> Option<PartialRecord> {
        match self.fetch(isbn).await {
            Ok(Some(partial)) => {
                log::debug!("{} returned data for {isbn}", self.name());
                Some(partial)
            }
            Ok(None) => {
                log::info!("{} has no record for {isbn}", self.name());
                None
            }
            Err(e) => {
                log::warn!("{} unavailable for {isbn}: {e:#}", self.name());
                None
            }
        }
    }
}

/// Build the shared HTTP client with the configured timeout and user agent.
pub fn http_client(http: &HttpConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(http.timeout_secs.max(1)))
        .user_agent(http.user_agent.clone())
        .build()
        .context("Failed to build HTTP client")
}

/// Build the provider chain from configuration, in priority order.
///
/// Providers that are disabled or missing required credentials are skipped.
///
/// # Example
///
/// ```rust,no_run
/// use bookscanner::config::Config;
/// use bookscanner::providers::{build_provider_chain, http_client};
///
/// let config = Config::default();
/// let client = http_client(&config.http).unwrap();
/// let providers = build_provider_chain(&config, &client);
/// println!("Configured {} providers", providers.len());
/// ```
pub fn build_provider_chain(config: &Config, client: &Client) -> Vec<Box<dyn MetadataProvider>> {
    let mut providers: Vec<Box<dyn MetadataProvider>> = Vec::new();

    for name in &config.provider_order {
        match name.as_str() {
            "openbd" if config.providers.openbd.enabled => {
                providers.push(Box::new(OpenBdProvider::new(
                    client.clone(),
                    config.providers.openbd.base_url.clone(),
                )));
            }
            "google" if config.providers.google.enabled => {
                if config.providers.google.api_key.is_empty() {
                    log::debug!("Google Books has no API key; using anonymous quota");
                }
                providers.push(Box::new(GoogleBooksProvider::new(
                    client.clone(),
                    config.providers.google.base_url.clone(),
                    config.providers.google.api_key.clone(),
                )));
            }
            "rakuten" if config.providers.rakuten.enabled => {
                if config.providers.rakuten.application_id.is_empty() {
                    log::warn!("Rakuten Books enabled but no application ID configured");
                    continue;
                }
                providers.push(Box::new(RakutenBooksProvider::new(
                    client.clone(),
                    config.providers.rakuten.base_url.clone(),
                    config.providers.rakuten.application_id.clone(),
                )));
            }
            "openbd" | "google" | "rakuten" => {}
            other => log::warn!("Unknown provider in provider_order: {other}"),
        }
    }

    providers
}

/// Send a request and parse the JSON body, failing on non-success status.
async fn fetch_json(request: RequestBuilder, provider: &str) -> Result<Value> {
    let resp = request
        .send()
        .await
        .with_context(|| format!("{provider} request failed"))?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .with_context(|| format!("Failed to read {provider} response"))?;

    if !status.is_success() {
        anyhow::bail!("{provider} API error ({status}): {text}");
    }

    serde_json::from_str(&text).with_context(|| format!("Failed to parse {provider} response JSON"))
}

/// Treat a bare object as a one-element list. Upstream payloads use both shapes.
fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Read a JSON scalar as a string. Numbers are stringified; anything else is absent.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
