//! # bookscanner
//!
//! Resolve book metadata by ISBN. Several bibliographic providers (OpenBD, Google Books,
//! Rakuten Books) are queried concurrently and their answers merged, first writer wins,
//! in a fixed priority order. The cover image is screened for placeholders and
//! re-published to an image host. Resolved books can be filed into a Notion database.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bookscanner::config::Config;
//! use bookscanner::isbn;
//! use bookscanner::pipeline::Resolver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load config from file, then let environment variables fill in secrets
//!     let mut config = Config::load(Some("config.json".as_ref()))?;
//!     config.apply_env();
//!
//!     let resolver = Resolver::from_config(&config)?;
//!     let key = isbn::canonical("978-4-10-101001-4")?;
//!
//!     let resolution = resolver.resolve_detailed(&key).await?;
//!     println!("{} / {}", resolution.record.title, resolution.record.author);
//!     for c in &resolution.contributions {
//!         println!("  {} supplied {} field(s)", c.provider, c.fields.len());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Filing into Notion
//!
//! ```rust,no_run
//! use bookscanner::config::Config;
//! use bookscanner::notion::NotionClient;
//! use bookscanner::pipeline::Resolver;
//!
//! # async fn example(config: Config) -> anyhow::Result<()> {
//! let resolver = Resolver::from_config(&config)?;
//! let record = resolver.resolve("9784101010014").await?;
//!
//! let client = bookscanner::providers::http_client(&config.http)?;
//! let outcome = NotionClient::new(client, &config.notion).upsert(&record, None).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Providers
//!
//! | Provider | Key required | Notes |
//! |----------|--------------|-------|
//! | OpenBD | no | Japanese titles, ONIX detail for pages, price, summary |
//! | Google Books | optional | Anonymous quota without a key |
//! | Rakuten Books | application ID | Skipped when no ID is configured |
//!
//! ## Modules
//!
//! - [`config`] — Configuration types, loading/saving, environment overlay
//! - [`cover`] — Placeholder screening and cover re-publishing
//! - [`isbn`] — ISBN-10/13 normalization and checksum validation
//! - [`notion`] — Notion database upsert
//! - [`pipeline`] — The resolver: concurrent fetch and first-writer-wins merge
//! - [`providers`] — Provider trait and the OpenBD, Google Books, Rakuten adapters
//! - [`record`] — Partial and canonical record types
//! - [`server`] — HTTP API

pub mod config;
pub mod cover;
pub mod isbn;
pub mod notion;
pub mod pipeline;
pub mod providers;
pub mod record;
pub mod server;
