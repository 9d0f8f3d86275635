use anyhow::Result;
use futures::future::join_all;
use thiserror::Error;

use crate::config::Config;
use crate::cover::CoverProcessor;
use crate::providers::{self, MetadataProvider};
use crate::record::{CanonicalRecord, Field};

/// The only error a lookup surfaces to its caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no book metadata could be resolved for ISBN {isbn}")]
    NotFound { isbn: String },
}

/// Which fields one provider ended up supplying to the merged record.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub provider: String,
    pub fields: Vec<Field>,
}

/// A resolved record together with per-provider provenance.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub record: CanonicalRecord,
    pub contributions: Vec<Contribution>,
    /// The provider cover URL before screening, if any provider supplied one.
    pub original_cover: Option<String>,
}

/// Resolves an ISBN into a [`CanonicalRecord`].
///
/// Providers are queried concurrently, but their results are always merged
/// in the configured priority order: a field is taken from the first
/// provider (by priority, not by arrival) that has a non-empty value for it.
///
/// # Example
///
/// ```rust,no_run
/// use bookscanner::config::Config;
/// use bookscanner::pipeline::Resolver;
///
/// # async fn example() -> anyhow::Result<()> {
/// let mut config = Config::load(Some("config.json".as_ref()))?;
/// config.apply_env();
///
/// let resolver = Resolver::from_config(&config)?;
/// match resolver.resolve("9784101010014").await {
///     Ok(book) => println!("{} / {}", book.title, book.author),
///     Err(e) => eprintln!("{e}"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct Resolver {
    providers: Vec<Box<dyn MetadataProvider>>,
    covers: Option<CoverProcessor>,
}

impl Resolver {
    /// `providers` must already be in priority order.
    pub fn new(providers: Vec<Box<dyn MetadataProvider>>, covers: Option<CoverProcessor>) -> Self {
        Self { providers, covers }
    }

    /// Build the provider chain and cover processor from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = providers::http_client(&config.http)?;
        let chain = providers::build_provider_chain(config, &client);
        if chain.is_empty() {
            log::warn!("No metadata providers enabled; every lookup will be not found");
        }
        let covers = config
            .cover
            .enabled
            .then(|| CoverProcessor::from_config(&config.cover, &config.hosting, &client));
        Ok(Self::new(chain, covers))
    }

    /// Drop cover processing; provider cover URLs are returned as-is.
    pub fn without_covers(mut self) -> Self {
        self.covers = None;
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve `isbn` (already normalized) into a merged record.
    pub async fn resolve(&self, isbn: &str) -> Result<CanonicalRecord, LookupError> {
        self.resolve_detailed(isbn).await.map(|r| r.record)
    }

    /// Like [`resolve`](Self::resolve), but also reports which provider filled which fields.
    pub async fn resolve_detailed(&self, isbn: &str) -> Result<Resolution, LookupError> {
        let results = join_all(self.providers.iter().map(|p| p.lookup(isbn))).await;

        let mut record = CanonicalRecord::new(isbn);
        let mut contributions = Vec::new();
        for (provider, partial) in self.providers.iter().zip(results) {
            let Some(partial) = partial else { continue };
            let fields = record.merge(&partial);
            log::debug!(
                "{} filled [{}] for {isbn}",
                provider.name(),
                fields.iter().map(|f| f.name()).collect::<Vec<_>>().join(", ")
            );
            contributions.push(Contribution {
                provider: provider.name().to_string(),
                fields,
            });
        }

        if !record.is_found() {
            return Err(LookupError::NotFound {
                isbn: isbn.to_string(),
            });
        }

        let original_cover = (!record.cover.is_empty()).then(|| record.cover.clone());
        if let (Some(covers), Some(url)) = (&self.covers, &original_cover) {
            record.set_cover(covers.process(url, isbn).await);
        }

        Ok(Resolution {
            record,
            contributions,
            original_cover,
        })
    }
}
