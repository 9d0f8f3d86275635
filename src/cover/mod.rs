//! Cover image screening and republishing.
//!
//! Provider cover URLs are frequently "no image available" stand-ins. The
//! [`CoverProcessor`] screens a URL through a [`RuleChain`], fetches and
//! decodes the image, re-encodes it as JPEG, and hands it to an
//! [`ImageStore`]. Any failure along the way yields the deterministic fallback
//! URL instead of an error; a lookup never fails because of its cover.

mod cloudinary;
mod fetch;
mod rules;

pub use cloudinary::CloudinaryStore;
pub use fetch::HttpImageFetcher;
pub use rules::{PlaceholderRule, RuleChain, Subject};

use anyhow::Result;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use reqwest::Client;
use thiserror::Error;

use crate::config::{CoverConfig, HostingConfig};

/// A downloaded image payload.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FetchedImage {
    pub fn is_image(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// Downloads cover images.
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch `url`, failing on transport errors and non-success status.
    async fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

/// Hosts republished covers.
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    fn name(&self) -> &str;
    /// Store JPEG bytes under `key` and return the URL they are served from.
    async fn store(&self, jpeg: Vec<u8>, key: &str) -> Result<String>;
}

/// Why a cover was not republished.
#[derive(Debug, Error)]
pub enum CoverError {
    #[error("placeholder rejected by {rule}: {reason}")]
    Rejected { rule: &'static str, reason: String },
    #[error("cover fetch failed: {0:#}")]
    Fetch(anyhow::Error),
    #[error("cover decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("cover re-encode failed: {0}")]
    Encode(String),
    #[error("cover upload failed: {0:#}")]
    Upload(anyhow::Error),
}

/// Screens and republishes cover images.
///
/// # Example
///
/// ```rust,no_run
/// use bookscanner::config::Config;
/// use bookscanner::cover::CoverProcessor;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::default();
/// let client = reqwest::Client::new();
/// let covers = CoverProcessor::from_config(&config.cover, &config.hosting, &client);
///
/// let url = covers.process("https://cover.openbd.jp/9784101010014.jpg", "9784101010014").await;
/// println!("Cover: {url}");
/// # Ok(())
/// # }
/// ```
pub struct CoverProcessor {
    rules: RuleChain,
    fetcher: Box<dyn ImageFetcher>,
    store: Option<Box<dyn ImageStore>>,
    fallback_base: String,
    jpeg_quality: u8,
}

impl CoverProcessor {
    pub fn new(
        config: &CoverConfig,
        fetcher: Box<dyn ImageFetcher>,
        store: Option<Box<dyn ImageStore>>,
    ) -> Self {
        Self {
            rules: RuleChain::from_config(config),
            fetcher,
            store,
            fallback_base: config.fallback_base.clone(),
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
        }
    }

    /// Wire the HTTP fetcher and, when credentials are present, Cloudinary.
    pub fn from_config(cover: &CoverConfig, hosting: &HostingConfig, client: &Client) -> Self {
        let store: Option<Box<dyn ImageStore>> = if hosting.cloudinary.is_usable() {
            Some(Box::new(CloudinaryStore::new(
                client.clone(),
                hosting.cloudinary.clone(),
            )))
        } else {
            log::debug!("No image host configured; accepted covers pass through unchanged");
            None
        };
        Self::new(cover, Box::new(HttpImageFetcher::new(client.clone())), store)
    }

    /// Replace the rule chain.
    pub fn with_rules(mut self, rules: RuleChain) -> Self {
        self.rules = rules;
        self
    }

    /// `<fallback_base>/<isbn>.jpg`
    pub fn fallback_url(&self, isbn: &str) -> String {
        format!("{}/{isbn}.jpg", self.fallback_base.trim_end_matches('/'))
    }

    /// Screen and republish `url`. Never fails: any problem yields the fallback URL.
    pub async fn process(&self, url: &str, isbn: &str) -> String {
        match self.republish(url, isbn).await {
            Ok(served) => {
                log::info!("Cover for {isbn}: {served}");
                served
            }
            Err(e @ CoverError::Rejected { .. }) => {
                log::info!("Cover for {isbn} not used ({url}): {e}");
                self.fallback_url(isbn)
            }
            Err(e) => {
                log::warn!("Cover for {isbn} not used ({url}): {e}");
                self.fallback_url(isbn)
            }
        }
    }

    /// The fallible part of [`process`](Self::process).
    pub async fn republish(&self, url: &str, isbn: &str) -> Result<String, CoverError> {
        self.screen(Subject::Url(url))?;

        let fetched = self.fetcher.fetch(url).await.map_err(CoverError::Fetch)?;
        if !fetched.is_image() {
            return Err(CoverError::Rejected {
                rule: "content-type",
                reason: format!("content type {:?} is not an image", fetched.content_type),
            });
        }
        self.screen(Subject::Bytes(&fetched.bytes))?;

        let img = image::load_from_memory(&fetched.bytes)?;
        self.screen(Subject::Image(&img))?;

        let Some(store) = &self.store else {
            return Ok(url.to_string());
        };

        let jpeg = encode_jpeg(&img, self.jpeg_quality)?;
        log::debug!("Uploading {} byte cover for {isbn} to {}", jpeg.len(), store.name());
        store.store(jpeg, isbn).await.map_err(CoverError::Upload)
    }

    fn screen(&self, subject: Subject<'_>) -> Result<(), CoverError> {
        match self.rules.screen(subject) {
            Some((rule, reason)) => Err(CoverError::Rejected { rule, reason }),
            None => Ok(()),
        }
    }
}

/// Re-encode as baseline JPEG at the given quality.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CoverError> {
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(&rgb)
        .map_err(|e| CoverError::Encode(e.to_string()))?;
    Ok(buffer)
}
