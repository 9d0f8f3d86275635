use anyhow::{Context, Result};
use base64::Engine;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

use super::ImageStore;
use crate::config::CloudinaryConfig;

const UPLOAD_API: &str = "https://api.cloudinary.com/v1_1";

/// Republishes covers to Cloudinary, one asset per ISBN.
///
/// Uploads are signed with SHA-256 when an API secret is configured, and
/// unsigned through `upload_preset` otherwise. Re-uploading the same ISBN
/// overwrites the previous asset.
pub struct CloudinaryStore {
    client: Client,
    config: CloudinaryConfig,
}

impl CloudinaryStore {
    pub fn new(client: Client, config: CloudinaryConfig) -> Self {
        Self { client, config }
    }

    /// Form fields for an upload of `key`, excluding the file itself.
    fn upload_params(&self, key: &str, timestamp: u64) -> Vec<(String, String)> {
        let mut params = vec![("public_id".to_string(), key.to_string())];
        if !self.config.folder.is_empty() {
            params.push(("folder".to_string(), self.config.folder.clone()));
        }

        if self.config.api_secret.is_empty() {
            params.push(("upload_preset".to_string(), self.config.upload_preset.clone()));
            return params;
        }

        params.push(("overwrite".to_string(), "true".to_string()));
        params.push(("timestamp".to_string(), timestamp.to_string()));
        let signature = sign(&params, &self.config.api_secret);
        params.push(("api_key".to_string(), self.config.api_key.clone()));
        params.push(("signature".to_string(), signature));
        params.push(("signature_algorithm".to_string(), "sha256".to_string()));
        params
    }
}

#[async_trait::async_trait]
impl ImageStore for CloudinaryStore {
    fn name(&self) -> &str {
        "Cloudinary"
    }

    async fn store(&self, jpeg: Vec<u8>, key: &str) -> Result<String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?
            .as_secs();

        let mut form = self.upload_params(key, timestamp);
        let data = base64::engine::general_purpose::STANDARD.encode(&jpeg);
        form.push(("file".to_string(), format!("data:image/jpeg;base64,{data}")));

        let url = format!("{UPLOAD_API}/{}/image/upload", self.config.cloud_name);
        let resp = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .context("Cloudinary request failed")?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .context("Failed to read Cloudinary response")?;

        if !status.is_success() {
            anyhow::bail!("Cloudinary API error ({}): {}", status, text);
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).context("Failed to parse Cloudinary response JSON")?;

        json["secure_url"]
            .as_str()
            .map(String::from)
            .context("No secure_url in Cloudinary response")
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, with the API secret appended, then hashed.
fn sign(params: &[(String, String)], secret: &str) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(api_secret: &str, preset: &str) -> CloudinaryStore {
        CloudinaryStore::new(
            Client::new(),
            CloudinaryConfig {
                cloud_name: "demo".into(),
                api_key: "123".into(),
                api_secret: api_secret.into(),
                upload_preset: preset.into(),
                ..CloudinaryConfig::default()
            },
        )
    }

    fn get<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn signature_is_order_independent() {
        let a = vec![
            ("timestamp".to_string(), "1".to_string()),
            ("public_id".to_string(), "x".to_string()),
        ];
        let b: Vec<_> = a.iter().rev().cloned().collect();
        assert_eq!(sign(&a, "s"), sign(&b, "s"));
        assert_ne!(sign(&a, "s"), sign(&a, "t"));
        assert_eq!(sign(&a, "s").len(), 64);
    }

    #[test]
    fn signed_params() {
        let params = store("secret", "").upload_params("9784101010014", 1_700_000_000);
        assert_eq!(get(&params, "public_id"), Some("9784101010014"));
        assert_eq!(get(&params, "folder"), Some("bookscanner"));
        assert_eq!(get(&params, "overwrite"), Some("true"));
        assert_eq!(get(&params, "timestamp"), Some("1700000000"));
        assert_eq!(get(&params, "api_key"), Some("123"));
        assert!(get(&params, "upload_preset").is_none());

        let signed: Vec<(String, String)> = params
            .iter()
            .filter(|(k, _)| ["public_id", "folder", "overwrite", "timestamp"].contains(&k.as_str()))
            .cloned()
            .collect();
        assert_eq!(get(&params, "signature"), Some(sign(&signed, "secret").as_str()));
    }

    #[test]
    fn unsigned_params_use_preset() {
        let params = store("", "covers").upload_params("9784101010014", 0);
        assert_eq!(get(&params, "upload_preset"), Some("covers"));
        assert!(get(&params, "signature").is_none());
        assert!(get(&params, "api_key").is_none());
    }
}
