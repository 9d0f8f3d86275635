use anyhow::Result;
use reqwest::Client;
use serde_json::Value;

use super::{MetadataProvider, fetch_json, text};
use crate::record::PartialRecord;

/// `imageLinks` keys, highest resolution first.
const IMAGE_LINK_KEYS: &[&str] = &["extraLarge", "large", "medium", "thumbnail", "smallThumbnail"];

pub struct GoogleBooksProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GoogleBooksProvider {
    pub fn new(client: Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl MetadataProvider for GoogleBooksProvider {
    fn name(&self) -> &str {
        "Google Books"
    }

    async fn fetch(&self, isbn: &str) -> Result<Option<PartialRecord>> {
        let url = format!("{}/volumes", self.base_url.trim_end_matches('/'));
        let mut request = self.client.get(&url).query(&[("q", format!("isbn:{isbn}"))]);
        if !self.api_key.is_empty() {
            request = request.query(&[("key", &self.api_key)]);
        }

        let body = fetch_json(request, "Google Books").await?;
        Ok(parse_google_books(&body))
    }
}

/// Extract a [`PartialRecord`] from a Google Books `volumes` search response.
pub fn parse_google_books(body: &Value) -> Option<PartialRecord> {
    if body["totalItems"].as_u64().unwrap_or(0) == 0 {
        return None;
    }
    let info = &body["items"].as_array()?.first()?["volumeInfo"];
    if !info.is_object() {
        return None;
    }

    Some(PartialRecord {
        title: text(&info["title"]),
        author: info["authors"].as_array().map(|authors| {
            authors
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        }),
        publisher: text(&info["publisher"]),
        pub_date: text(&info["publishedDate"]).map(|d| d.replace('-', "")),
        pages: info["pageCount"].as_u64().map(|n| n.to_string()),
        price: None,
        summary: text(&info["description"]),
        cover: best_image_link(&info["imageLinks"]),
    })
}

fn best_image_link(links: &Value) -> Option<String> {
    IMAGE_LINK_KEYS
        .iter()
        .find_map(|key| links[*key].as_str())
        .map(force_https)
}

fn force_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn volume(info: Value) -> Value {
        json!({"totalItems": 1, "items": [{"volumeInfo": info}]})
    }

    #[test]
    fn parse_volume_info() {
        let body = volume(json!({
            "title": "Ignored",
            "authors": ["Jane Doe", "John Roe"],
            "publisher": "Pub",
            "publishedDate": "2023-01-15",
            "description": "A book.",
            "pageCount": 312
        }));
        let p = parse_google_books(&body).unwrap();
        assert_eq!(p.title.as_deref(), Some("Ignored"));
        assert_eq!(p.author.as_deref(), Some("Jane Doe, John Roe"));
        assert_eq!(p.publisher.as_deref(), Some("Pub"));
        assert_eq!(p.pub_date.as_deref(), Some("20230115"));
        assert_eq!(p.summary.as_deref(), Some("A book."));
        assert_eq!(p.pages.as_deref(), Some("312"));
        assert!(p.price.is_none());
        assert!(p.cover.is_none());
    }

    #[test]
    fn zero_results_is_not_found() {
        assert!(parse_google_books(&json!({"kind": "books#volumes", "totalItems": 0})).is_none());
        assert!(parse_google_books(&json!({})).is_none());
    }

    #[test]
    fn cover_prefers_highest_resolution() {
        let body = volume(json!({"imageLinks": {
            "smallThumbnail": "http://books.google.com/s",
            "thumbnail": "http://books.google.com/t",
            "large": "http://books.google.com/l"
        }}));
        let p = parse_google_books(&body).unwrap();
        assert_eq!(p.cover.as_deref(), Some("https://books.google.com/l"));
    }

    #[test]
    fn cover_keeps_https() {
        let body = volume(json!({"imageLinks": {"thumbnail": "https://books.google.com/t"}}));
        assert_eq!(
            parse_google_books(&body).unwrap().cover.as_deref(),
            Some("https://books.google.com/t")
        );
    }

    #[test]
    fn published_year_only() {
        let body = volume(json!({"publishedDate": "2009"}));
        assert_eq!(parse_google_books(&body).unwrap().pub_date.as_deref(), Some("2009"));
    }
}
