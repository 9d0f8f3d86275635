//! Filing resolved books into a Notion database.
//!
//! A book is keyed by its ISBN property: an existing page with the same ISBN
//! is updated in place, otherwise a new page is created.

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::config::{NotionConfig, NotionProperties};
use crate::record::CanonicalRecord;

const API_BASE: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Notion caps a single rich-text segment at 2000 characters.
const RICH_TEXT_LIMIT: usize = 2000;

/// Reader's notes attached when filing a book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Review {
    pub rating: Option<f64>,
    pub comment: Option<String>,
}

/// What [`NotionClient::upsert`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "page_id", rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created(String),
    Updated(String),
}

pub struct NotionClient {
    client: Client,
    base_url: String,
    token: String,
    database_id: String,
    properties: NotionProperties,
}

impl NotionClient {
    pub fn new(client: Client, config: &NotionConfig) -> Self {
        Self {
            client,
            base_url: API_BASE.to_string(),
            token: config.token.clone(),
            database_id: config.database_id.clone(),
            properties: config.properties.clone(),
        }
    }

    /// Point at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create or update the page for `record`.
    pub async fn upsert(
        &self,
        record: &CanonicalRecord,
        review: Option<&Review>,
    ) -> Result<UpsertOutcome> {
        let properties = page_properties(record, review, &self.properties);

        match self.find_by_isbn(&record.isbn).await? {
            Some(page_id) => {
                let url = format!("{}/pages/{page_id}", self.base_url);
                self.send(
                    self.client
                        .patch(&url)
                        .json(&json!({ "properties": properties })),
                )
                .await?;
                log::info!("Updated Notion page {page_id} for {}", record.isbn);
                Ok(UpsertOutcome::Updated(page_id))
            }
            None => {
                let url = format!("{}/pages", self.base_url);
                let body = json!({
                    "parent": { "database_id": self.database_id },
                    "properties": properties,
                });
                let created = self.send(self.client.post(&url).json(&body)).await?;
                let page_id = page_id(&created)?;
                log::info!("Created Notion page {page_id} for {}", record.isbn);
                Ok(UpsertOutcome::Created(page_id))
            }
        }
    }

    /// The ID of the first page whose ISBN property equals `isbn`.
    pub async fn find_by_isbn(&self, isbn: &str) -> Result<Option<String>> {
        let url = format!("{}/databases/{}/query", self.base_url, self.database_id);
        let body = json!({
            "filter": {
                "property": self.properties.isbn,
                "rich_text": { "equals": isbn }
            },
            "page_size": 1
        });
        let resp = self.send(self.client.post(&url).json(&body)).await?;
        Ok(resp["results"]
            .as_array()
            .and_then(|r| r.first())
            .and_then(|page| page["id"].as_str())
            .map(String::from))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let resp = request
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await
            .context("Notion request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("Failed to read Notion response")?;

        if !status.is_success() {
            anyhow::bail!("Notion API error ({}): {}", status, text);
        }

        serde_json::from_str(&text).context("Failed to parse Notion response JSON")
    }
}

fn page_id(page: &Value) -> Result<String> {
    page["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .map(String::from)
        .context("No id in Notion response")
}

/// Map a record onto database properties. Blank fields are omitted so an
/// update never clears a value someone filled in by hand.
pub fn page_properties(
    record: &CanonicalRecord,
    review: Option<&Review>,
    names: &NotionProperties,
) -> Map<String, Value> {
    let mut props = Map::new();

    props.insert(names.title.clone(), json!({ "title": rich_text(&record.title) }));
    props.insert(names.isbn.clone(), json!({ "rich_text": rich_text(&record.isbn) }));

    for (name, value) in [
        (&names.author, &record.author),
        (&names.publisher, &record.publisher),
        (&names.summary, &record.summary),
    ] {
        if !value.is_empty() {
            props.insert(name.clone(), json!({ "rich_text": rich_text(value) }));
        }
    }

    for (name, value) in [(&names.price, &record.price), (&names.pages, &record.pages)] {
        if let Ok(n) = value.parse::<u64>() {
            props.insert(name.clone(), json!({ "number": n }));
        }
    }

    if let Some(date) = iso_date(&record.pub_date) {
        props.insert(names.pub_date.clone(), json!({ "date": { "start": date } }));
    }

    if !record.cover.is_empty() {
        props.insert(
            names.cover.clone(),
            json!({ "files": [{
                "name": format!("{}.jpg", record.isbn),
                "type": "external",
                "external": { "url": record.cover }
            }] }),
        );
    }

    if let Some(review) = review {
        if let Some(rating) = review.rating {
            props.insert(names.rating.clone(), json!({ "number": rating }));
        }
        if let Some(comment) = review.comment.as_deref().filter(|c| !c.trim().is_empty()) {
            props.insert(names.comment.clone(), json!({ "rich_text": rich_text(comment) }));
        }
    }

    props
}

fn rich_text(content: &str) -> Value {
    let truncated: String = content.chars().take(RICH_TEXT_LIMIT).collect();
    json!([{ "type": "text", "text": { "content": truncated } }])
}

/// "20230115" → "2023-01-15", "202301" → "2023-01-01", "2023" → "2023-01-01".
pub fn iso_date(digits: &str) -> Option<String> {
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (y, m, d) = match digits.len() {
        8 => (&digits[..4], &digits[4..6], &digits[6..]),
        6 => (&digits[..4], &digits[4..6], "01"),
        4 => (digits, "01", "01"),
        _ => return None,
    };
    let month: u32 = m.parse().ok()?;
    let day: u32 = d.parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(format!("{y}-{m}-{d}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CanonicalRecord {
        CanonicalRecord {
            isbn: "9784101010014".into(),
            title: "Example".into(),
            author: "Jane Doe".into(),
            publisher: "".into(),
            pub_date: "20230115".into(),
            pages: "312".into(),
            price: "".into(),
            summary: "x".repeat(2500),
            cover: "https://cdn.example/9784101010014.jpg".into(),
        }
    }

    #[test]
    fn iso_date_formats() {
        assert_eq!(iso_date("20230115").as_deref(), Some("2023-01-15"));
        assert_eq!(iso_date("202301").as_deref(), Some("2023-01-01"));
        assert_eq!(iso_date("2023").as_deref(), Some("2023-01-01"));
        assert_eq!(iso_date(""), None);
        assert_eq!(iso_date("20231315"), None);
        assert_eq!(iso_date("2023-01"), None);
    }

    #[test]
    fn properties_use_configured_names() {
        let names = NotionProperties::default();
        let props = page_properties(&record(), None, &names);

        assert_eq!(
            props["タイトル"]["title"][0]["text"]["content"],
            "Example"
        );
        assert_eq!(props["ISBN"]["rich_text"][0]["text"]["content"], "9784101010014");
        assert_eq!(props["ページ数"]["number"], 312);
        assert_eq!(props["出版日"]["date"]["start"], "2023-01-15");
        assert_eq!(
            props["画像"]["files"][0]["external"]["url"],
            "https://cdn.example/9784101010014.jpg"
        );
    }

    #[test]
    fn blank_fields_are_omitted() {
        let props = page_properties(&record(), None, &NotionProperties::default());
        assert!(!props.contains_key("出版社"));
        assert!(!props.contains_key("価格"));
        assert!(!props.contains_key("評価"));
    }

    #[test]
    fn summary_is_truncated() {
        let props = page_properties(&record(), None, &NotionProperties::default());
        let content = props["要約"]["rich_text"][0]["text"]["content"].as_str().unwrap();
        assert_eq!(content.chars().count(), RICH_TEXT_LIMIT);
    }

    #[test]
    fn review_fields() {
        let review = Review {
            rating: Some(4.5),
            comment: Some("Loved it".into()),
        };
        let props = page_properties(&record(), Some(&review), &NotionProperties::default());
        assert_eq!(props["評価"]["number"], 4.5);
        assert_eq!(props["感想"]["rich_text"][0]["text"]["content"], "Loved it");
    }

    #[test]
    fn created_page_needs_id() {
        assert_eq!(page_id(&json!({"object": "page", "id": "abc"})).unwrap(), "abc");
        assert!(page_id(&json!({"object": "page"})).is_err());
        assert!(page_id(&json!({"id": ""})).is_err());
    }

    #[test]
    fn outcome_serializes_with_action() {
        let v = serde_json::to_value(UpsertOutcome::Created("abc".into())).unwrap();
        assert_eq!(v, json!({"action": "created", "page_id": "abc"}));
    }

    #[tokio::test]
    async fn unreachable_api_is_an_error() {
        let client = Client::new();
        let notion = NotionClient::new(client, &NotionConfig::default())
            .with_base_url("http://127.0.0.1:1");
        assert!(notion.upsert(&record(), None).await.is_err());
    }
}
