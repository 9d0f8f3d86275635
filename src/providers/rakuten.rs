use anyhow::Result;
use reqwest::Client;
use serde_json::Value;

use super::{MetadataProvider, fetch_json, text};
use crate::record::{PartialRecord, digits_only};

pub struct RakutenBooksProvider {
    client: Client,
    base_url: String,
    application_id: String,
}

impl RakutenBooksProvider {
    pub fn new(client: Client, base_url: String, application_id: String) -> Self {
        Self {
            client,
            base_url,
            application_id,
        }
    }
}

#[async_trait::async_trait]
impl MetadataProvider for RakutenBooksProvider {
    fn name(&self) -> &str {
        "Rakuten Books"
    }

    async fn fetch(&self, isbn: &str) -> Result<Option<PartialRecord>> {
        let request = self.client.get(&self.base_url).query(&[
            ("format", "json"),
            ("isbn", isbn),
            ("applicationId", self.application_id.as_str()),
        ]);
        let body = fetch_json(request, "Rakuten Books").await?;
        Ok(parse_rakuten(&body))
    }
}

/// Extract a [`PartialRecord`] from a Rakuten Books search response.
///
/// Accepts both `formatVersion=1` (`Items: [{Item: {...}}]`) and
/// `formatVersion=2` (`Items: [{...}]`) layouts.
pub fn parse_rakuten(body: &Value) -> Option<PartialRecord> {
    let first = body["Items"].as_array()?.first()?;
    let item = first.get("Item").unwrap_or(first);
    if !item.is_object() {
        return None;
    }

    Some(PartialRecord {
        title: text(&item["title"]),
        author: text(&item["author"]),
        publisher: text(&item["publisherName"]),
        pub_date: text(&item["salesDate"]).map(|d| sales_date_digits(&d)),
        pages: None,
        price: text(&item["itemPrice"]),
        summary: text(&item["itemCaption"]),
        cover: text(&item["largeImageUrl"]),
    })
}

/// "2023年01月15日頃" → "20230115".
fn sales_date_digits(date: &str) -> String {
    digits_only(&date.replace(['年', '月', '日'], ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> Value {
        json!({
            "title": "Example",
            "author": "Jane Doe/John Roe",
            "publisherName": "Shinchosha",
            "salesDate": "2023年01月15日頃",
            "itemPrice": 1760,
            "itemCaption": "Caption",
            "largeImageUrl": "https://thumbnail.image.rakuten.co.jp/x.jpg?_ex=200x200"
        })
    }

    #[test]
    fn parse_format_v1() {
        let body = json!({"count": 1, "Items": [{"Item": item()}]});
        let p = parse_rakuten(&body).unwrap();
        assert_eq!(p.title.as_deref(), Some("Example"));
        assert_eq!(p.author.as_deref(), Some("Jane Doe/John Roe"));
        assert_eq!(p.publisher.as_deref(), Some("Shinchosha"));
        assert_eq!(p.pub_date.as_deref(), Some("20230115"));
        assert_eq!(p.price.as_deref(), Some("1760"));
        assert_eq!(p.summary.as_deref(), Some("Caption"));
        assert_eq!(
            p.cover.as_deref(),
            Some("https://thumbnail.image.rakuten.co.jp/x.jpg?_ex=200x200")
        );
        assert!(p.pages.is_none());
    }

    #[test]
    fn parse_format_v2() {
        let body = json!({"count": 1, "Items": [item()]});
        assert_eq!(parse_rakuten(&body).unwrap().title.as_deref(), Some("Example"));
    }

    #[test]
    fn no_items_is_not_found() {
        assert!(parse_rakuten(&json!({"count": 0, "Items": []})).is_none());
        assert!(parse_rakuten(&json!({"error": "wrong_parameter"})).is_none());
    }

    #[test]
    fn sales_date_month_only() {
        assert_eq!(sales_date_digits("2023年01月"), "202301");
        assert_eq!(sales_date_digits("2023年01月下旬"), "202301");
    }
}
