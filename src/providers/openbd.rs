use anyhow::Result;
use reqwest::Client;
use serde_json::Value;

use super::{MetadataProvider, as_list, fetch_json, text};
use crate::record::{PartialRecord, digits_only};

/// ONIX extent unit code for "number of pages".
const EXTENT_UNIT_PAGES: &str = "03";

/// ONIX text types tried for the summary, best first:
/// long description, short description, table of contents.
const SUMMARY_TEXT_TYPES: &[&str] = &["03", "02", "04"];

pub struct OpenBdProvider {
    client: Client,
    base_url: String,
}

impl OpenBdProvider {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait::async_trait]
impl MetadataProvider for OpenBdProvider {
    fn name(&self) -> &str {
        "OpenBD"
    }

    async fn fetch(&self, isbn: &str) -> Result<Option<PartialRecord>> {
        let url = format!("{}/get", self.base_url.trim_end_matches('/'));
        let body = fetch_json(self.client.get(&url).query(&[("isbn", isbn)]), "OpenBD").await?;
        Ok(parse_openbd(&body))
    }
}

/// Extract a [`PartialRecord`] from an OpenBD `/get` response.
///
/// The response is an array with one slot per requested ISBN; an unknown ISBN
/// yields `[null]`.
pub fn parse_openbd(body: &Value) -> Option<PartialRecord> {
    let book = body.as_array()?.first()?;
    if !book.is_object() {
        return None;
    }

    let summary = &book["summary"];
    let onix = &book["onix"];

    Some(PartialRecord {
        title: or_onix(text(&summary["title"]), onix_title(onix)),
        author: or_onix(text(&summary["author"]), onix_author(onix)),
        publisher: or_onix(
            text(&summary["publisher"]),
            text(&onix["PublishingDetail"]["Imprint"]["ImprintName"]),
        ),
        pub_date: or_onix(text(&summary["pubdate"]), onix_pub_date(onix))
            .map(|d| digits_only(&d)),
        pages: page_count(onix),
        price: price_amount(onix),
        summary: description(onix),
        cover: text(&summary["cover"]),
    })
}

/// The summary value unless it is blank, then the ONIX value unless that is
/// blank too. A blank summary value still marks the field as carried.
fn or_onix(summary: Option<String>, onix: Option<String>) -> Option<String> {
    match summary {
        Some(v) if !v.is_empty() => Some(v),
        other => onix.filter(|v| !v.is_empty()).or(other),
    }
}

fn onix_title(onix: &Value) -> Option<String> {
    as_list(&onix["DescriptiveDetail"]["TitleDetail"])
        .into_iter()
        .flat_map(|detail| as_list(&detail["TitleElement"]))
        .filter_map(|element| text(&element["TitleText"]["content"]))
        .find(|title| !title.is_empty())
}

fn onix_author(onix: &Value) -> Option<String> {
    as_list(&onix["DescriptiveDetail"]["Contributor"])
        .into_iter()
        .filter_map(|c| text(&c["PersonName"]["content"]))
        .find(|name| !name.is_empty())
}

fn onix_pub_date(onix: &Value) -> Option<String> {
    as_list(&onix["PublishingDetail"]["PublishingDate"])
        .into_iter()
        .filter_map(|d| text(&d["Date"]))
        .find(|date| !date.is_empty())
}

fn page_count(onix: &Value) -> Option<String> {
    as_list(&onix["DescriptiveDetail"]["Extent"])
        .into_iter()
        .find(|e| text(&e["ExtentUnit"]).as_deref() == Some(EXTENT_UNIT_PAGES))
        .and_then(|e| text(&e["ExtentValue"]))
        .map(|v| digits_only(&v))
}

fn price_amount(onix: &Value) -> Option<String> {
    as_list(&onix["ProductSupply"]["SupplyDetail"]["Price"])
        .into_iter()
        .filter_map(|p| text(&p["PriceAmount"]))
        .map(|amount| digits_only(&amount))
        .find(|amount| !amount.is_empty())
}

fn description(onix: &Value) -> Option<String> {
    let entries = as_list(&onix["CollateralDetail"]["TextContent"]);
    SUMMARY_TEXT_TYPES.iter().find_map(|wanted| {
        entries
            .iter()
            .find(|e| text(&e["TextType"]).as_deref() == Some(*wanted))
            .and_then(|e| text(&e["Text"]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn book(onix: Value) -> Value {
        json!([{
            "summary": {
                "isbn": "9784101010014",
                "title": "Example",
                "author": "Jane Doe",
                "publisher": "Shinchosha",
                "pubdate": "2023-01-15",
                "cover": "https://cover.openbd.jp/9784101010014.jpg"
            },
            "onix": onix
        }])
    }

    #[test]
    fn parse_summary_block() {
        let p = parse_openbd(&book(json!({}))).unwrap();
        assert_eq!(p.title.as_deref(), Some("Example"));
        assert_eq!(p.author.as_deref(), Some("Jane Doe"));
        assert_eq!(p.publisher.as_deref(), Some("Shinchosha"));
        assert_eq!(p.pub_date.as_deref(), Some("20230115"));
        assert_eq!(
            p.cover.as_deref(),
            Some("https://cover.openbd.jp/9784101010014.jpg")
        );
        assert!(p.pages.is_none());
        assert!(p.price.is_none());
        assert!(p.summary.is_none());
    }

    #[test]
    fn null_slot_is_not_found() {
        assert!(parse_openbd(&json!([null])).is_none());
        assert!(parse_openbd(&json!([])).is_none());
        assert!(parse_openbd(&json!({"error": "x"})).is_none());
    }

    #[test]
    fn extent_list_picks_page_unit() {
        let onix = json!({"DescriptiveDetail": {"Extent": [
            {"ExtentType": "22", "ExtentUnit": "02", "ExtentValue": "12"},
            {"ExtentType": "11", "ExtentUnit": "03", "ExtentValue": "250"}
        ]}});
        assert_eq!(parse_openbd(&book(onix)).unwrap().pages.as_deref(), Some("250"));
    }

    #[test]
    fn extent_bare_object_matches_list() {
        let bare = json!({"DescriptiveDetail": {"Extent": {"ExtentUnit": "03", "ExtentValue": "250"}}});
        let list = json!({"DescriptiveDetail": {"Extent": [{"ExtentUnit": "03", "ExtentValue": "250"}]}});
        let from_bare = parse_openbd(&book(bare)).unwrap();
        let from_list = parse_openbd(&book(list)).unwrap();
        assert_eq!(from_bare.pages.as_deref(), Some("250"));
        assert_eq!(from_bare, from_list);
    }

    #[test]
    fn price_takes_first_non_empty_amount() {
        let onix = json!({"ProductSupply": {"SupplyDetail": {"Price": [
            {"PriceType": "03", "PriceAmount": ""},
            {"PriceType": "01", "PriceAmount": "1760"},
            {"PriceType": "02", "PriceAmount": "1936"}
        ]}}});
        assert_eq!(parse_openbd(&book(onix)).unwrap().price.as_deref(), Some("1760"));
    }

    #[test]
    fn price_bare_object() {
        let onix = json!({"ProductSupply": {"SupplyDetail": {"Price": {"PriceAmount": 1760}}}});
        assert_eq!(parse_openbd(&book(onix)).unwrap().price.as_deref(), Some("1760"));
    }

    #[test]
    fn summary_prefers_long_description() {
        let onix = json!({"CollateralDetail": {"TextContent": [
            {"TextType": "02", "Text": "short"},
            {"TextType": "03", "Text": "long"}
        ]}});
        assert_eq!(parse_openbd(&book(onix)).unwrap().summary.as_deref(), Some("long"));

        let onix = json!({"CollateralDetail": {"TextContent": {"TextType": "02", "Text": "short"}}});
        assert_eq!(parse_openbd(&book(onix)).unwrap().summary.as_deref(), Some("short"));
    }

    #[test]
    fn blank_summary_falls_back_to_onix() {
        let body = json!([{
            "summary": {"title": "", "author": "", "publisher": "", "pubdate": ""},
            "onix": {
                "DescriptiveDetail": {
                    "TitleDetail": {"TitleType": "01", "TitleElement": {
                        "TitleElementLevel": "01",
                        "TitleText": {"content": "ONIX Title", "collationkey": "x"}
                    }},
                    "Contributor": [
                        {"PersonName": {"content": "First Author"}},
                        {"PersonName": {"content": "Translator"}}
                    ]
                },
                "PublishingDetail": {
                    "Imprint": {"ImprintName": "ONIX Press"},
                    "PublishingDate": [{"PublishingDateRole": "01", "Date": "20230115"}]
                }
            }
        }]);
        let p = parse_openbd(&body).unwrap();
        assert_eq!(p.title.as_deref(), Some("ONIX Title"));
        assert_eq!(p.author.as_deref(), Some("First Author"));
        assert_eq!(p.publisher.as_deref(), Some("ONIX Press"));
        assert_eq!(p.pub_date.as_deref(), Some("20230115"));
        assert!(p.has_identity());
    }

    #[test]
    fn summary_wins_over_onix() {
        let onix = json!({
            "DescriptiveDetail": {"Contributor": {"PersonName": {"content": "Other"}}},
            "PublishingDetail": {"Imprint": {"ImprintName": "Other Press"}}
        });
        let p = parse_openbd(&book(onix)).unwrap();
        assert_eq!(p.author.as_deref(), Some("Jane Doe"));
        assert_eq!(p.publisher.as_deref(), Some("Shinchosha"));
    }

    #[test]
    fn empty_summary_fields_stay_present() {
        let body = json!([{"summary": {"title": "", "cover": ""}}]);
        let p = parse_openbd(&body).unwrap();
        assert_eq!(p.title.as_deref(), Some(""));
        assert_eq!(p.cover.as_deref(), Some(""));
        assert!(p.author.is_none());
    }
}
