use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::error::{AppError, Result};

const SEARCH_API_URL: &str = "https://openapi.naver.com/v1/search/news.json";

const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[allow(dead_code)]
    pub total: i64,
    pub items: Vec<SourceNewsItem>,
}

/// One item as returned by the upstream search API. `pub_date` is an
/// RFC 1123Z string (e.g. "Mon, 10 Nov 2025 14:30:00 +0900").
#[derive(Debug, Clone, Deserialize)]
pub struct SourceNewsItem {
    pub title: String,
    #[serde(rename = "originallink")]
    pub original_link: String,
    pub link: String,
    pub description: String,
    #[serde(rename = "pubDate")]
    pub pub_date: String,
}

/// Best-effort og: metadata scraped from an article's original page.
#[derive(Debug, Clone, Default)]
pub struct PageMetadata {
    pub image_url: Option<String>,
    pub site_name: Option<String>,
}

pub struct SourceClient {
    client: Client,
    client_id: String,
    client_secret: String,
}

impl SourceClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            client_id,
            client_secret,
        }
    }

    /// Query the upstream news search API. Auth goes in headers, not the
    /// query string.
    pub async fn search(&self, query: &str, display: u32, start: u32) -> Result<SearchResponse> {
        let response = self
            .client
            .get(SEARCH_API_URL)
            .query(&[
                ("query", query),
                ("display", &display.to_string()),
                ("start", &start.to_string()),
                ("sort", "sim"),
            ])
            .header("X-Naver-Client-Id", &self.client_id)
            .header("X-Naver-Client-Secret", &self.client_secret)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::SourceApi(format!(
                "search request failed: HTTP {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Best-effort scrape of og:image / og:site_name from an arbitrary URL.
    /// Callers treat any error as "no metadata".
    pub async fn fetch_page(&self, url: &str) -> Result<PageMetadata> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT_STRING)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::SourceApi(format!(
                "page fetch failed: HTTP {}",
                response.status()
            )));
        }

        let html = response.text().await?;
        Ok(extract_metadata(&html))
    }
}

fn extract_metadata(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);
    PageMetadata {
        image_url: meta_content(&document, r#"meta[property="og:image"]"#),
        site_name: meta_content(&document, r#"meta[property="og:site_name"]"#),
    }
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_og_metadata() {
        let html = r#"<html><head>
            <meta property="og:image" content="https://img.example/a.jpg"/>
            <meta property="og:site_name" content="The Example Times"/>
        </head><body></body></html>"#;
        let meta = extract_metadata(html);
        assert_eq!(meta.image_url.as_deref(), Some("https://img.example/a.jpg"));
        assert_eq!(meta.site_name.as_deref(), Some("The Example Times"));
    }

    #[test]
    fn missing_or_empty_tags_yield_none() {
        let html = r#"<html><head><meta property="og:image" content=""/></head></html>"#;
        let meta = extract_metadata(html);
        assert_eq!(meta.image_url, None);
        assert_eq!(meta.site_name, None);
    }

    #[test]
    fn search_item_deserializes_upstream_field_names() {
        let json = r#"{
            "title": "Quarterly <b>results</b>",
            "originallink": "https://paper.example/a",
            "link": "https://news.example/a",
            "description": "desc",
            "pubDate": "Mon, 10 Nov 2025 14:30:00 +0900"
        }"#;
        let item: SourceNewsItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.original_link, "https://paper.example/a");
        assert_eq!(item.pub_date, "Mon, 10 Nov 2025 14:30:00 +0900");
    }
}
