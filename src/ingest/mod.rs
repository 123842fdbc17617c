//! Ingestion coordinator: per-category fan-out against the news source,
//! dedup on the canonical article link, best-effort enrichment, sanitize,
//! batch insert. Also owns the retention sweep since both operate on the
//! same table's lifecycle.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use scraper::Html;
use url::Url;

use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::NewNewsArticle;
use crate::source::{PageMetadata, SourceClient};

/// Max categories fetched at once; the upstream API is rate-sensitive.
const FETCH_CONCURRENCY: usize = 4;

pub struct Ingestor {
    repository: Arc<Repository>,
    source: Arc<SourceClient>,
    categories: Vec<String>,
    items_per_category: u32,
    retention_days: i64,
}

impl Ingestor {
    pub fn new(repository: Arc<Repository>, source: Arc<SourceClient>, config: &Config) -> Self {
        Self {
            repository,
            source,
            categories: config.categories.clone(),
            items_per_category: config.items_per_category,
            retention_days: config.retention_days,
        }
    }

    /// Fetch every configured category concurrently. A failing category
    /// aborts only its own leg; the rest proceed. Returns the total number
    /// of newly stored articles. Dropping the returned future cancels the
    /// remaining legs without touching already-committed batches.
    pub async fn fetch_all(&self) -> Result<usize> {
        tracing::info!(
            categories = self.categories.len(),
            per_category = self.items_per_category,
            "starting category fetch"
        );

        let results: Vec<(String, Result<usize>)> = stream::iter(self.categories.clone())
            .map(|category| async move {
                let result = self
                    .fetch_category(&category, self.items_per_category)
                    .await;
                (category, result)
            })
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut total = 0usize;
        let mut failures = 0usize;
        for (category, result) in &results {
            match result {
                Ok(count) => total += count,
                Err(e) => {
                    failures += 1;
                    tracing::error!(%category, error = %e, "category fetch failed");
                }
            }
        }

        if !results.is_empty() && failures == results.len() {
            return Err(AppError::SourceApi(
                "every category fetch failed".to_string(),
            ));
        }

        tracing::info!(total, failures, "category fetch finished");
        Ok(total)
    }

    /// One category's pipeline: search, dedup, enrich, sanitize, batch
    /// insert. Enrichment and timestamp failures degrade per item; only a
    /// search or storage failure aborts the leg.
    pub async fn fetch_category(&self, category: &str, count: u32) -> Result<usize> {
        let response = self.source.search(category, count, 1).await?;
        tracing::debug!(%category, fetched = response.items.len(), "search returned items");

        let mut to_create = Vec::new();
        for item in response.items {
            // The canonical link is the dedup key; an already-stored item
            // is skipped before any enrichment work.
            let external_id = item.link.clone();
            if self
                .repository
                .find_news_by_external_id(&external_id)
                .await?
                .is_some()
            {
                continue;
            }

            let metadata = match self.source.fetch_page(&item.original_link).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!(url = %item.original_link, error = %e, "metadata fetch failed");
                    PageMetadata::default()
                }
            };

            let source_label = metadata
                .site_name
                .unwrap_or_else(|| source_from_url(&item.original_link));

            to_create.push(NewNewsArticle {
                external_id,
                title: clean_string(&item.title),
                content: clean_string(&item.description),
                source: source_label,
                url: item.link,
                image_url: metadata.image_url,
                category: category.to_string(),
                published_at: parse_pub_date(&item.pub_date),
            });
        }

        if to_create.is_empty() {
            tracing::debug!(%category, "no new items");
            return Ok(0);
        }

        let inserted = self.repository.insert_news_batch(to_create).await?;
        tracing::info!(%category, inserted, "stored new items");
        Ok(inserted)
    }

    /// Retention sweep: drop articles ingested more than the configured
    /// number of days ago, engagement or not.
    pub async fn cleanup_old_news(&self) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(self.retention_days);
        tracing::info!(%cutoff, "deleting news older than cutoff");
        let deleted = self.repository.delete_news_older_than(cutoff).await?;
        tracing::info!(deleted, "cleanup finished");
        Ok(deleted)
    }
}

/// Publisher fallback chain: URL host, then a literal "Unknown".
fn source_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Upstream publish timestamps are RFC 1123Z. A malformed one never rejects
/// the item; it falls back to the current time.
fn parse_pub_date(raw: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc2822(raw) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(e) => {
            tracing::debug!(%raw, error = %e, "unparseable pubDate, using current time");
            Utc::now()
        }
    }
}

/// Decode HTML entities and strip markup from an API string by parsing it
/// as a fragment and keeping only the text nodes.
fn clean_string(s: &str) -> String {
    let fragment = Html::parse_fragment(s);
    let text: String = fragment.root_element().text().collect();
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_string_strips_markup_and_entities() {
        assert_eq!(
            clean_string("Markets <b>rally</b> on &quot;strong&quot; data"),
            r#"Markets rally on "strong" data"#
        );
        assert_eq!(clean_string("plain title"), "plain title");
        assert_eq!(clean_string("  <i>spaced</i>  "), "spaced");
    }

    #[test]
    fn pub_date_parses_rfc1123z() {
        let parsed = parse_pub_date("Mon, 10 Nov 2025 14:30:00 +0900");
        assert_eq!(parsed.to_rfc3339(), "2025-11-10T05:30:00+00:00");
    }

    #[test]
    fn malformed_pub_date_falls_back_to_now() {
        let before = Utc::now();
        let parsed = parse_pub_date("not a date");
        let after = Utc::now();
        assert!(parsed >= before && parsed <= after);
    }

    #[test]
    fn source_label_falls_back_to_host_then_unknown() {
        assert_eq!(
            source_from_url("https://www.yna.co.kr/view/AKR123"),
            "www.yna.co.kr"
        );
        assert_eq!(source_from_url("not a url"), "Unknown");
        assert_eq!(source_from_url(""), "Unknown");
    }
}
