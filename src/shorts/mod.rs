//! Shorts generator: per category, pick recent not-yet-derived articles,
//! crawl the full body text, summarize, and persist the first success.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use scraper::{CaseSensitivity, ElementRef, Html, Selector};

use crate::ai::Summarizer;
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::NewsArticle;

/// Body containers tried in order; the last is the generic fallback.
const ARTICLE_SELECTORS: &[&str] = &["#dic_area", "#newsct_article", "article"];

/// Elements whose text is never article body.
const EXCLUDED_TAGS: &[&str] = &["script", "style", "iframe", "noscript"];

/// Photo caption wrappers stripped from the extracted text.
const EXCLUDED_CLASSES: &[&str] = &["end_photo_org", "img_desc"];

pub struct ShortsGenerator {
    repository: Arc<Repository>,
    summarizer: Arc<Summarizer>,
    client: reqwest::Client,
    categories: Vec<String>,
    candidate_limit: u32,
    window_hours: i64,
    min_article_chars: usize,
}

impl ShortsGenerator {
    pub fn new(repository: Arc<Repository>, summarizer: Arc<Summarizer>, config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .connect_timeout(StdDuration::from_secs(10))
            .user_agent("newsclip/1.0")
            .build()
            .expect("Failed to create HTTP client");
        Self {
            repository,
            summarizer,
            client,
            categories: config.categories.clone(),
            candidate_limit: config.shorts_candidates,
            window_hours: config.shorts_window_hours,
            min_article_chars: config.min_article_chars,
        }
    }

    /// Generate at most one short per category per run. Candidates within a
    /// category are tried newest first until one crawls and summarizes
    /// cleanly; exhausting them is non-fatal. Returns how many shorts were
    /// created.
    pub async fn generate_all(&self) -> Result<usize> {
        tracing::info!(categories = self.categories.len(), "starting shorts generation");
        let mut generated = 0usize;

        for category in &self.categories {
            let cutoff = Utc::now() - Duration::hours(self.window_hours);
            let candidates = match self
                .repository
                .shorts_candidates(category, cutoff, self.candidate_limit)
                .await
            {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::error!(%category, error = %e, "candidate query failed");
                    continue;
                }
            };

            if candidates.is_empty() {
                tracing::debug!(%category, "no suitable articles");
                continue;
            }

            match self.generate_for_category(candidates).await {
                Some(title) => {
                    tracing::info!(%category, %title, "short generated");
                    generated += 1;
                }
                None => tracing::warn!(%category, "no candidate produced a short"),
            }
        }

        tracing::info!(generated, "shorts generation finished");
        Ok(generated)
    }

    /// Walk the candidates in order and stop at the first success. Every
    /// per-candidate failure (crawl, too-short body, summarize, insert) is
    /// absorbed and the next candidate is tried.
    async fn generate_for_category(&self, candidates: Vec<NewsArticle>) -> Option<String> {
        for news in candidates {
            let body = match self.crawl_article(&news.url).await {
                Ok(text) if meets_minimum_length(&text, self.min_article_chars) => text,
                Ok(_) => {
                    tracing::debug!(news_id = news.id, "extracted body too short");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(news_id = news.id, error = %e, "crawl failed");
                    continue;
                }
            };

            let generated = match self.summarizer.summarize(&body).await {
                Ok(generated) => generated,
                Err(e) => {
                    tracing::warn!(news_id = news.id, error = %e, "summarization failed");
                    continue;
                }
            };

            match self
                .repository
                .insert_short(
                    news.id,
                    generated.title.clone(),
                    generated.summary,
                    news.image_url.clone(),
                )
                .await
            {
                Ok(_) => return Some(generated.title),
                Err(e) => {
                    tracing::warn!(news_id = news.id, error = %e, "short insert failed");
                    continue;
                }
            }
        }
        None
    }

    async fn crawl_article(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::SourceApi(format!(
                "article fetch failed: HTTP {}",
                response.status()
            )));
        }
        let html = response.text().await?;
        Ok(extract_article_text(&html))
    }
}

/// The threshold is in characters; byte length would over-admit multibyte
/// bodies.
fn meets_minimum_length(text: &str, min_chars: usize) -> bool {
    text.chars().count() >= min_chars
}

/// Extract readable body text from an article page. Tries the site-specific
/// containers before the generic `article` element; returns an empty string
/// when none match, which callers treat as a discarded candidate.
fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);
    for raw_selector in ARTICLE_SELECTORS {
        let Ok(selector) = Selector::parse(raw_selector) else {
            continue;
        };
        if let Some(container) = document.select(&selector).next() {
            return container_text(container);
        }
    }
    String::new()
}

/// Collect the container's text nodes, skipping scripts and caption
/// wrappers, and collapse all runs of whitespace to single spaces.
fn container_text(container: ElementRef) -> String {
    let mut buf = String::new();
    for node in container.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let excluded = node.ancestors().any(|ancestor| {
            ancestor.value().as_element().is_some_and(|element| {
                EXCLUDED_TAGS.contains(&element.name())
                    || EXCLUDED_CLASSES.iter().any(|class| {
                        element.has_class(class, CaseSensitivity::AsciiCaseInsensitive)
                    })
            })
        });
        if !excluded {
            buf.push_str(text);
            buf.push(' ');
        }
    }
    buf.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_site_specific_container() {
        let html = r#"<html><body>
            <div id="dic_area">
                First paragraph.<br/>Second
                paragraph.
                <span class="end_photo_org">Photo caption text</span>
                <script>var tracking = 1;</script>
            </div>
            <article>Should not be used.</article>
        </body></html>"#;
        let text = extract_article_text(html);
        assert_eq!(text, "First paragraph. Second paragraph.");
    }

    #[test]
    fn falls_back_to_generic_article_element() {
        let html = "<html><body><article>Generic <b>body</b> text.</article></body></html>";
        assert_eq!(extract_article_text(html), "Generic body text.");
    }

    #[test]
    fn no_container_yields_empty_text() {
        let html = "<html><body><div>unrelated</div></body></html>";
        assert_eq!(extract_article_text(html), "");
    }

    #[test]
    fn minimum_length_counts_characters_not_bytes() {
        // 40 characters but 120 UTF-8 bytes.
        let korean = "한".repeat(40);
        assert!(!meets_minimum_length(&korean, 100));
        assert!(meets_minimum_length(&korean, 40));
        assert!(meets_minimum_length(&"a".repeat(100), 100));
    }

    #[test]
    fn caption_class_is_excluded_case_insensitively() {
        let html = r#"<article>Body. <span class="IMG_DESC">caption</span></article>"#;
        assert_eq!(extract_article_text(html), "Body.");
    }
}
