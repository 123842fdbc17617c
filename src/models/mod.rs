use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// A stored news article. `external_id` is the canonical article link and
/// serves as the dedup key during ingestion. The counter columns are a
/// derived cache maintained by the engagement ledger and the comment
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub content: String,
    pub source: String,
    pub url: String,
    pub image_url: Option<String>,
    pub category: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub comment_count: i64,
}

/// Sanitized article data accumulated by the ingestion coordinator for a
/// batch insert.
#[derive(Debug, Clone)]
pub struct NewNewsArticle {
    pub external_id: String,
    pub title: String,
    pub content: String,
    pub source: String,
    pub url: String,
    pub image_url: Option<String>,
    pub category: String,
    pub published_at: DateTime<Utc>,
}

/// An AI-generated short derived from one news article. `news_id` goes NULL
/// when the retention sweeper deletes the original article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Short {
    pub id: i64,
    pub news_id: Option<i64>,
    pub title: String,
    pub summary: String,
    pub image_url: Option<String>,
    pub like_count: i64,
    pub dislike_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngagementKind {
    Like,
    Dislike,
}

impl EngagementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngagementKind::Like => "like",
            EngagementKind::Dislike => "dislike",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(EngagementKind::Like),
            "dislike" => Some(EngagementKind::Dislike),
            _ => None,
        }
    }
}

impl FromSql for EngagementKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        EngagementKind::parse(s).ok_or(FromSqlError::InvalidType)
    }
}

impl ToSql for EngagementKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Post-transition view of a user's engagement with one item, read back
/// inside the same transaction that applied the toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngagementStatus {
    pub is_liked: bool,
    pub is_disliked: bool,
    pub like_count: i64,
    pub dislike_count: i64,
}

/// One page of a category listing.
#[derive(Debug, Clone, Serialize)]
pub struct NewsPage {
    pub news: Vec<NewsArticle>,
    pub total_items: i64,
    pub total_pages: i64,
}

/// Recommendation output item. Carries display fields only; no stored state
/// is mutated by the scorer.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendedArticle {
    pub news_id: i64,
    pub title: String,
    pub source: String,
    pub category: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl From<NewsArticle> for RecommendedArticle {
    fn from(news: NewsArticle) -> Self {
        Self {
            news_id: news.id,
            title: news.title,
            source: news.source,
            category: news.category,
            image_url: news.image_url,
            published_at: news.published_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_kind_round_trips_through_text() {
        assert_eq!(EngagementKind::parse("like"), Some(EngagementKind::Like));
        assert_eq!(EngagementKind::parse("dislike"), Some(EngagementKind::Dislike));
        assert_eq!(EngagementKind::parse("view"), None);
        assert_eq!(EngagementKind::Like.as_str(), "like");
    }
}
