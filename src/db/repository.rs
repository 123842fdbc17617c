use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::engage::{LedgerAction, Transition};
use crate::error::Result;
use crate::models::{
    EngagementKind, EngagementStatus, NewNewsArticle, NewsArticle, NewsPage, Short,
};

use super::schema::SCHEMA;

const NEWS_COLUMNS: &str = "id, external_id, title, content, source, url, image_url, category, \
                            published_at, created_at, view_count, like_count, dislike_count, \
                            comment_count";

const SHORT_COLUMNS: &str =
    "id, news_id, title, summary, image_url, like_count, dislike_count, created_at";

/// Chunk size for batch inserts during ingestion.
const INSERT_BATCH_SIZE: usize = 100;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // News operations

    /// Batch-insert ingested articles, chunked. Rows whose `external_id`
    /// already exists are ignored, which makes concurrent re-ingestion of
    /// the same article safe. Returns the number of rows actually inserted.
    pub async fn insert_news_batch(&self, articles: Vec<NewNewsArticle>) -> Result<usize> {
        let inserted = self
            .conn
            .call(move |conn| {
                let mut inserted = 0usize;
                for chunk in articles.chunks(INSERT_BATCH_SIZE) {
                    let tx = conn.transaction()?;
                    {
                        let mut stmt = tx.prepare_cached(
                            r#"INSERT INTO news
                                   (external_id, title, content, source, url, image_url, category, published_at)
                               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                               ON CONFLICT(external_id) DO NOTHING"#,
                        )?;
                        for article in chunk {
                            inserted += stmt.execute(params![
                                article.external_id,
                                article.title,
                                article.content,
                                article.source,
                                article.url,
                                article.image_url,
                                article.category,
                                article.published_at.to_rfc3339(),
                            ])?;
                        }
                    }
                    tx.commit()?;
                }
                Ok(inserted)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn find_news_by_external_id(&self, external_id: &str) -> Result<Option<NewsArticle>> {
        let external_id = external_id.to_string();
        let news = self
            .conn
            .call(move |conn| {
                let news = conn
                    .query_row(
                        &format!("SELECT {NEWS_COLUMNS} FROM news WHERE external_id = ?1"),
                        params![external_id],
                        news_from_row,
                    )
                    .optional()?;
                Ok(news)
            })
            .await?;
        Ok(news)
    }

    pub async fn find_news_by_id(&self, news_id: i64) -> Result<NewsArticle> {
        let news = self
            .conn
            .call(move |conn| {
                let news = conn.query_row(
                    &format!("SELECT {NEWS_COLUMNS} FROM news WHERE id = ?1"),
                    params![news_id],
                    news_from_row,
                )?;
                Ok(news)
            })
            .await?;
        Ok(news)
    }

    /// Paginated category listing, newest first. `None` lists every
    /// category. Count and page are read in one transaction so the totals
    /// stay consistent with the page contents.
    pub async fn get_news_page(
        &self,
        category: Option<String>,
        page: u32,
        size: u32,
    ) -> Result<NewsPage> {
        let page = page.max(1) as i64;
        let size = size.max(1) as i64;
        let result = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let offset = (page - 1) * size;
                let (total_items, news) = match &category {
                    Some(cat) => {
                        let total: i64 = tx.query_row(
                            "SELECT COUNT(*) FROM news WHERE category = ?1",
                            params![cat],
                            |row| row.get(0),
                        )?;
                        let news = {
                            let mut stmt = tx.prepare(&format!(
                                "SELECT {NEWS_COLUMNS} FROM news WHERE category = ?1 \
                                 ORDER BY published_at DESC LIMIT ?2 OFFSET ?3"
                            ))?;
                            let rows = stmt
                                .query_map(params![cat, size, offset], news_from_row)?
                                .collect::<std::result::Result<Vec<_>, _>>()?;
                            rows
                        };
                        (total, news)
                    }
                    None => {
                        let total: i64 =
                            tx.query_row("SELECT COUNT(*) FROM news", [], |row| row.get(0))?;
                        let news = {
                            let mut stmt = tx.prepare(&format!(
                                "SELECT {NEWS_COLUMNS} FROM news \
                                 ORDER BY published_at DESC LIMIT ?1 OFFSET ?2"
                            ))?;
                            let rows = stmt
                                .query_map(params![size, offset], news_from_row)?
                                .collect::<std::result::Result<Vec<_>, _>>()?;
                            rows
                        };
                        (total, news)
                    }
                };
                tx.commit()?;
                Ok(NewsPage {
                    news,
                    total_items,
                    total_pages: (total_items + size - 1) / size,
                })
            })
            .await?;
        Ok(result)
    }

    /// Delete news rows ingested strictly before `cutoff`. Engagements and
    /// bookmarks cascade; shorts keep a dangling NULL reference.
    pub async fn delete_news_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = cutoff.to_rfc3339();
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM news WHERE created_at < datetime(?1)",
                    params![cutoff],
                )?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted)
    }

    pub async fn increment_view_count(&self, news_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE news SET view_count = view_count + 1 WHERE id = ?1",
                    params![news_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Used by the comment CRUD collaborator; delta is +1 on create, -1 on
    /// delete.
    pub async fn increment_comment_count(&self, news_id: i64, delta: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE news SET comment_count = comment_count + ?2 WHERE id = ?1",
                    params![news_id, delta],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Shorts operations

    /// Articles in `category` ingested after `cutoff` that do not already
    /// have a short, newest published first, capped at `limit`.
    pub async fn shorts_candidates(
        &self,
        category: &str,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<NewsArticle>> {
        let category = category.to_string();
        let cutoff = cutoff.to_rfc3339();
        let candidates = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NEWS_COLUMNS} FROM news \
                     WHERE category = ?1 \
                       AND created_at > datetime(?2) \
                       AND id NOT IN (SELECT news_id FROM shorts WHERE news_id IS NOT NULL) \
                     ORDER BY published_at DESC LIMIT ?3"
                ))?;
                let candidates = stmt
                    .query_map(params![category, cutoff, limit], news_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(candidates)
            })
            .await?;
        Ok(candidates)
    }

    /// The UNIQUE constraint on `news_id` rejects a second short for the
    /// same article, so concurrent generation runs cannot double-derive.
    pub async fn insert_short(
        &self,
        news_id: i64,
        title: String,
        summary: String,
        image_url: Option<String>,
    ) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO shorts (news_id, title, summary, image_url) VALUES (?1, ?2, ?3, ?4)",
                    params![news_id, title, summary, image_url],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    /// Newest shorts for the feed, cursor-paginated by descending id.
    pub async fn find_recent_shorts(&self, limit: u32, cursor: Option<i64>) -> Result<Vec<Short>> {
        let shorts = self
            .conn
            .call(move |conn| {
                let shorts = match cursor {
                    Some(cursor) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {SHORT_COLUMNS} FROM shorts WHERE id < ?1 \
                             ORDER BY id DESC LIMIT ?2"
                        ))?;
                        let rows = stmt
                            .query_map(params![cursor, limit], short_from_row)?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows
                    }
                    None => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {SHORT_COLUMNS} FROM shorts ORDER BY id DESC LIMIT ?1"
                        ))?;
                        let rows = stmt
                            .query_map(params![limit], short_from_row)?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows
                    }
                };
                Ok(shorts)
            })
            .await?;
        Ok(shorts)
    }

    /// One user's live engagements over a set of shorts, for marking
    /// is_liked/is_disliked in a feed without a query per item.
    pub async fn find_short_engagements(
        &self,
        user_id: i64,
        short_ids: Vec<i64>,
    ) -> Result<HashMap<i64, EngagementKind>> {
        if short_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let engagements = self
            .conn
            .call(move |conn| {
                let placeholders = vec!["?"; short_ids.len()].join(", ");
                let mut stmt = conn.prepare(&format!(
                    "SELECT short_id, kind FROM short_engagements \
                     WHERE user_id = ? AND short_id IN ({placeholders})"
                ))?;
                let rows = stmt
                    .query_map(
                        params_from_iter(std::iter::once(user_id).chain(short_ids)),
                        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, EngagementKind>(1)?)),
                    )?
                    .collect::<std::result::Result<HashMap<_, _>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(engagements)
    }

    // Engagement ledger

    pub async fn set_news_engagement(
        &self,
        user_id: i64,
        news_id: i64,
        kind: EngagementKind,
    ) -> Result<EngagementStatus> {
        let status = self
            .conn
            .call(move |conn| {
                Ok(apply_engagement(
                    conn,
                    "news",
                    "news_engagements",
                    "news_id",
                    user_id,
                    news_id,
                    kind,
                )?)
            })
            .await?;
        Ok(status)
    }

    pub async fn set_short_engagement(
        &self,
        user_id: i64,
        short_id: i64,
        kind: EngagementKind,
    ) -> Result<EngagementStatus> {
        let status = self
            .conn
            .call(move |conn| {
                Ok(apply_engagement(
                    conn,
                    "shorts",
                    "short_engagements",
                    "short_id",
                    user_id,
                    short_id,
                    kind,
                )?)
            })
            .await?;
        Ok(status)
    }

    // Bookmarks

    /// Existence-only toggle; returns the resulting state. A missing
    /// article surfaces as NotFound via the foreign key on create.
    pub async fn toggle_bookmark(&self, user_id: i64, news_id: i64) -> Result<bool> {
        let bookmarked = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM bookmarks WHERE user_id = ?1 AND news_id = ?2",
                        params![user_id, news_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let bookmarked = match existing {
                    Some(id) => {
                        tx.execute("DELETE FROM bookmarks WHERE id = ?1", params![id])?;
                        false
                    }
                    None => {
                        tx.execute(
                            "INSERT INTO bookmarks (user_id, news_id) VALUES (?1, ?2)",
                            params![user_id, news_id],
                        )?;
                        true
                    }
                };
                tx.commit()?;
                Ok(bookmarked)
            })
            .await?;
        Ok(bookmarked)
    }

    // Preferences

    pub async fn get_preferred_categories(&self, user_id: i64) -> Result<Vec<String>> {
        let categories = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT category FROM preferred_categories WHERE user_id = ?1 ORDER BY id",
                )?;
                let categories = stmt
                    .query_map(params![user_id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(categories)
            })
            .await?;
        Ok(categories)
    }

    /// Replace the user's preference set wholesale (clear-then-insert in
    /// one transaction).
    pub async fn set_preferred_categories(
        &self,
        user_id: i64,
        categories: Vec<String>,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM preferred_categories WHERE user_id = ?1",
                    params![user_id],
                )?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO preferred_categories (user_id, category) VALUES (?1, ?2)",
                    )?;
                    for category in &categories {
                        stmt.execute(params![user_id, category])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Recommendation queries

    /// Per-category bookmark counts for one user.
    pub async fn bookmark_category_stats(&self, user_id: i64) -> Result<HashMap<String, i64>> {
        let stats = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT n.category, COUNT(*) FROM bookmarks b \
                     JOIN news n ON n.id = b.news_id \
                     WHERE b.user_id = ?1 GROUP BY n.category",
                )?;
                let stats = stmt
                    .query_map(params![user_id], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<std::result::Result<HashMap<_, _>, _>>()?;
                Ok(stats)
            })
            .await?;
        Ok(stats)
    }

    /// Per-category like and dislike counts for one user, as two maps.
    pub async fn engagement_category_stats(
        &self,
        user_id: i64,
    ) -> Result<(HashMap<String, i64>, HashMap<String, i64>)> {
        let stats = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT n.category, e.kind, COUNT(*) FROM news_engagements e \
                     JOIN news n ON n.id = e.news_id \
                     WHERE e.user_id = ?1 GROUP BY n.category, e.kind",
                )?;
                let mut likes = HashMap::new();
                let mut dislikes = HashMap::new();
                let rows = stmt.query_map(params![user_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, EngagementKind>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?;
                for row in rows {
                    let (category, kind, count) = row?;
                    match kind {
                        EngagementKind::Like => likes.insert(category, count),
                        EngagementKind::Dislike => dislikes.insert(category, count),
                    };
                }
                Ok((likes, dislikes))
            })
            .await?;
        Ok(stats)
    }

    /// Candidate pool for recommendation: recent articles the user has
    /// neither bookmarked nor engaged with, newest published first.
    pub async fn recommendation_candidates(
        &self,
        user_id: i64,
        published_after: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<NewsArticle>> {
        let published_after = published_after.to_rfc3339();
        let candidates = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NEWS_COLUMNS} FROM news \
                     WHERE published_at > ?2 \
                       AND id NOT IN (SELECT news_id FROM bookmarks WHERE user_id = ?1) \
                       AND id NOT IN (SELECT news_id FROM news_engagements WHERE user_id = ?1) \
                     ORDER BY published_at DESC LIMIT ?3"
                ))?;
                let candidates = stmt
                    .query_map(params![user_id, published_after, limit], news_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(candidates)
            })
            .await?;
        Ok(candidates)
    }
}

/// Apply one engagement toggle inside a single transaction: verify the
/// parent item, resolve the transition from the existing record, mutate the
/// ledger, apply the counter deltas, and read the counters back so the
/// returned status reflects the committed state. The `UNIQUE(user_id, item)`
/// key plus SQLite's transaction serialization prevent double-applied deltas
/// under concurrent toggles from the same user.
fn apply_engagement(
    conn: &mut rusqlite::Connection,
    item_table: &str,
    ledger_table: &str,
    item_column: &str,
    user_id: i64,
    item_id: i64,
    requested: EngagementKind,
) -> rusqlite::Result<EngagementStatus> {
    let tx = conn.transaction()?;

    // QueryReturnedNoRows maps to NotFound at the error boundary.
    tx.query_row(
        &format!("SELECT id FROM {item_table} WHERE id = ?1"),
        params![item_id],
        |_| Ok(()),
    )?;

    let current: Option<EngagementKind> = tx
        .query_row(
            &format!("SELECT kind FROM {ledger_table} WHERE user_id = ?1 AND {item_column} = ?2"),
            params![user_id, item_id],
            |row| row.get(0),
        )
        .optional()?;

    let transition = Transition::resolve(current, requested);

    match transition.action {
        LedgerAction::Create => {
            tx.execute(
                &format!(
                    "INSERT INTO {ledger_table} (user_id, {item_column}, kind) VALUES (?1, ?2, ?3)"
                ),
                params![user_id, item_id, requested],
            )?;
        }
        LedgerAction::Delete => {
            tx.execute(
                &format!("DELETE FROM {ledger_table} WHERE user_id = ?1 AND {item_column} = ?2"),
                params![user_id, item_id],
            )?;
        }
        LedgerAction::Switch => {
            tx.execute(
                &format!(
                    "UPDATE {ledger_table} SET kind = ?3 WHERE user_id = ?1 AND {item_column} = ?2"
                ),
                params![user_id, item_id, requested],
            )?;
        }
    }

    tx.execute(
        &format!(
            "UPDATE {item_table} SET like_count = like_count + ?2, \
             dislike_count = dislike_count + ?3 WHERE id = ?1"
        ),
        params![item_id, transition.like_delta, transition.dislike_delta],
    )?;

    let (like_count, dislike_count) = tx.query_row(
        &format!("SELECT like_count, dislike_count FROM {item_table} WHERE id = ?1"),
        params![item_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    tx.commit()?;

    Ok(EngagementStatus {
        is_liked: transition.state == Some(EngagementKind::Like),
        is_disliked: transition.state == Some(EngagementKind::Dislike),
        like_count,
        dislike_count,
    })
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // RFC3339 first (e.g. "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime format (e.g. "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn news_from_row(row: &Row) -> rusqlite::Result<NewsArticle> {
    Ok(NewsArticle {
        id: row.get(0)?,
        external_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        source: row.get(4)?,
        url: row.get(5)?,
        image_url: row.get(6)?,
        category: row.get(7)?,
        published_at: parse_datetime(&row.get::<_, String>(8)?).unwrap_or_else(Utc::now),
        created_at: parse_datetime(&row.get::<_, String>(9)?).unwrap_or_else(Utc::now),
        view_count: row.get(10)?,
        like_count: row.get(11)?,
        dislike_count: row.get(12)?,
        comment_count: row.get(13)?,
    })
}

fn short_from_row(row: &Row) -> rusqlite::Result<Short> {
    Ok(Short {
        id: row.get(0)?,
        news_id: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        image_url: row.get(4)?,
        like_count: row.get(5)?,
        dislike_count: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?).unwrap_or_else(Utc::now),
    })
}
