//! Recommendation scorer: rank recent un-interacted articles for one user
//! from three signals (explicit category preferences, bookmark history,
//! like/dislike history), then apply a per-category diversity cap with
//! backfill. Read-only; no stored state is mutated.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Repository;
use crate::error::Result;
use crate::models::{NewsArticle, RecommendedArticle};

/// Scoring and pool tunables. The defaults are load-bearing: changing them
/// changes ranking behavior, which is why they are config values rather
/// than literals in the scoring code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    /// Flat bonus when the article's category is explicitly preferred.
    #[serde(default = "default_preferred_bonus")]
    pub preferred_bonus: f64,

    /// Multiplier on the ln(count+1) affinity terms.
    #[serde(default = "default_affinity_weight")]
    pub affinity_weight: f64,

    /// Candidate pool window in days.
    #[serde(default = "default_candidate_window_days")]
    pub candidate_window_days: i64,

    /// Pool size is `size * candidate_multiplier`, clamped to
    /// `candidate_cap`.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: u32,

    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: u32,

    /// Diversity cap: same-category items allowed before backfill.
    #[serde(default = "default_max_per_category")]
    pub max_per_category: usize,
}

fn default_preferred_bonus() -> f64 {
    30.0
}

fn default_affinity_weight() -> f64 {
    5.0
}

fn default_candidate_window_days() -> i64 {
    60
}

fn default_candidate_multiplier() -> u32 {
    10
}

fn default_candidate_cap() -> u32 {
    200
}

fn default_max_per_category() -> usize {
    2
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            preferred_bonus: default_preferred_bonus(),
            affinity_weight: default_affinity_weight(),
            candidate_window_days: default_candidate_window_days(),
            candidate_multiplier: default_candidate_multiplier(),
            candidate_cap: default_candidate_cap(),
            max_per_category: default_max_per_category(),
        }
    }
}

/// Per-user signals gathered before scoring.
#[derive(Debug, Default)]
pub struct UserSignals {
    pub preferred: HashSet<String>,
    pub bookmark_counts: HashMap<String, i64>,
    pub like_counts: HashMap<String, i64>,
    pub dislike_counts: HashMap<String, i64>,
}

pub struct Recommender {
    repository: Arc<Repository>,
    config: RecommendConfig,
}

impl Recommender {
    pub fn new(repository: Arc<Repository>, config: RecommendConfig) -> Self {
        Self { repository, config }
    }

    pub async fn recommend(&self, user_id: i64, size: usize) -> Result<Vec<RecommendedArticle>> {
        let size = if size == 0 { 5 } else { size };

        let signals = self.gather_signals(user_id).await?;

        let pool_limit = (size as u32)
            .saturating_mul(self.config.candidate_multiplier)
            .clamp(size as u32, self.config.candidate_cap);
        let published_after = Utc::now() - Duration::days(self.config.candidate_window_days);
        let candidates = self
            .repository
            .recommendation_candidates(user_id, published_after, pool_limit)
            .await?;

        Ok(rank(candidates, &signals, &self.config, size)
            .into_iter()
            .map(RecommendedArticle::from)
            .collect())
    }

    async fn gather_signals(&self, user_id: i64) -> Result<UserSignals> {
        let preferred = self
            .repository
            .get_preferred_categories(user_id)
            .await?
            .into_iter()
            .collect();
        let bookmark_counts = self.repository.bookmark_category_stats(user_id).await?;
        let (like_counts, dislike_counts) =
            self.repository.engagement_category_stats(user_id).await?;
        Ok(UserSignals {
            preferred,
            bookmark_counts,
            like_counts,
            dislike_counts,
        })
    }
}

/// Score and order the pool, then fill up to `size` under the diversity
/// cap, backfilling from the remaining sorted candidates when the cap
/// leaves the list short.
fn rank(
    candidates: Vec<NewsArticle>,
    signals: &UserSignals,
    config: &RecommendConfig,
    size: usize,
) -> Vec<NewsArticle> {
    let mut scored: Vec<(f64, NewsArticle)> = candidates
        .into_iter()
        .map(|news| (score(&news, signals, config), news))
        .collect();

    // Ties break toward the more recently published item.
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.1.published_at.cmp(&a.1.published_at))
    });

    let mut picked: Vec<usize> = Vec::with_capacity(size);
    let mut per_category: HashMap<&str, usize> = HashMap::new();
    for (idx, (_, news)) in scored.iter().enumerate() {
        if picked.len() >= size {
            break;
        }
        let count = per_category.entry(news.category.as_str()).or_insert(0);
        if *count >= config.max_per_category {
            continue;
        }
        *count += 1;
        picked.push(idx);
    }

    if picked.len() < size {
        for idx in 0..scored.len() {
            if picked.len() >= size {
                break;
            }
            if !picked.contains(&idx) {
                picked.push(idx);
            }
        }
    }

    let mut items: Vec<Option<NewsArticle>> =
        scored.into_iter().map(|(_, news)| Some(news)).collect();
    picked
        .into_iter()
        .filter_map(|idx| items[idx].take())
        .collect()
}

fn score(news: &NewsArticle, signals: &UserSignals, config: &RecommendConfig) -> f64 {
    let mut score = 0.0;
    if signals.preferred.contains(&news.category) {
        score += config.preferred_bonus;
    }
    score += affinity(&signals.bookmark_counts, &news.category, config);
    score += affinity(&signals.like_counts, &news.category, config);
    score -= affinity(&signals.dislike_counts, &news.category, config);
    score
}

fn affinity(counts: &HashMap<String, i64>, category: &str, config: &RecommendConfig) -> f64 {
    match counts.get(category) {
        Some(&count) if count > 0 => config.affinity_weight * ((count as f64) + 1.0).ln(),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn article(id: i64, category: &str, published_at: DateTime<Utc>) -> NewsArticle {
        NewsArticle {
            id,
            external_id: format!("https://n.example/{id}"),
            title: format!("article {id}"),
            content: "body".to_string(),
            source: "src".to_string(),
            url: format!("https://n.example/{id}"),
            image_url: None,
            category: category.to_string(),
            published_at,
            created_at: published_at,
            view_count: 0,
            like_count: 0,
            dislike_count: 0,
            comment_count: 0,
        }
    }

    fn signals_preferring(category: &str) -> UserSignals {
        UserSignals {
            preferred: [category.to_string()].into_iter().collect(),
            ..UserSignals::default()
        }
    }

    #[test]
    fn preferred_category_outranks_recency() {
        let now = Utc::now();
        let candidates = vec![
            article(1, "sports", now),
            article(2, "tech", now - Duration::hours(6)),
        ];
        let config = RecommendConfig::default();
        let ranked = rank(candidates, &signals_preferring("tech"), &config, 2);
        assert_eq!(ranked[0].id, 2);
        assert_eq!(ranked[1].id, 1);
    }

    #[test]
    fn ties_break_toward_newer_items() {
        let now = Utc::now();
        let candidates = vec![
            article(1, "tech", now - Duration::hours(3)),
            article(2, "tech", now),
        ];
        let config = RecommendConfig::default();
        let ranked = rank(candidates, &UserSignals::default(), &config, 2);
        assert_eq!(ranked[0].id, 2);
    }

    #[test]
    fn dislike_history_pushes_category_down() {
        let now = Utc::now();
        let mut signals = UserSignals::default();
        signals.dislike_counts.insert("sports".to_string(), 5);
        let candidates = vec![
            article(1, "sports", now),
            article(2, "tech", now - Duration::hours(1)),
        ];
        let config = RecommendConfig::default();
        let ranked = rank(candidates, &signals, &config, 2);
        assert_eq!(ranked[0].id, 2);
    }

    #[test]
    fn diversity_cap_limits_same_category() {
        let now = Utc::now();
        let candidates = vec![
            article(1, "tech", now),
            article(2, "tech", now - Duration::hours(1)),
            article(3, "tech", now - Duration::hours(2)),
            article(4, "health", now - Duration::hours(3)),
        ];
        let config = RecommendConfig::default();
        let ranked = rank(candidates, &signals_preferring("tech"), &config, 3);
        let tech_count = ranked.iter().filter(|n| n.category == "tech").count();
        assert_eq!(tech_count, 2);
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().any(|n| n.category == "health"));
    }

    #[test]
    fn backfill_relaxes_cap_when_pool_is_narrow() {
        let now = Utc::now();
        let candidates = vec![
            article(1, "tech", now),
            article(2, "tech", now - Duration::hours(1)),
            article(3, "tech", now - Duration::hours(2)),
        ];
        let config = RecommendConfig::default();
        let ranked = rank(candidates, &UserSignals::default(), &config, 3);
        // Cap allows 2, backfill tops the list back up to the asked size.
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[2].id, 3);
    }

    #[tokio::test]
    async fn recommend_excludes_interacted_and_keeps_output_shape() {
        use crate::models::{EngagementKind, NewNewsArticle};

        let repo = Arc::new(Repository::new(":memory:").await.unwrap());
        let now = Utc::now();
        let mut batch = Vec::new();
        for (id, category) in [(1, "tech"), (2, "tech"), (3, "health")] {
            batch.push(NewNewsArticle {
                external_id: format!("https://n.example/{id}"),
                title: format!("article {id}"),
                content: "body".to_string(),
                source: "src".to_string(),
                url: format!("https://n.example/{id}"),
                image_url: None,
                category: category.to_string(),
                published_at: now - Duration::hours(id),
            });
        }
        repo.insert_news_batch(batch).await.unwrap();

        let liked = repo
            .find_news_by_external_id("https://n.example/1")
            .await
            .unwrap()
            .unwrap();
        repo.set_news_engagement(7, liked.id, EngagementKind::Like)
            .await
            .unwrap();
        repo.set_preferred_categories(7, vec!["health".to_string()])
            .await
            .unwrap();

        let recommender = Recommender::new(repo, RecommendConfig::default());
        let result = recommender.recommend(7, 5).await.unwrap();

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|item| item.news_id != liked.id));
        // Health is preferred and the tech category carries a like signal;
        // the flat preference bonus dominates.
        assert_eq!(result[0].category, "health");
    }
}
