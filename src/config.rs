use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::recommend::RecommendConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    // Upstream credentials; required in scheduler mode.
    pub source_client_id: Option<String>,
    pub source_client_secret: Option<String>,
    pub claude_api_key: Option<String>,

    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    #[serde(default = "default_items_per_category")]
    pub items_per_category: u32,

    #[serde(default = "default_fetch_interval_hours")]
    pub fetch_interval_hours: u64,

    /// Articles ingested more than this many days ago are swept.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Candidates tried per category before giving up on a short.
    #[serde(default = "default_shorts_candidates")]
    pub shorts_candidates: u32,

    /// Only articles ingested within this window are short candidates.
    #[serde(default = "default_shorts_window_hours")]
    pub shorts_window_hours: i64,

    /// Crawled bodies shorter than this are discarded.
    #[serde(default = "default_min_article_chars")]
    pub min_article_chars: usize,

    #[serde(default)]
    pub recommend: RecommendConfig,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsclip");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("newsclip.db").to_string_lossy().to_string()
}

fn default_categories() -> Vec<String> {
    [
        "politics",
        "economy",
        "culture",
        "environment",
        "technology",
        "sports",
        "lifestyle",
        "health",
        "education",
        "food",
        "travel",
        "fashion",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_items_per_category() -> u32 {
    5
}

fn default_fetch_interval_hours() -> u64 {
    3
}

fn default_retention_days() -> i64 {
    14
}

fn default_shorts_candidates() -> u32 {
    3
}

fn default_shorts_window_hours() -> i64 {
    24
}

fn default_min_article_chars() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            source_client_id: None,
            source_client_secret: None,
            claude_api_key: None,
            categories: default_categories(),
            items_per_category: default_items_per_category(),
            fetch_interval_hours: default_fetch_interval_hours(),
            retention_days: default_retention_days(),
            shorts_candidates: default_shorts_candidates(),
            shorts_window_hours: default_shorts_window_hours(),
            min_article_chars: default_min_article_chars(),
            recommend: RecommendConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("newsclip")
            .join("config.toml")
    }

    /// Source API credentials, or a Config error naming the missing field.
    pub fn source_credentials(&self) -> Result<(String, String)> {
        let client_id = self
            .source_client_id
            .clone()
            .ok_or_else(|| AppError::Config("source_client_id is not set".to_string()))?;
        let client_secret = self
            .source_client_secret
            .clone()
            .ok_or_else(|| AppError::Config("source_client_secret is not set".to_string()))?;
        Ok((client_id, client_secret))
    }

    pub fn summarizer_key(&self) -> Result<String> {
        self.claude_api_key
            .clone()
            .ok_or_else(|| AppError::Config("claude_api_key is not set".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_fills_every_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.items_per_category, 5);
        assert_eq!(config.fetch_interval_hours, 3);
        assert_eq!(config.retention_days, 14);
        assert_eq!(config.shorts_candidates, 3);
        assert_eq!(config.min_article_chars, 100);
        assert_eq!(config.categories.len(), 12);
        assert_eq!(config.recommend.preferred_bonus, 30.0);
        assert_eq!(config.recommend.affinity_weight, 5.0);
        assert_eq!(config.recommend.max_per_category, 2);
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        let config: Config = toml::from_str("").unwrap();
        assert!(matches!(
            config.source_credentials(),
            Err(AppError::Config(_))
        ));
        assert!(matches!(config.summarizer_key(), Err(AppError::Config(_))));
    }

    #[test]
    fn config_read_failure_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.toml");
        let err = Config::load_from(&missing).unwrap_err();
        assert!(matches!(err, AppError::Other(_)));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn overrides_survive_round_trip() {
        let config: Config = toml::from_str(
            r#"
            items_per_category = 10
            categories = ["technology"]

            [recommend]
            preferred_bonus = 12.5
            "#,
        )
        .unwrap();
        assert_eq!(config.items_per_category, 10);
        assert_eq!(config.categories, vec!["technology".to_string()]);
        assert_eq!(config.recommend.preferred_bonus, 12.5);
        // Untouched nested fields still default.
        assert_eq!(config.recommend.max_per_category, 2);
    }
}
