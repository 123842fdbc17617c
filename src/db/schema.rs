pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- news table (one row per ingested article, deduped on external_id)
CREATE TABLE IF NOT EXISTS news (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    source TEXT NOT NULL,
    url TEXT NOT NULL,
    image_url TEXT,
    category TEXT NOT NULL,
    published_at TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    view_count INTEGER NOT NULL DEFAULT 0,
    like_count INTEGER NOT NULL DEFAULT 0,
    dislike_count INTEGER NOT NULL DEFAULT 0,
    comment_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_news_category_published ON news(category, published_at DESC);
CREATE INDEX IF NOT EXISTS idx_news_created_at ON news(created_at);

-- shorts table (at most one per news row; news_id goes NULL when the
-- original article is swept)
CREATE TABLE IF NOT EXISTS shorts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    news_id INTEGER UNIQUE REFERENCES news(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    image_url TEXT,
    like_count INTEGER NOT NULL DEFAULT 0,
    dislike_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- news engagement ledger (zero or one row per user/article pair)
CREATE TABLE IF NOT EXISTS news_engagements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    news_id INTEGER NOT NULL REFERENCES news(id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('like', 'dislike')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(user_id, news_id)
);

CREATE INDEX IF NOT EXISTS idx_news_engagements_user ON news_engagements(user_id);

-- shorts engagement ledger (same shape, independent table)
CREATE TABLE IF NOT EXISTS short_engagements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    short_id INTEGER NOT NULL REFERENCES shorts(id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('like', 'dislike')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(user_id, short_id)
);

CREATE INDEX IF NOT EXISTS idx_short_engagements_user ON short_engagements(user_id);

-- bookmarks (existence-only, no cached count on news)
CREATE TABLE IF NOT EXISTS bookmarks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    news_id INTEGER NOT NULL REFERENCES news(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(user_id, news_id)
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_user ON bookmarks(user_id);

-- per-user preferred categories, replaced wholesale on update
CREATE TABLE IF NOT EXISTS preferred_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    category TEXT NOT NULL,
    UNIQUE(user_id, category)
);
"#;
