pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- repositories table
CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    upstream_id INTEGER NOT NULL UNIQUE,
    owner TEXT NOT NULL COLLATE NOCASE,
    name TEXT NOT NULL COLLATE NOCASE,
    full_name TEXT NOT NULL,
    description TEXT,
    html_url TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(owner, name)
);

-- releases table (append-only)
CREATE TABLE IF NOT EXISTS releases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    upstream_release_id INTEGER NOT NULL UNIQUE,
    tag_name TEXT NOT NULL,
    name TEXT,
    published_at TEXT NOT NULL,
    body TEXT,
    html_url TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_releases_repository_published
    ON releases(repository_id, published_at DESC);

-- seen_marks table
CREATE TABLE IF NOT EXISTS seen_marks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    release_id INTEGER NOT NULL REFERENCES releases(id) ON DELETE CASCADE,
    seen_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(repository_id, release_id)
);

CREATE INDEX IF NOT EXISTS idx_seen_marks_release ON seen_marks(release_id);
"#;
