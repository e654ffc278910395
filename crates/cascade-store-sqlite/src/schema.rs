//! SQL schema for the Cascade SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Item payloads are write-once; only the counters change.
CREATE TABLE IF NOT EXISTS items (
    item_id       TEXT PRIMARY KEY,
    topic         TEXT NOT NULL,
    subject       TEXT,
    kind          TEXT NOT NULL,   -- discriminant of ItemPayload
    payload_json  TEXT NOT NULL,   -- JSON payload (inner data only)
    image_query   TEXT,
    upvotes       INTEGER NOT NULL DEFAULT 0,
    downvotes     INTEGER NOT NULL DEFAULT 0,
    comment_count INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    generated_by  TEXT
);

-- At most one vote per user per item.
CREATE TABLE IF NOT EXISTS votes (
    item_id   TEXT NOT NULL REFERENCES items(item_id),
    user_id   TEXT NOT NULL,
    direction TEXT NOT NULL,   -- 'up' | 'down'
    PRIMARY KEY (item_id, user_id)
);

-- Learners are created lazily on first write.
CREATE TABLE IF NOT EXISTS learners (
    user_id    TEXT PRIMARY KEY,
    xp         INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS learner_subjects (
    user_id    TEXT NOT NULL REFERENCES learners(user_id),
    name       TEXT NOT NULL,
    difficulty TEXT NOT NULL,
    position   INTEGER NOT NULL,
    PRIMARY KEY (user_id, name)
);

CREATE TABLE IF NOT EXISTS topic_expertise (
    user_id    TEXT NOT NULL REFERENCES learners(user_id),
    topic      TEXT NOT NULL,
    difficulty TEXT NOT NULL,
    PRIMARY KEY (user_id, topic)
);

CREATE TABLE IF NOT EXISTS viewed_items (
    user_id     TEXT NOT NULL REFERENCES learners(user_id),
    item_id     TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (user_id, item_id)
);

-- Quizzes answered wrongly, re-injected with priority.
CREATE TABLE IF NOT EXISTS retry_items (
    user_id     TEXT NOT NULL REFERENCES learners(user_id),
    item_id     TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (user_id, item_id)
);

-- Append-only log of short dwells.
CREATE TABLE IF NOT EXISTS avoided_topics (
    avoid_id    TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    item_id     TEXT NOT NULL,
    topic       TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id TEXT PRIMARY KEY,
    item_id    TEXT NOT NULL REFERENCES items(item_id),
    user_id    TEXT NOT NULL,
    user_name  TEXT NOT NULL,
    text       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS items_subject_idx    ON items(subject, created_at);
CREATE INDEX IF NOT EXISTS items_created_idx    ON items(created_at);
CREATE INDEX IF NOT EXISTS comments_item_idx    ON comments(item_id, created_at);
CREATE INDEX IF NOT EXISTS avoided_user_idx     ON avoided_topics(user_id);

PRAGMA user_version = 1;
";
