//! SQL schema for the Snapmark SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL DEFAULT '',
    password_hash TEXT NOT NULL,        -- argon2 PHC string
    first_name    TEXT NOT NULL DEFAULT '',
    last_name     TEXT NOT NULL DEFAULT '',
    date_joined   TEXT NOT NULL
);

-- Exactly one row per user, written in the same transaction as the user.
CREATE TABLE IF NOT EXISTS profiles (
    user_id       INTEGER PRIMARY KEY REFERENCES users(user_id) ON DELETE CASCADE,
    date_of_birth TEXT,                 -- YYYY-MM-DD
    photo         TEXT
);

-- Follow relation: user_from follows user_to.
CREATE TABLE IF NOT EXISTS contacts (
    user_from INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    user_to   INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    created   TEXT NOT NULL,
    PRIMARY KEY (user_from, user_to),
    CHECK (user_from != user_to)
);

CREATE TABLE IF NOT EXISTS images (
    image_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id     INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    title        TEXT NOT NULL,
    slug         TEXT NOT NULL,
    url          TEXT NOT NULL,
    image_path   TEXT,
    content_hash TEXT,
    description  TEXT NOT NULL DEFAULT '',
    created      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS image_likes (
    image_id INTEGER NOT NULL REFERENCES images(image_id) ON DELETE CASCADE,
    user_id  INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    PRIMARY KEY (image_id, user_id)
);

-- Actions are strictly append-only.
CREATE TABLE IF NOT EXISTS actions (
    action_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id    INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    verb        TEXT NOT NULL,
    target_kind TEXT,                   -- 'user' | 'image' | NULL
    target_id   INTEGER,
    created     TEXT NOT NULL,
    CHECK ((target_kind IS NULL) = (target_id IS NULL))
);

CREATE INDEX IF NOT EXISTS images_created_idx  ON images(created);
CREATE INDEX IF NOT EXISTS actions_dedup_idx   ON actions(actor_id, verb, created);
CREATE INDEX IF NOT EXISTS actions_created_idx ON actions(created);

PRAGMA user_version = 1;
";
