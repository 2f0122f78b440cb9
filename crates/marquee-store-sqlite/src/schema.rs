//! SQL schema for the Marquee SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Rows are never deleted. The only UPDATE ever issued flips `active` off.
CREATE TABLE IF NOT EXISTS placements (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order
    placement_id TEXT NOT NULL UNIQUE,
    slot_key     TEXT NOT NULL,
    content_type TEXT NOT NULL,
    content_id   TEXT,                               -- NULL clears the slot
    priority     INTEGER NOT NULL DEFAULT 0,
    active       INTEGER NOT NULL DEFAULT 1,
    starts_at    TEXT,
    ends_at      TEXT,
    device_scope TEXT NOT NULL DEFAULT 'all',        -- 'all' | 'mobile' | 'desktop'
    metadata     TEXT NOT NULL DEFAULT '{}',
    created_at   TEXT NOT NULL,                      -- RFC 3339, fixed-width nanos
    updated_by   TEXT NOT NULL,
    CHECK (starts_at IS NULL OR ends_at IS NULL OR ends_at > starts_at)
);

CREATE INDEX IF NOT EXISTS placements_slot_idx
    ON placements(slot_key, active, priority DESC, created_at DESC);

-- Append-only. Each row chains to the previous one through integrity_hash.
CREATE TABLE IF NOT EXISTS audit_log (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id       TEXT NOT NULL UNIQUE,
    recorded_at    TEXT NOT NULL,
    actor_id       TEXT NOT NULL,
    action         TEXT NOT NULL,
    target_type    TEXT NOT NULL,
    target_id      TEXT NOT NULL,
    metadata       TEXT NOT NULL DEFAULT '{}',
    integrity_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS audit_target_idx ON audit_log(target_type, target_id);

CREATE TRIGGER IF NOT EXISTS audit_log_no_update
BEFORE UPDATE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit_log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_log_no_delete
BEFORE DELETE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit_log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS placements_no_delete
BEFORE DELETE ON placements
BEGIN
    SELECT RAISE(ABORT, 'placements are never deleted');
END;

-- Local mirror of the external content store, for the picker.
CREATE TABLE IF NOT EXISTS content_items (
    content_type  TEXT NOT NULL,
    content_id    TEXT NOT NULL,
    title         TEXT NOT NULL,
    thumbnail_url TEXT,
    href          TEXT,
    PRIMARY KEY (content_type, content_id)
);

CREATE TABLE IF NOT EXISTS walkthrough_completions (
    operator_id  TEXT PRIMARY KEY,
    completed_at TEXT NOT NULL
);

PRAGMA user_version = 1;
";
