//! SQL schemas for the placement SQLite stores.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Primary and archive collections; idempotent thanks to
/// `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS companies (
    id                  TEXT PRIMARY KEY,
    name                TEXT NOT NULL,
    description         TEXT NOT NULL,
    address             TEXT NOT NULL,
    contact_email       TEXT NOT NULL,
    website             TEXT NOT NULL,
    fields              TEXT NOT NULL DEFAULT '[]',   -- JSON array, display order
    skills_required     TEXT NOT NULL DEFAULT '[]',   -- JSON array, display order
    mode_of_work        TEXT NOT NULL DEFAULT '[]',   -- JSON array of tags
    moa_present         INTEGER,                      -- NULL on legacy rows
    moa_validity_years  INTEGER,
    moa_start_date      TEXT,                         -- YYYY-MM-DD
    moa_expiration_date TEXT,                         -- derived
    moa_status          TEXT NOT NULL DEFAULT 'no-moa',
    visible_to_mobile   INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    created_by          TEXT,                         -- JSON attribution or NULL
    version             INTEGER NOT NULL DEFAULT 1
);

-- Frozen snapshots. The full record is kept as JSON so nothing is lost even if
-- the companies table gains columns later.
CREATE TABLE IF NOT EXISTS archived_companies (
    id              TEXT PRIMARY KEY,
    snapshot        TEXT NOT NULL,
    deleted_at      TEXT NOT NULL,
    deleted_by_role TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS companies_status_idx ON companies(moa_status);

PRAGMA user_version = 1;
";

/// The mobile projection collection.
pub const MIRROR_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS mobile_companies (
    id                 TEXT PRIMARY KEY,
    name               TEXT NOT NULL,
    moa_present        INTEGER NOT NULL,
    moa_validity_years INTEGER,
    updated_at         TEXT NOT NULL
);

PRAGMA user_version = 1;
";
