//! SQL schema for the Lore SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Every saved schema document. Rows are only ever appended; the highest
-- seq is the current schema.
CREATE TABLE IF NOT EXISTS schema_versions (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    version     TEXT NOT NULL,   -- x.y.z
    updated_at  TEXT NOT NULL,   -- RFC 3339 UTC
    document    TEXT NOT NULL    -- full SchemaDefinition as JSON
);

-- The graph dump. seq preserves insertion order across a save/load.
CREATE TABLE IF NOT EXISTS entities (
    seq          INTEGER PRIMARY KEY,
    entity_id    TEXT NOT NULL UNIQUE,
    kind         TEXT NOT NULL,
    name         TEXT NOT NULL,
    aliases      TEXT NOT NULL DEFAULT '[]',
    description  TEXT NOT NULL DEFAULT '',
    metadata     TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS relationships (
    seq               INTEGER PRIMARY KEY,
    relationship_id   TEXT NOT NULL UNIQUE,
    source_entity_id  TEXT NOT NULL REFERENCES entities(entity_id),
    target_entity_id  TEXT NOT NULL REFERENCES entities(entity_id),
    kind              TEXT NOT NULL,
    confidence        REAL NOT NULL CHECK (confidence BETWEEN 0.0 AND 1.0),
    metadata          TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS documents (
    source_id     TEXT PRIMARY KEY,
    document_id   TEXT NOT NULL UNIQUE,
    source        TEXT NOT NULL,   -- full Source as JSON
    entity_ids    TEXT NOT NULL,   -- JSON array, extraction order
    mentions      TEXT NOT NULL,   -- JSON array of Mention
    content_hash  TEXT NOT NULL,
    indexed_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS relationships_source_idx ON relationships(source_entity_id);
CREATE INDEX IF NOT EXISTS relationships_target_idx ON relationships(target_entity_id);

PRAGMA user_version = 1;
";
