//! [`SqliteStore`], the SQLite implementation of [`Persistence`].

use std::{path::Path, sync::Arc};

use lore_core::{persist::Persistence, schema::SchemaDefinition, store::GraphSnapshot};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension as _};
use tracing::{debug, info};

use crate::{
  Result,
  encode::{RawDocument, RawEntity, RawRelationship, RawSchema, encode_dt, encode_json},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Durable schema and graph storage backed by a single SQLite file.
///
/// Cloning is cheap; clones share one connection behind a mutex, which
/// also serialises concurrent snapshot saves.
#[derive(Clone)]
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let store = Self::init(Connection::open(path)?)?;
    info!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub fn open_in_memory() -> Result<Self> { Self::init(Connection::open_in_memory()?) }

  fn init(conn: Connection) -> Result<Self> {
    conn.execute_batch(SCHEMA)?;
    Ok(Self { conn: Arc::new(Mutex::new(conn)) })
  }

  // ── Schema documents ──────────────────────────────────────────────────────

  /// The most recently appended schema document.
  pub fn latest_schema(&self) -> Result<Option<SchemaDefinition>> {
    let raw: Option<RawSchema> = self
      .conn
      .lock()
      .query_row(
        "SELECT version, updated_at, document FROM schema_versions
         ORDER BY seq DESC LIMIT 1",
        [],
        |row| {
          Ok(RawSchema {
            version:    row.get(0)?,
            updated_at: row.get(1)?,
            document:   row.get(2)?,
          })
        },
      )
      .optional()?;

    raw.map(RawSchema::into_schema).transpose()
  }

  /// Append `schema` as the newest version. Older rows are kept as history.
  pub fn append_schema(&self, schema: &SchemaDefinition) -> Result<()> {
    let version = schema.version.to_string();
    let updated_at = encode_dt(schema.updated_at);
    let document = encode_json(schema)?;

    self.conn.lock().execute(
      "INSERT INTO schema_versions (version, updated_at, document) VALUES (?1, ?2, ?3)",
      rusqlite::params![version, updated_at, document],
    )?;
    debug!(%version, "appended schema version");
    Ok(())
  }

  /// Every stored schema version, oldest first.
  pub fn schema_history(&self) -> Result<Vec<String>> {
    let conn = self.conn.lock();
    let mut stmt = conn.prepare("SELECT version FROM schema_versions ORDER BY seq")?;
    let versions = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(versions)
  }

  // ── Graph dump ────────────────────────────────────────────────────────────

  /// Replace the stored graph with `snapshot` in one transaction.
  pub fn write_snapshot(&self, snapshot: &GraphSnapshot) -> Result<()> {
    let mut conn = self.conn.lock();
    let tx = conn.transaction()?;

    // Children first so foreign keys never dangle mid-transaction.
    tx.execute("DELETE FROM documents", [])?;
    tx.execute("DELETE FROM relationships", [])?;
    tx.execute("DELETE FROM entities", [])?;

    {
      let mut stmt = tx.prepare(
        "INSERT INTO entities (seq, entity_id, kind, name, aliases, description, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      )?;
      for (seq, entity) in snapshot.entities.iter().enumerate() {
        stmt.execute(rusqlite::params![
          seq as i64,
          entity.id,
          entity.kind.as_str(),
          entity.name,
          encode_json(&entity.aliases)?,
          entity.description,
          encode_json(&entity.metadata)?,
        ])?;
      }
    }

    {
      let mut stmt = tx.prepare(
        "INSERT INTO relationships (
           seq, relationship_id, source_entity_id, target_entity_id,
           kind, confidence, metadata
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      )?;
      for (seq, relationship) in snapshot.relationships.iter().enumerate() {
        stmt.execute(rusqlite::params![
          seq as i64,
          relationship.id,
          relationship.source_entity_id,
          relationship.target_entity_id,
          relationship.kind.as_str(),
          relationship.confidence,
          encode_json(&relationship.metadata)?,
        ])?;
      }
    }

    {
      let mut stmt = tx.prepare(
        "INSERT INTO documents (
           source_id, document_id, source, entity_ids, mentions, content_hash, indexed_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      )?;
      for document in &snapshot.documents {
        stmt.execute(rusqlite::params![
          document.source.source_id,
          document.document_id,
          encode_json(&document.source)?,
          encode_json(&document.entity_ids)?,
          encode_json(&document.mentions)?,
          document.content_hash,
          encode_dt(document.indexed_at),
        ])?;
      }
    }

    tx.commit()?;
    debug!(
      entities = snapshot.entities.len(),
      relationships = snapshot.relationships.len(),
      documents = snapshot.documents.len(),
      "wrote graph snapshot"
    );
    Ok(())
  }

  /// The stored graph in its original insertion order.
  pub fn read_snapshot(&self) -> Result<GraphSnapshot> {
    let conn = self.conn.lock();

    let entities = conn
      .prepare(
        "SELECT entity_id, kind, name, aliases, description, metadata
         FROM entities ORDER BY seq",
      )?
      .query_map([], |row| {
        Ok(RawEntity {
          entity_id:   row.get(0)?,
          kind:        row.get(1)?,
          name:        row.get(2)?,
          aliases:     row.get(3)?,
          description: row.get(4)?,
          metadata:    row.get(5)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?
      .into_iter()
      .map(RawEntity::into_entity)
      .collect::<Result<Vec<_>>>()?;

    let relationships = conn
      .prepare(
        "SELECT relationship_id, source_entity_id, target_entity_id, kind, confidence, metadata
         FROM relationships ORDER BY seq",
      )?
      .query_map([], |row| {
        Ok(RawRelationship {
          relationship_id:  row.get(0)?,
          source_entity_id: row.get(1)?,
          target_entity_id: row.get(2)?,
          kind:             row.get(3)?,
          confidence:       row.get(4)?,
          metadata:         row.get(5)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?
      .into_iter()
      .map(RawRelationship::into_relationship)
      .collect::<Result<Vec<_>>>()?;

    let documents = conn
      .prepare(
        "SELECT document_id, source, entity_ids, mentions, content_hash, indexed_at
         FROM documents ORDER BY source_id",
      )?
      .query_map([], |row| {
        Ok(RawDocument {
          document_id:  row.get(0)?,
          source:       row.get(1)?,
          entity_ids:   row.get(2)?,
          mentions:     row.get(3)?,
          content_hash: row.get(4)?,
          indexed_at:   row.get(5)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?
      .into_iter()
      .map(RawDocument::into_document)
      .collect::<Result<Vec<_>>>()?;

    Ok(GraphSnapshot { entities, relationships, documents })
  }
}

// ─── Persistence impl ────────────────────────────────────────────────────────

impl Persistence for SqliteStore {
  fn load_schema(&self) -> lore_core::Result<Option<SchemaDefinition>> {
    Ok(self.latest_schema()?)
  }

  fn save_schema(&self, schema: &SchemaDefinition) -> lore_core::Result<()> {
    Ok(self.append_schema(schema)?)
  }

  /// `None` when nothing has been written yet.
  fn load_snapshot(&self) -> lore_core::Result<Option<GraphSnapshot>> {
    let snapshot = self.read_snapshot()?;
    Ok((!snapshot.is_empty()).then_some(snapshot))
  }

  fn save_snapshot(&self, snapshot: &GraphSnapshot) -> lore_core::Result<()> {
    Ok(self.write_snapshot(snapshot)?)
  }
}
