//! Encoding and decoding helpers between Lore domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Type enums are stored as
//! their snake_case keys. Open maps and lists (aliases, metadata, mentions)
//! are stored as compact JSON.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use lore_core::{
  entity::{Entity, EntityType, Mention, Metadata, Relationship, RelationshipType},
  schema::SchemaDefinition,
  source::{IndexedDocument, Source},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Type keys ───────────────────────────────────────────────────────────────

pub fn decode_entity_type(s: &str) -> Result<EntityType> {
  EntityType::from_str(s)
    .map_err(|_| Error::UnknownKind { what: "entity type", value: s.to_owned() })
}

pub fn decode_relationship_type(s: &str) -> Result<RelationshipType> {
  RelationshipType::from_str(s)
    .map_err(|_| Error::UnknownKind { what: "relationship type", value: s.to_owned() })
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `schema_versions` row.
pub struct RawSchema {
  pub version:    String,
  pub updated_at: String,
  pub document:   String,
}

impl RawSchema {
  pub fn into_schema(self) -> Result<SchemaDefinition> {
    let schema: SchemaDefinition = serde_json::from_str(&self.document)?;
    // The columns are written from the document; disagreement means the row
    // was edited by hand.
    if schema.version.to_string() != self.version {
      return Err(Error::Corrupt(format!(
        "schema row {} holds a document for version {}",
        self.version, schema.version
      )));
    }
    decode_dt(&self.updated_at)?;
    Ok(schema)
  }
}

/// Raw values read directly from an `entities` row.
pub struct RawEntity {
  pub entity_id:   String,
  pub kind:        String,
  pub name:        String,
  pub aliases:     String,
  pub description: String,
  pub metadata:    String,
}

impl RawEntity {
  pub fn into_entity(self) -> Result<Entity> {
    Ok(Entity {
      id:          self.entity_id,
      kind:        decode_entity_type(&self.kind)?,
      name:        self.name,
      aliases:     serde_json::from_str(&self.aliases)?,
      description: self.description,
      metadata:    serde_json::from_str::<Metadata>(&self.metadata)?,
    })
  }
}

/// Raw values read directly from a `relationships` row.
pub struct RawRelationship {
  pub relationship_id:  String,
  pub source_entity_id: String,
  pub target_entity_id: String,
  pub kind:             String,
  pub confidence:       f64,
  pub metadata:         String,
}

impl RawRelationship {
  pub fn into_relationship(self) -> Result<Relationship> {
    Ok(Relationship {
      id:               self.relationship_id,
      source_entity_id: self.source_entity_id,
      target_entity_id: self.target_entity_id,
      kind:             decode_relationship_type(&self.kind)?,
      confidence:       self.confidence,
      metadata:         serde_json::from_str(&self.metadata)?,
    })
  }
}

/// Raw strings read directly from a `documents` row.
pub struct RawDocument {
  pub document_id:  String,
  pub source:       String,
  pub entity_ids:   String,
  pub mentions:     String,
  pub content_hash: String,
  pub indexed_at:   String,
}

impl RawDocument {
  pub fn into_document(self) -> Result<IndexedDocument> {
    Ok(IndexedDocument {
      document_id:  self.document_id,
      source:       serde_json::from_str::<Source>(&self.source)?,
      entity_ids:   serde_json::from_str(&self.entity_ids)?,
      mentions:     serde_json::from_str::<Vec<Mention>>(&self.mentions)?,
      content_hash: self.content_hash,
      indexed_at:   decode_dt(&self.indexed_at)?,
    })
  }
}
