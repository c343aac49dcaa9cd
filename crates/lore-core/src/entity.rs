//! Entities, relationships, and mentions: the nodes, edges, and located
//! references that make up the knowledge graph.
//!
//! Entities are never deleted. A second sighting of the same thing is merged
//! into the existing record by extending its `aliases` and `metadata`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result};

/// Open, string-keyed property bag. Schema-defined properties live here
/// alongside anything else a caller wants to attach.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Metadata key listing every source an entity was extracted from.
pub const SOURCE_IDS_KEY: &str = "source_ids";

// ─── Types ───────────────────────────────────────────────────────────────────

/// The kind of thing an entity names.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
  Person,
  Organization,
  Location,
  Concept,
  Product,
  Event,
  Date,
  Fact,
  Claim,
  #[default]
  Other,
}

impl EntityType {
  /// The schema key for this type.
  pub fn as_str(self) -> &'static str { self.into() }

  /// Parse a schema key; anything unrecognised becomes [`EntityType::Other`].
  pub fn from_key(key: &str) -> Self {
    key.trim().to_ascii_lowercase().parse().unwrap_or(Self::Other)
  }
}

/// The kind of a directed edge between two entities.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RelationshipType {
  IsA,
  PartOf,
  LocatedIn,
  CreatedBy,
  WorksFor,
  HasProperty,
  RelatedTo,
  Contradicts,
  Supports,
  Temporal,
  Causal,
  #[default]
  Other,
}

impl RelationshipType {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn from_key(key: &str) -> Self {
    key.trim().to_ascii_lowercase().parse().unwrap_or(Self::Other)
  }
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// A typed, named node. Identity is `id`; `name` is not unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
  pub id:          String,
  #[serde(rename = "type")]
  pub kind:        EntityType,
  pub name:        String,
  #[serde(default)]
  pub aliases:     Vec<String>,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub metadata:    Metadata,
}

impl Entity {
  /// A fresh entity with a random id and empty optional fields.
  pub fn new(kind: EntityType, name: impl Into<String>) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      kind,
      name: name.into(),
      aliases: Vec::new(),
      description: String::new(),
      metadata: Metadata::new(),
    }
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = id.into();
    self
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  pub fn with_metadata(
    mut self,
    key: impl Into<String>,
    value: serde_json::Value,
  ) -> Self {
    self.metadata.insert(key.into(), value);
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.id.trim().is_empty() {
      return Err(Error::validation("entity id must not be empty"));
    }
    if self.name.trim().is_empty() {
      return Err(Error::validation(format!(
        "entity {} must have a non-empty name",
        self.id
      )));
    }
    Ok(())
  }

  /// Case-folded, whitespace-normalised name used for disambiguation.
  pub fn canonical_name(&self) -> String { canonicalize(&self.name) }

  /// Record an alternative spelling unless it already matches the name or an
  /// existing alias. Returns `true` when the alias was added.
  pub fn add_alias(&mut self, alias: &str) -> bool {
    let canonical = canonicalize(alias);
    if canonical.is_empty() || canonical == self.canonical_name() {
      return false;
    }
    if self.aliases.iter().any(|a| canonicalize(a) == canonical) {
      return false;
    }
    self.aliases.push(alias.to_owned());
    true
  }

  /// Ids of the sources this entity was extracted from, in first-seen order.
  pub fn source_ids(&self) -> Vec<String> {
    self
      .metadata
      .get(SOURCE_IDS_KEY)
      .and_then(|v| v.as_array())
      .map(|ids| {
        ids
          .iter()
          .filter_map(|id| id.as_str().map(str::to_owned))
          .collect()
      })
      .unwrap_or_default()
  }

  /// Append `source_id` to the `source_ids` metadata list if absent.
  pub fn add_source(&mut self, source_id: &str) {
    let mut ids = self.source_ids();
    if ids.iter().any(|id| id == source_id) {
      return;
    }
    ids.push(source_id.to_owned());
    self
      .metadata
      .insert(SOURCE_IDS_KEY.to_owned(), serde_json::json!(ids));
  }
}

/// Lowercase, drop punctuation, collapse whitespace.
pub fn canonicalize(name: &str) -> String {
  name
    .to_lowercase()
    .chars()
    .map(|c| if c.is_alphanumeric() { c } else { ' ' })
    .collect::<String>()
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
}

// ─── Relationship ────────────────────────────────────────────────────────────

/// A directed, typed, confidence-scored edge. Several relationships of
/// different types may connect the same ordered pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
  pub id:               String,
  pub source_entity_id: String,
  pub target_entity_id: String,
  #[serde(rename = "type")]
  pub kind:             RelationshipType,
  pub confidence:       f64,
  #[serde(default)]
  pub metadata:         Metadata,
}

impl Relationship {
  /// A fresh relationship with a random id. `confidence` is clamped to
  /// `[0, 1]`.
  pub fn new(
    source_entity_id: impl Into<String>,
    target_entity_id: impl Into<String>,
    kind: RelationshipType,
    confidence: f64,
  ) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      source_entity_id: source_entity_id.into(),
      target_entity_id: target_entity_id.into(),
      kind,
      confidence: confidence.clamp(0.0, 1.0),
      metadata: Metadata::new(),
    }
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = id.into();
    self
  }

  /// Field-level checks only; endpoint existence is the store's concern.
  pub fn validate(&self) -> Result<()> {
    if self.id.trim().is_empty() {
      return Err(Error::validation("relationship id must not be empty"));
    }
    if !(0.0..=1.0).contains(&self.confidence) {
      return Err(Error::validation(format!(
        "relationship {} confidence {} is outside [0, 1]",
        self.id, self.confidence
      )));
    }
    Ok(())
  }

  pub fn touches(&self, entity_id: &str) -> bool {
    self.source_entity_id == entity_id || self.target_entity_id == entity_id
  }

  /// The endpoint opposite `entity_id`, or `None` if the edge doesn't touch
  /// it. A self-loop returns the entity itself.
  pub fn other_end(&self, entity_id: &str) -> Option<&str> {
    if self.source_entity_id == entity_id {
      Some(&self.target_entity_id)
    } else if self.target_entity_id == entity_id {
      Some(&self.source_entity_id)
    } else {
      None
    }
  }
}

// ─── Mention ─────────────────────────────────────────────────────────────────

/// A located reference to an entity inside a source's content. `start` and
/// `end` are byte offsets into the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
  pub entity_id:    String,
  pub start:        usize,
  pub end:          usize,
  pub surface_text: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn type_keys_round_trip_and_fall_back() {
    assert_eq!(EntityType::Organization.as_str(), "organization");
    assert_eq!(EntityType::from_key(" Person "), EntityType::Person);
    assert_eq!(EntityType::from_key("spaceship"), EntityType::Other);
    assert_eq!(RelationshipType::IsA.as_str(), "is_a");
    assert_eq!(RelationshipType::from_key("located_in"), RelationshipType::LocatedIn);
    assert_eq!(RelationshipType::from_key("mitigates"), RelationshipType::Other);
  }

  #[test]
  fn aliases_are_deduplicated_case_insensitively() {
    let mut e = Entity::new(EntityType::Concept, "Climate Pact");
    assert!(!e.add_alias("climate  pact"));
    assert!(e.add_alias("Paris Agreement"));
    assert!(!e.add_alias("PARIS AGREEMENT"));
    assert_eq!(e.aliases, vec!["Paris Agreement".to_owned()]);
  }

  #[test]
  fn source_ids_accumulate_without_duplicates() {
    let mut e = Entity::new(EntityType::Concept, "climate");
    e.add_source("a");
    e.add_source("b");
    e.add_source("a");
    assert_eq!(e.source_ids(), vec!["a".to_owned(), "b".to_owned()]);
  }

  #[test]
  fn other_end_handles_both_directions() {
    let r = Relationship::new("x", "y", RelationshipType::RelatedTo, 0.7);
    assert_eq!(r.other_end("x"), Some("y"));
    assert_eq!(r.other_end("y"), Some("x"));
    assert_eq!(r.other_end("z"), None);
  }

  #[test]
  fn relationship_confidence_is_clamped_on_construction() {
    let r = Relationship::new("x", "y", RelationshipType::Supports, 1.7);
    assert_eq!(r.confidence, 1.0);
    let mut bad = r.clone();
    bad.confidence = -0.1;
    assert!(bad.validate().unwrap_err().is_validation());
  }
}
