//! The schema registry's data contract: which entity and relationship types
//! exist, what properties they carry, and the version stamp that moves on
//! every update.
//!
//! Indexing is permissive. A type whose key is missing from the current
//! schema is coerced to `other` rather than rejected, and `other` itself is
//! always resolvable.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  config::SchemaConfig,
  entity::{Entity, EntityType, RelationshipType},
};

// ─── Version ─────────────────────────────────────────────────────────────────

/// A `major.minor.patch` version. Serialised as its dotted string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
  pub major: u64,
  pub minor: u64,
  pub patch: u64,
}

impl SchemaVersion {
  /// The same version with the patch component incremented. Fails once the
  /// patch component is exhausted.
  pub fn next_patch(self) -> Result<Self> {
    let patch = self.patch.checked_add(1).ok_or_else(|| {
      Error::validation(format!("schema version {self} cannot be bumped past its patch limit"))
    })?;
    Ok(Self { patch, ..self })
  }
}

impl fmt::Display for SchemaVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
  }
}

impl FromStr for SchemaVersion {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let parts: Vec<&str> = s.trim().split('.').collect();
    let [major, minor, patch] = parts.as_slice() else {
      return Err(Error::validation(format!(
        "schema version {s:?} is not of the form x.y.z"
      )));
    };
    let parse = |p: &str| {
      p.parse::<u64>().map_err(|_| {
        Error::validation(format!("schema version {s:?} has a non-numeric component"))
      })
    };
    Ok(Self { major: parse(*major)?, minor: parse(*minor)?, patch: parse(*patch)? })
  }
}

impl TryFrom<String> for SchemaVersion {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<SchemaVersion> for String {
  fn from(v: SchemaVersion) -> Self { v.to_string() }
}

// ─── Type definitions ────────────────────────────────────────────────────────

/// One named property of an entity or relationship type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
  /// Free-form value type, e.g. `"string"` or `"date"`.
  #[serde(rename = "type")]
  pub kind:        String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub required:    bool,
}

impl PropertyDef {
  pub fn required(kind: &str, description: &str) -> Self {
    Self { kind: kind.to_owned(), description: description.to_owned(), required: true }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityTypeDef {
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub properties:  BTreeMap<String, PropertyDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelationshipTypeDef {
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub properties:  BTreeMap<String, PropertyDef>,
}

impl RelationshipTypeDef {
  pub fn described(description: impl Into<String>) -> Self {
    Self { description: description.into(), properties: BTreeMap::new() }
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// The full, versioned schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
  pub entity_types:       BTreeMap<String, EntityTypeDef>,
  pub relationship_types: BTreeMap<String, RelationshipTypeDef>,
  pub version:            SchemaVersion,
  pub updated_at:         DateTime<Utc>,
}

/// A partial schema accepted by an update. Keys present here overwrite the
/// current definitions; everything else is preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaUpdate {
  #[serde(default)]
  pub entity_types:       BTreeMap<String, EntityTypeDef>,
  #[serde(default)]
  pub relationship_types: BTreeMap<String, RelationshipTypeDef>,
  /// Explicit version to stamp instead of bumping the patch component.
  #[serde(default)]
  pub version:            Option<String>,
}

impl SchemaUpdate {
  pub fn relationship_type(
    mut self,
    key: impl Into<String>,
    def: RelationshipTypeDef,
  ) -> Self {
    self.relationship_types.insert(key.into(), def);
    self
  }

  pub fn entity_type(mut self, key: impl Into<String>, def: EntityTypeDef) -> Self {
    self.entity_types.insert(key.into(), def);
    self
  }
}

fn default_entity_types() -> BTreeMap<String, EntityTypeDef> {
  [
    (EntityType::Person, "A human individual"),
    (EntityType::Organization, "A company, institution, agency, or other group"),
    (EntityType::Concept, "An abstract idea, topic, or named thing"),
    (EntityType::Location, "A place, region, or geographic feature"),
    (EntityType::Event, "Something that happened or will happen"),
  ]
  .into_iter()
  .map(|(kind, description)| {
    let mut properties = BTreeMap::new();
    properties.insert(
      "name".to_owned(),
      PropertyDef::required("string", "Display name of the entity"),
    );
    (
      kind.as_str().to_owned(),
      EntityTypeDef { description: description.to_owned(), properties },
    )
  })
  .collect()
}

fn builtin_relationship_description(key: &str) -> &'static str {
  match key {
    "related_to" => "Generic association between two entities",
    "part_of" => "Subject is a component or member of the object",
    "has_part" => "Subject contains the object as a component",
    "is_a" => "Subject is an instance or subclass of the object",
    "has_property" => "Subject has the object as an attribute",
    _ => "",
  }
}

impl SchemaDefinition {
  /// The schema used when nothing has been persisted yet.
  pub fn bootstrap(config: &SchemaConfig) -> Result<Self> {
    let version: SchemaVersion = config.initial_version.parse()?;

    let mut relationship_types: BTreeMap<String, RelationshipTypeDef> = config
      .relationship_types
      .iter()
      .map(|key| {
        (
          key.clone(),
          RelationshipTypeDef::described(builtin_relationship_description(key)),
        )
      })
      .collect();
    for (key, description) in &config.extended_relationship_types {
      relationship_types.insert(key.clone(), RelationshipTypeDef::described(description.clone()));
    }

    Ok(Self {
      entity_types: default_entity_types(),
      relationship_types,
      version,
      updated_at: Utc::now(),
    })
  }

  pub fn entity_type_keys(&self) -> Vec<String> {
    self.entity_types.keys().cloned().collect()
  }

  pub fn relationship_type_keys(&self) -> Vec<String> {
    self.relationship_types.keys().cloned().collect()
  }

  /// Shallow-merge `update` into this schema and advance the version.
  ///
  /// The version is validated before anything is touched, so a rejected
  /// update leaves the schema unchanged.
  pub fn apply(&mut self, update: SchemaUpdate, now: DateTime<Utc>) -> Result<()> {
    let version = match update.version.as_deref() {
      Some(explicit) => explicit.parse()?,
      None => self.version.next_patch()?,
    };

    self.entity_types.extend(update.entity_types);
    self.relationship_types.extend(update.relationship_types);
    self.version = version;
    self.updated_at = now;
    Ok(())
  }

  pub fn resolve_entity_type(&self, kind: EntityType) -> EntityType {
    if kind == EntityType::Other || self.entity_types.contains_key(kind.as_str()) {
      kind
    } else {
      EntityType::Other
    }
  }

  pub fn resolve_relationship_type(&self, kind: RelationshipType) -> RelationshipType {
    if kind == RelationshipType::Other
      || self.relationship_types.contains_key(kind.as_str())
    {
      kind
    } else {
      RelationshipType::Other
    }
  }

  /// Required properties of the entity's type that it doesn't carry, either
  /// as an intrinsic field or a metadata key.
  pub fn missing_required(&self, entity: &Entity) -> Vec<String> {
    let Some(def) = self.entity_types.get(entity.kind.as_str()) else {
      return Vec::new();
    };
    def
      .properties
      .iter()
      .filter(|(_, p)| p.required)
      .filter(|(name, _)| {
        let intrinsic = match name.as_str() {
          "name" => !entity.name.trim().is_empty(),
          "description" => !entity.description.trim().is_empty(),
          _ => false,
        };
        !intrinsic && !entity.metadata.contains_key(name.as_str())
      })
      .map(|(name, _)| name.clone())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn schema() -> SchemaDefinition {
    SchemaDefinition::bootstrap(&SchemaConfig::default()).unwrap()
  }

  #[test]
  fn bootstrap_has_default_types() {
    let s = schema();
    assert_eq!(
      s.entity_type_keys(),
      vec!["concept", "event", "location", "organization", "person"]
    );
    for key in ["related_to", "part_of", "has_part", "is_a", "has_property", "causal"] {
      assert!(s.relationship_types.contains_key(key), "missing {key}");
    }
    assert!(s.entity_types["person"].properties["name"].required);
    assert_eq!(s.version.to_string(), "1.0.0");
  }

  #[test]
  fn update_merges_and_bumps_patch() {
    let mut s = schema();
    let before = s.relationship_type_keys();
    let update = SchemaUpdate::default().relationship_type(
      "mitigates",
      RelationshipTypeDef::described("Subject reduces the severity of the object"),
    );

    s.apply(update, Utc::now()).unwrap();

    let after = s.relationship_type_keys();
    assert!(after.contains(&"mitigates".to_owned()));
    assert!(before.iter().all(|k| after.contains(k)));
    assert_eq!(s.version.to_string(), "1.0.1");
  }

  #[test]
  fn update_overwrites_existing_key() {
    let mut s = schema();
    let update = SchemaUpdate::default()
      .relationship_type("is_a", RelationshipTypeDef::described("replaced"));
    s.apply(update, Utc::now()).unwrap();
    assert_eq!(s.relationship_types["is_a"].description, "replaced");
  }

  #[test]
  fn explicit_version_wins() {
    let mut s = schema();
    let update = SchemaUpdate { version: Some("2.3.0".into()), ..Default::default() };
    s.apply(update, Utc::now()).unwrap();
    assert_eq!(s.version, SchemaVersion { major: 2, minor: 3, patch: 0 });
  }

  #[test]
  fn bad_version_leaves_schema_untouched() {
    let mut s = schema();
    let original = s.clone();
    let update = SchemaUpdate {
      version: Some("two".into()),
      ..Default::default()
    }
    .relationship_type("mitigates", RelationshipTypeDef::default());

    assert!(s.apply(update, Utc::now()).unwrap_err().is_validation());
    assert_eq!(s, original);
  }

  #[test]
  fn exhausted_patch_is_rejected() {
    let mut s = schema();
    let update = SchemaUpdate { version: Some(format!("1.0.{}", u64::MAX)), ..Default::default() };
    s.apply(update, Utc::now()).unwrap();
    let original = s.clone();

    let update = SchemaUpdate::default().relationship_type("mitigates", RelationshipTypeDef::default());
    assert!(s.apply(update, Utc::now()).unwrap_err().is_validation());
    assert_eq!(s, original);
  }

  #[test]
  fn unknown_types_resolve_to_other() {
    let s = schema();
    assert_eq!(s.resolve_entity_type(EntityType::Person), EntityType::Person);
    assert_eq!(s.resolve_entity_type(EntityType::Date), EntityType::Other);
    assert_eq!(s.resolve_entity_type(EntityType::Other), EntityType::Other);
    assert_eq!(
      s.resolve_relationship_type(RelationshipType::Supports),
      RelationshipType::Supports
    );
  }

  #[test]
  fn missing_required_checks_metadata() {
    let mut s = schema();
    let mut props = BTreeMap::new();
    props.insert("born".to_owned(), PropertyDef::required("date", "Birth date"));
    props.insert("name".to_owned(), PropertyDef::required("string", "Name"));
    s.apply(
      SchemaUpdate::default()
        .entity_type("person", EntityTypeDef { description: String::new(), properties: props }),
      Utc::now(),
    )
    .unwrap();

    let e = Entity::new(EntityType::Person, "Ada");
    assert_eq!(s.missing_required(&e), vec!["born".to_owned()]);

    let e = e.with_metadata("born", serde_json::json!("1815-12-10"));
    assert!(s.missing_required(&e).is_empty());
  }

  #[test]
  fn version_serialises_as_string() {
    let v = SchemaVersion { major: 1, minor: 0, patch: 7 };
    assert_eq!(serde_json::to_string(&v).unwrap(), "\"1.0.7\"");
    let back: SchemaVersion = serde_json::from_str("\"1.0.7\"").unwrap();
    assert_eq!(back, v);
  }
}
