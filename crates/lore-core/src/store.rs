//! [`GraphStore`]: the keyed in-memory collections holding entities,
//! relationships, and indexed documents.
//!
//! Lookups are pure key-value. `put_*` is an idempotent upsert. Every
//! relationship write also maintains an adjacency index keyed by entity id,
//! so `relationships_touching` never scans the edge table.
//!
//! The store itself is not synchronised; the engine wraps it in a single
//! lock together with the schema.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  entity::{Entity, EntityType, Relationship, RelationshipType, canonicalize},
  source::IndexedDocument,
};

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// An id-keyed dump of the store, suitable for a durable backend.
///
/// Entities and relationships appear in first-insertion order so that a
/// restored store rebuilds identical adjacency lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
  pub entities:      Vec<Entity>,
  pub relationships: Vec<Relationship>,
  pub documents:     Vec<IndexedDocument>,
}

impl GraphSnapshot {
  pub fn is_empty(&self) -> bool {
    self.entities.is_empty() && self.relationships.is_empty() && self.documents.is_empty()
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct GraphStore {
  entities:           HashMap<String, Entity>,
  entity_order:       Vec<String>,
  relationships:      HashMap<String, Relationship>,
  relationship_order: Vec<String>,
  /// entity id → ids of relationships touching it, in insertion order.
  adjacency:          HashMap<String, Vec<String>>,
  /// (canonical name, type) → entity ids carrying that name.
  names:              HashMap<(String, EntityType), Vec<String>>,
  /// source id → indexed document.
  documents:          BTreeMap<String, IndexedDocument>,
}

impl GraphStore {
  pub fn new() -> Self { Self::default() }

  // ── Entities ──────────────────────────────────────────────────────────────

  pub fn put_entity(&mut self, entity: Entity) -> Result<()> {
    entity.validate()?;
    self.upsert_entity(entity);
    Ok(())
  }

  /// Insert or replace without validation. Callers must have validated.
  pub(crate) fn upsert_entity(&mut self, entity: Entity) {
    let key = (entity.canonical_name(), entity.kind);
    match self.entities.get(&entity.id) {
      Some(previous) => {
        let old_key = (previous.canonical_name(), previous.kind);
        if old_key != key {
          self.unindex_name(&old_key, &entity.id);
          self.names.entry(key).or_default().push(entity.id.clone());
        }
      }
      None => {
        self.entity_order.push(entity.id.clone());
        self.names.entry(key).or_default().push(entity.id.clone());
      }
    }
    self.entities.insert(entity.id.clone(), entity);
  }

  fn unindex_name(&mut self, key: &(String, EntityType), id: &str) {
    if let Some(ids) = self.names.get_mut(key) {
      ids.retain(|existing| existing != id);
      if ids.is_empty() {
        self.names.remove(key);
      }
    }
  }

  pub fn get_entity(&self, id: &str) -> Result<&Entity> {
    self
      .entities
      .get(id)
      .ok_or_else(|| Error::EntityNotFound(id.to_owned()))
  }

  pub fn contains_entity(&self, id: &str) -> bool { self.entities.contains_key(id) }

  /// First entity (by insertion) whose case-folded name and type match.
  pub fn find_by_name(&self, name: &str, kind: EntityType) -> Option<&Entity> {
    self
      .names
      .get(&(canonicalize(name), kind))
      .and_then(|ids| ids.first())
      .and_then(|id| self.entities.get(id))
  }

  pub fn entity_count(&self) -> usize { self.entities.len() }

  // ── Relationships ─────────────────────────────────────────────────────────

  /// Upsert a relationship. Both endpoints must already exist.
  pub fn put_relationship(&mut self, relationship: Relationship) -> Result<()> {
    relationship.validate()?;
    for endpoint in [&relationship.source_entity_id, &relationship.target_entity_id] {
      if !self.entities.contains_key(endpoint) {
        return Err(Error::DanglingEndpoint {
          relationship_id: relationship.id.clone(),
          entity_id:       endpoint.clone(),
        });
      }
    }
    self.upsert_relationship(relationship);
    Ok(())
  }

  /// Insert or replace without validation, keeping the adjacency index in
  /// step. Callers must have checked both endpoints.
  pub(crate) fn upsert_relationship(&mut self, relationship: Relationship) {
    let id = relationship.id.clone();

    if let Some(previous) = self.relationships.remove(&id) {
      for endpoint in [&previous.source_entity_id, &previous.target_entity_id] {
        if let Some(edges) = self.adjacency.get_mut(endpoint) {
          edges.retain(|e| e != &id);
        }
      }
    } else {
      self.relationship_order.push(id.clone());
    }

    self
      .adjacency
      .entry(relationship.source_entity_id.clone())
      .or_default()
      .push(id.clone());
    if relationship.target_entity_id != relationship.source_entity_id {
      self
        .adjacency
        .entry(relationship.target_entity_id.clone())
        .or_default()
        .push(id.clone());
    }

    self.relationships.insert(id, relationship);
  }

  pub fn get_relationship(&self, id: &str) -> Result<&Relationship> {
    self
      .relationships
      .get(id)
      .ok_or_else(|| Error::RelationshipNotFound(id.to_owned()))
  }

  /// Every relationship where `entity_id` is source or target, in insertion
  /// order. Unknown ids yield an empty list.
  pub fn relationships_touching(&self, entity_id: &str) -> Vec<&Relationship> {
    self
      .adjacency
      .get(entity_id)
      .map(|ids| ids.iter().filter_map(|id| self.relationships.get(id)).collect())
      .unwrap_or_default()
  }

  /// An existing edge with exactly this source, target, and type.
  pub fn find_relationship(
    &self,
    source_entity_id: &str,
    target_entity_id: &str,
    kind: RelationshipType,
  ) -> Option<&Relationship> {
    self
      .relationships_touching(source_entity_id)
      .into_iter()
      .find(|r| {
        r.source_entity_id == source_entity_id
          && r.target_entity_id == target_entity_id
          && r.kind == kind
      })
  }

  pub fn relationship_count(&self) -> usize { self.relationships.len() }

  // ── Documents ─────────────────────────────────────────────────────────────

  /// Store the indexed form of a source, replacing any earlier copy.
  pub(crate) fn put_document(&mut self, document: IndexedDocument) -> Option<IndexedDocument> {
    self.documents.insert(document.source.source_id.clone(), document)
  }

  pub fn document(&self, source_id: &str) -> Result<&IndexedDocument> {
    self
      .documents
      .get(source_id)
      .ok_or_else(|| Error::DocumentNotFound(source_id.to_owned()))
  }

  /// Indexed documents ordered by source id.
  pub fn documents(&self) -> impl Iterator<Item = &IndexedDocument> {
    self.documents.values()
  }

  pub fn document_count(&self) -> usize { self.documents.len() }

  // ── Snapshots ─────────────────────────────────────────────────────────────

  pub fn snapshot(&self) -> GraphSnapshot {
    GraphSnapshot {
      entities:      self
        .entity_order
        .iter()
        .filter_map(|id| self.entities.get(id).cloned())
        .collect(),
      relationships: self
        .relationship_order
        .iter()
        .filter_map(|id| self.relationships.get(id).cloned())
        .collect(),
      documents:     self.documents.values().cloned().collect(),
    }
  }

  /// Rebuild a store from a snapshot, validating every record the same way
  /// the individual `put_*` calls would.
  pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
    let mut store = Self::new();
    for entity in snapshot.entities {
      store.put_entity(entity)?;
    }
    for relationship in snapshot.relationships {
      store.put_relationship(relationship)?;
    }
    for document in snapshot.documents {
      if let Some(missing) = document.entity_ids.iter().find(|id| !store.contains_entity(id)) {
        return Err(Error::validation(format!(
          "document {} references missing entity {missing}",
          document.document_id
        )));
      }
      store.put_document(document);
    }
    Ok(store)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entity(name: &str) -> Entity { Entity::new(EntityType::Concept, name) }

  fn store_with(names: &[&str]) -> (GraphStore, Vec<String>) {
    let mut s = GraphStore::new();
    let ids = names
      .iter()
      .map(|n| {
        let e = entity(n);
        let id = e.id.clone();
        s.put_entity(e).unwrap();
        id
      })
      .collect();
    (s, ids)
  }

  #[test]
  fn put_then_get_returns_equal_entity() {
    let mut s = GraphStore::new();
    let e = entity("Climate Pact")
      .with_description("A treaty")
      .with_metadata("year", serde_json::json!(2015));
    s.put_entity(e.clone()).unwrap();
    assert_eq!(s.get_entity(&e.id).unwrap(), &e);
  }

  #[test]
  fn put_entity_overwrites_same_id() {
    let mut s = GraphStore::new();
    let e = entity("old").with_id("e1");
    s.put_entity(e).unwrap();
    s.put_entity(entity("new").with_id("e1")).unwrap();

    assert_eq!(s.entity_count(), 1);
    assert_eq!(s.get_entity("e1").unwrap().name, "new");
    assert!(s.find_by_name("old", EntityType::Concept).is_none());
    assert!(s.find_by_name("NEW", EntityType::Concept).is_some());
  }

  #[test]
  fn missing_ids_are_not_found() {
    let s = GraphStore::new();
    assert!(s.get_entity("nope").unwrap_err().is_not_found());
    assert!(s.get_relationship("nope").unwrap_err().is_not_found());
    assert!(s.relationships_touching("nope").is_empty());
  }

  #[test]
  fn dangling_relationship_is_rejected() {
    let (mut s, ids) = store_with(&["a"]);
    let r = Relationship::new(&ids[0], "ghost", RelationshipType::RelatedTo, 0.5);
    let err = s.put_relationship(r).unwrap_err();
    assert!(matches!(err, Error::DanglingEndpoint { ref entity_id, .. } if entity_id == "ghost"));
    assert_eq!(s.relationship_count(), 0);
    assert!(s.relationships_touching(&ids[0]).is_empty());
  }

  #[test]
  fn touching_covers_both_directions() {
    let (mut s, ids) = store_with(&["a", "b", "c"]);
    let ab = Relationship::new(&ids[0], &ids[1], RelationshipType::RelatedTo, 0.7);
    let cb = Relationship::new(&ids[2], &ids[1], RelationshipType::Supports, 0.9);
    s.put_relationship(ab.clone()).unwrap();
    s.put_relationship(cb.clone()).unwrap();

    let touching: Vec<_> = s.relationships_touching(&ids[1]).into_iter().cloned().collect();
    assert_eq!(touching, vec![ab.clone(), cb]);
    assert_eq!(s.relationships_touching(&ids[0]), vec![&ab]);
  }

  #[test]
  fn parallel_edges_of_different_types_coexist() {
    let (mut s, ids) = store_with(&["a", "b"]);
    s.put_relationship(Relationship::new(&ids[0], &ids[1], RelationshipType::RelatedTo, 0.7))
      .unwrap();
    s.put_relationship(Relationship::new(&ids[0], &ids[1], RelationshipType::Causal, 0.4))
      .unwrap();
    assert_eq!(s.relationships_touching(&ids[0]).len(), 2);
    assert!(s.find_relationship(&ids[0], &ids[1], RelationshipType::Causal).is_some());
    assert!(s.find_relationship(&ids[1], &ids[0], RelationshipType::Causal).is_none());
  }

  #[test]
  fn overwriting_relationship_moves_adjacency() {
    let (mut s, ids) = store_with(&["a", "b", "c"]);
    let r = Relationship::new(&ids[0], &ids[1], RelationshipType::RelatedTo, 0.7).with_id("r1");
    s.put_relationship(r).unwrap();
    let moved = Relationship::new(&ids[0], &ids[2], RelationshipType::RelatedTo, 0.7).with_id("r1");
    s.put_relationship(moved).unwrap();

    assert_eq!(s.relationship_count(), 1);
    assert!(s.relationships_touching(&ids[1]).is_empty());
    assert_eq!(s.relationships_touching(&ids[2]).len(), 1);
    assert_eq!(s.relationships_touching(&ids[0]).len(), 1);
  }

  #[test]
  fn self_loop_is_indexed_once() {
    let (mut s, ids) = store_with(&["a"]);
    s.put_relationship(Relationship::new(&ids[0], &ids[0], RelationshipType::IsA, 1.0))
      .unwrap();
    assert_eq!(s.relationships_touching(&ids[0]).len(), 1);
  }

  #[test]
  fn snapshot_round_trip_preserves_adjacency_order() {
    let (mut s, ids) = store_with(&["a", "b", "c"]);
    for (x, y) in [(0, 1), (2, 0), (1, 2)] {
      s.put_relationship(Relationship::new(&ids[x], &ids[y], RelationshipType::RelatedTo, 0.7))
        .unwrap();
    }

    let restored = GraphStore::from_snapshot(s.snapshot()).unwrap();
    for id in &ids {
      assert_eq!(restored.relationships_touching(id), s.relationships_touching(id));
    }
    assert_eq!(restored.snapshot(), s.snapshot());
  }

  #[test]
  fn snapshot_with_dangling_edge_is_rejected() {
    let (mut s, ids) = store_with(&["a", "b"]);
    s.put_relationship(Relationship::new(&ids[0], &ids[1], RelationshipType::RelatedTo, 0.7))
      .unwrap();
    let mut snapshot = s.snapshot();
    snapshot.entities.pop();

    assert!(GraphStore::from_snapshot(snapshot).unwrap_err().is_validation());
  }
}
