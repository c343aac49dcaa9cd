//! Integration tests for `SqliteStore`, in memory and on disk.

use lore_core::{
  Engine,
  config::EngineConfig,
  entity::{Entity, EntityType, Relationship, RelationshipType},
  persist::Persistence,
  schema::{RelationshipTypeDef, SchemaDefinition, SchemaUpdate},
  source::Source,
  store::GraphSnapshot,
};

use crate::SqliteStore;

const PACT: &str = "<title>Climate Pact</title> was signed by <org>UN</org>.";

fn store() -> SqliteStore { SqliteStore::open_in_memory().expect("in-memory store") }

fn schema() -> SchemaDefinition {
  SchemaDefinition::bootstrap(&EngineConfig::default().schema).unwrap()
}

// ─── Schema documents ────────────────────────────────────────────────────────

#[test]
fn empty_store_has_no_schema_or_snapshot() {
  let s = store();
  assert!(s.load_schema().unwrap().is_none());
  assert!(s.load_snapshot().unwrap().is_none());
}

#[test]
fn schema_round_trips() {
  let s = store();
  let original = schema();
  s.save_schema(&original).unwrap();
  assert_eq!(s.load_schema().unwrap(), Some(original));
}

#[test]
fn latest_schema_wins_and_history_is_kept() {
  let s = store();
  let mut current = schema();
  s.save_schema(&current).unwrap();
  current
    .apply(
      SchemaUpdate::default().relationship_type("mitigates", RelationshipTypeDef::default()),
      chrono::Utc::now(),
    )
    .unwrap();
  s.save_schema(&current).unwrap();

  let loaded = s.load_schema().unwrap().unwrap();
  assert_eq!(loaded.version.to_string(), "1.0.1");
  assert!(loaded.relationship_types.contains_key("mitigates"));
  assert_eq!(s.schema_history().unwrap(), vec!["1.0.0", "1.0.1"]);
}

// ─── Graph snapshots ─────────────────────────────────────────────────────────

fn small_graph() -> GraphSnapshot {
  let a = Entity::new(EntityType::Person, "Ada Lovelace")
    .with_description("Mathematician")
    .with_metadata("born", serde_json::json!(1815));
  let mut b = Entity::new(EntityType::Concept, "Analytical Engine");
  b.add_alias("the Engine");
  let r = Relationship::new(&a.id, &b.id, RelationshipType::CreatedBy, 0.9);
  GraphSnapshot { entities: vec![a, b], relationships: vec![r], documents: vec![] }
}

#[test]
fn snapshot_round_trips_in_order() {
  let s = store();
  let graph = small_graph();
  s.save_snapshot(&graph).unwrap();
  assert_eq!(s.load_snapshot().unwrap(), Some(graph));
}

#[test]
fn saving_replaces_previous_snapshot() {
  let s = store();
  s.save_snapshot(&small_graph()).unwrap();
  let replacement = small_graph();
  s.save_snapshot(&replacement).unwrap();
  assert_eq!(s.read_snapshot().unwrap(), replacement);
}

#[test]
fn dangling_snapshot_is_refused_by_the_database() {
  let s = store();
  let mut graph = small_graph();
  graph.entities.pop();
  assert!(s.save_snapshot(&graph).is_err());
  assert!(s.load_snapshot().unwrap().is_none());
}

// ─── With the engine ─────────────────────────────────────────────────────────

#[test]
fn engine_bootstraps_into_empty_store() {
  let s = store();
  let engine = Engine::with_persistence(EngineConfig::default(), s.clone()).unwrap();
  engine
    .update_schema(SchemaUpdate::default().relationship_type("mitigates", RelationshipTypeDef::default()))
    .unwrap();
  assert_eq!(s.schema_history().unwrap(), vec!["1.0.0", "1.0.1"]);
}

#[test]
fn engine_state_survives_reopening_the_file() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("lore.db");

  let snapshot = {
    let engine =
      Engine::with_persistence(EngineConfig::default(), SqliteStore::open(&path).unwrap()).unwrap();
    engine.index_source(Source::new("pact", "Climate Pact", PACT)).unwrap();
    engine
      .update_schema(SchemaUpdate::default().relationship_type("mitigates", RelationshipTypeDef::default()))
      .unwrap();
    engine.persist_snapshot().unwrap();
    engine.snapshot()
  };

  let engine =
    Engine::with_persistence(EngineConfig::default(), SqliteStore::open(&path).unwrap()).unwrap();
  assert!(engine.relationship_types().contains(&"mitigates".to_owned()));
  assert!(engine.restore().unwrap());
  assert_eq!(engine.snapshot(), snapshot);
  assert_eq!(engine.mentions("pact").unwrap().len(), 3);

  let results = engine.retrieve_for_query("climate agreement", None, None);
  assert_eq!(results.len(), 1);
  assert_eq!(results[0].provenance.source_id, "pact");
}
