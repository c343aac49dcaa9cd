//! [`Engine`] owns the schema and the store behind one lock and exposes
//! every operation a transport layer calls.
//!
//! Reads take the read lock; each mutation takes the write lock once for
//! all of its dependent writes, so readers never see an indexing run half
//! applied. Share an engine across threads with `Arc<Engine>`.

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  Result,
  attribution::{AttributionProtocol, AttributionRecord},
  concept_map::{self, ConceptMap},
  config::EngineConfig,
  entity::{Entity, Mention, Relationship},
  index::SourceIndexer,
  persist::{Ephemeral, Persistence},
  retrieval::{CandidateSource, RetrievalResult, Scorer},
  schema::{SchemaDefinition, SchemaUpdate, SchemaVersion},
  source::{IndexedDocument, Source},
  store::{GraphSnapshot, GraphStore},
};

/// Everything guarded by the engine's lock.
struct Graph {
  schema: SchemaDefinition,
  store:  GraphStore,
}

/// Counts for health checks and dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
  pub entities:       usize,
  pub relationships:  usize,
  pub documents:      usize,
  pub schema_version: SchemaVersion,
}

pub struct Engine {
  graph:       RwLock<Graph>,
  persistence: Box<dyn Persistence>,
  candidates:  Option<Box<dyn CandidateSource>>,
  indexer:     SourceIndexer,
  attribution: AttributionProtocol,
  config:      EngineConfig,
}

impl Engine {
  /// An engine with no durable state.
  pub fn new(config: EngineConfig) -> Result<Self> { Self::with_persistence(config, Ephemeral) }

  /// Load the schema from `persistence`, bootstrapping (and writing
  /// through) the defaults if none was saved. A failing backend is logged
  /// and the engine starts on defaults.
  pub fn with_persistence(
    config: EngineConfig,
    persistence: impl Persistence + 'static,
  ) -> Result<Self> {
    let schema = match persistence.load_schema() {
      Ok(Some(schema)) => {
        info!(version = %schema.version, "loaded persisted schema");
        schema
      }
      Ok(None) => {
        let schema = SchemaDefinition::bootstrap(&config.schema)?;
        if let Err(error) = persistence.save_schema(&schema) {
          warn!(%error, "failed to persist bootstrapped schema; continuing in memory");
        }
        schema
      }
      Err(error) => {
        warn!(%error, "failed to load persisted schema; using defaults");
        SchemaDefinition::bootstrap(&config.schema)?
      }
    };

    Ok(Self {
      graph: RwLock::new(Graph { schema, store: GraphStore::new() }),
      persistence: Box::new(persistence),
      candidates: None,
      indexer: SourceIndexer::new(&config)?,
      attribution: AttributionProtocol::new(&config.attribution)?,
      config,
    })
  }

  /// Serve retrieval candidates from an external index instead of scanning
  /// the engine's own documents.
  pub fn with_candidate_source(mut self, source: impl CandidateSource + 'static) -> Self {
    self.candidates = Some(Box::new(source));
    self
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  // ─── Schema registry ─────────────────────────────────────────────────────

  pub fn entity_types(&self) -> Vec<String> { self.graph.read().schema.entity_type_keys() }

  pub fn relationship_types(&self) -> Vec<String> {
    self.graph.read().schema.relationship_type_keys()
  }

  pub fn schema(&self) -> SchemaDefinition { self.graph.read().schema.clone() }

  /// Shallow-merge `update` and advance the version. A failed write-through
  /// is logged; the in-memory update stands.
  pub fn update_schema(&self, update: SchemaUpdate) -> Result<SchemaDefinition> {
    let mut graph = self.graph.write();
    let previous = graph.schema.version;
    graph.schema.apply(update, Utc::now())?;

    if let Err(error) = self.persistence.save_schema(&graph.schema) {
      warn!(%error, version = %graph.schema.version, "schema write-through failed; keeping in-memory update");
    }
    info!(from = %previous, to = %graph.schema.version, "schema updated");
    Ok(graph.schema.clone())
  }

  // ─── Entity/relationship store ───────────────────────────────────────────

  /// Upsert an entity. A type missing from the schema is stored as `other`.
  pub fn put_entity(&self, mut entity: Entity) -> Result<()> {
    let mut graph = self.graph.write();
    let kind = graph.schema.resolve_entity_type(entity.kind);
    if kind != entity.kind {
      debug!(entity_id = %entity.id, from = %entity.kind, "entity type not in schema, using other");
      entity.kind = kind;
    }
    graph.store.put_entity(entity)
  }

  pub fn get_entity(&self, id: &str) -> Result<Entity> {
    self.graph.read().store.get_entity(id).cloned()
  }

  /// Upsert a relationship; both endpoints must exist.
  pub fn put_relationship(&self, mut relationship: Relationship) -> Result<()> {
    let mut graph = self.graph.write();
    let kind = graph.schema.resolve_relationship_type(relationship.kind);
    if kind != relationship.kind {
      debug!(relationship_id = %relationship.id, from = %relationship.kind, "relationship type not in schema, using other");
      relationship.kind = kind;
    }
    graph.store.put_relationship(relationship)
  }

  pub fn get_relationship(&self, id: &str) -> Result<Relationship> {
    self.graph.read().store.get_relationship(id).cloned()
  }

  pub fn relationships_touching(&self, entity_id: &str) -> Vec<Relationship> {
    self
      .graph
      .read()
      .store
      .relationships_touching(entity_id)
      .into_iter()
      .cloned()
      .collect()
  }

  // ─── Source indexer ──────────────────────────────────────────────────────

  /// Index `source` and return the new document id. Re-indexing a
  /// `source_id` replaces its document record and mentions.
  pub fn index_source(&self, source: Source) -> Result<String> {
    let mut graph = self.graph.write();
    let Graph { schema, store } = &mut *graph;
    let outcome = self.indexer.index(schema, store, source)?;
    Ok(outcome.document_id)
  }

  pub fn document(&self, source_id: &str) -> Result<IndexedDocument> {
    self.graph.read().store.document(source_id).cloned()
  }

  pub fn mentions(&self, source_id: &str) -> Result<Vec<Mention>> {
    Ok(self.graph.read().store.document(source_id)?.mentions.clone())
  }

  // ─── Retrieval ───────────────────────────────────────────────────────────

  /// Rank sources by token overlap with `query`. `None` falls back to the
  /// configured limits.
  pub fn retrieve_for_query(
    &self,
    query: &str,
    max_results: Option<usize>,
    min_relevance: Option<f64>,
  ) -> Vec<RetrievalResult> {
    let candidates = match &self.candidates {
      Some(backend) => backend.query_candidates(query),
      None => self.graph.read().store.query_candidates(query),
    };
    let candidate_count = candidates.len();
    let results = Scorer::new(&self.config.retrieval).score_query(
      query,
      candidates,
      max_results.unwrap_or(self.config.retrieval.max_results),
      min_relevance.unwrap_or(self.config.retrieval.min_relevance),
    );
    debug!(candidates = candidate_count, results = results.len(), "query retrieval");
    results
  }

  /// Rank sources by how many of `entity_ids` they mention.
  pub fn retrieve_for_entities(
    &self,
    entity_ids: &[String],
    max_results: Option<usize>,
    min_relevance: Option<f64>,
  ) -> Vec<RetrievalResult> {
    let candidates = match &self.candidates {
      Some(backend) => backend.entity_candidates(entity_ids),
      None => self.graph.read().store.entity_candidates(entity_ids),
    };
    let candidate_count = candidates.len();
    let results = Scorer::new(&self.config.retrieval).score_entities(
      entity_ids,
      candidates,
      max_results.unwrap_or(self.config.retrieval.max_results),
      min_relevance.unwrap_or(self.config.retrieval.min_relevance),
    );
    debug!(candidates = candidate_count, results = results.len(), "entity retrieval");
    results
  }

  // ─── Attribution ─────────────────────────────────────────────────────────

  pub fn build_attributed_prompt(&self, query: &str, sources: &[RetrievalResult]) -> String {
    self.attribution.build_attributed_prompt(query, sources)
  }

  pub fn process_attributed_response(
    &self,
    response_text: &str,
    sources: &[RetrievalResult],
  ) -> AttributionRecord {
    self.attribution.process_attributed_response(response_text, sources)
  }

  // ─── Concept map ─────────────────────────────────────────────────────────

  /// The walk stops early once no unvisited entity is left to expand, so
  /// large depths cost no more than the reachable subgraph.
  pub fn generate_concept_map(&self, focus_entity_ids: &[String], depth: usize) -> ConceptMap {
    concept_map::generate(&self.graph.read().store, focus_entity_ids, depth)
  }

  // ─── Persistence ─────────────────────────────────────────────────────────

  pub fn snapshot(&self) -> GraphSnapshot { self.graph.read().store.snapshot() }

  /// Write the current store to the persistence backend.
  pub fn persist_snapshot(&self) -> Result<()> {
    let graph = self.graph.read();
    self.persistence.save_snapshot(&graph.store.snapshot())
  }

  /// Replace the store with the backend's saved snapshot. Returns `false`
  /// if there was nothing to restore. A snapshot that fails validation is
  /// rejected whole and the current store is kept.
  pub fn restore(&self) -> Result<bool> {
    let Some(snapshot) = self.persistence.load_snapshot()? else {
      return Ok(false);
    };
    self.replace_graph(snapshot)?;
    Ok(true)
  }

  /// Replace the store with `snapshot`, all or nothing.
  pub fn replace_graph(&self, snapshot: GraphSnapshot) -> Result<()> {
    let store = GraphStore::from_snapshot(snapshot)?;
    info!(
      entities = store.entity_count(),
      relationships = store.relationship_count(),
      documents = store.document_count(),
      "graph restored from snapshot"
    );
    self.graph.write().store = store;
    Ok(())
  }

  pub fn stats(&self) -> EngineStats {
    let graph = self.graph.read();
    EngineStats {
      entities:       graph.store.entity_count(),
      relationships:  graph.store.relationship_count(),
      documents:      graph.store.document_count(),
      schema_version: graph.schema.version,
    }
  }
}
