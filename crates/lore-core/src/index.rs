//! Source indexing: turn a [`Source`] into entities, mentions, and
//! co-occurrence relationships, and register them in the store.
//!
//! Indexing is planned in full against the current store before the first
//! write, so a rejected source leaves no trace and concurrent readers never
//! see an edge whose endpoint isn't there yet.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Result,
  config::EngineConfig,
  entity::{Entity, Mention, Relationship, RelationshipType, canonicalize},
  extract::{EntityExtractor, find_mentions},
  schema::SchemaDefinition,
  source::{IndexedDocument, Source},
  store::GraphStore,
};

/// What a single `index` call did.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOutcome {
  pub document_id:      String,
  pub entity_ids:       Vec<String>,
  /// Relationships created by this call; pre-existing edges are not listed.
  pub relationship_ids: Vec<String>,
  pub mention_count:    usize,
  /// Set when a previous copy of the same source was replaced.
  pub replaced:         Option<String>,
}

pub struct SourceIndexer {
  extractor:               EntityExtractor,
  cooccurrence_confidence: f64,
}

/// All writes one source will cause, computed up front.
struct IndexPlan {
  entities:      Vec<Entity>,
  relationships: Vec<Relationship>,
  mentions:      Vec<Mention>,
}

impl SourceIndexer {
  pub fn new(config: &EngineConfig) -> Result<Self> {
    Ok(Self {
      extractor:               EntityExtractor::new(&config.extraction)?,
      cooccurrence_confidence: config.indexing.cooccurrence_confidence.clamp(0.0, 1.0),
    })
  }

  pub fn index(
    &self,
    schema: &SchemaDefinition,
    store: &mut GraphStore,
    source: Source,
  ) -> Result<IndexOutcome> {
    source.validate()?;

    let plan = self.plan(schema, store, &source);
    let content_hash = source.content_hash();
    if let Ok(previous) = store.document(&source.source_id)
      && previous.content_hash == content_hash
    {
      debug!(source_id = %source.source_id, "re-indexing unchanged content");
    }

    let entity_ids: Vec<String> = plan.entities.iter().map(|e| e.id.clone()).collect();
    let relationship_ids: Vec<String> =
      plan.relationships.iter().map(|r| r.id.clone()).collect();
    let mention_count = plan.mentions.len();

    // Entities first, so every relationship below finds its endpoints.
    for entity in plan.entities {
      store.upsert_entity(entity);
    }
    for relationship in plan.relationships {
      store.upsert_relationship(relationship);
    }

    let document_id = Uuid::new_v4().to_string();
    let source_id = source.source_id.clone();
    let replaced = store
      .put_document(IndexedDocument {
        document_id: document_id.clone(),
        source,
        entity_ids: entity_ids.clone(),
        mentions: plan.mentions,
        content_hash,
        indexed_at: Utc::now(),
      })
      .map(|previous| previous.document_id);

    info!(
      %source_id,
      %document_id,
      entities = entity_ids.len(),
      relationships = relationship_ids.len(),
      mentions = mention_count,
      replaced = replaced.is_some(),
      "indexed source"
    );

    Ok(IndexOutcome { document_id, entity_ids, relationship_ids, mention_count, replaced })
  }

  fn plan(&self, schema: &SchemaDefinition, store: &GraphStore, source: &Source) -> IndexPlan {
    let extraction = self.extractor.extract(&source.content);
    debug!(
      source_id = %source.source_id,
      tier = ?extraction.tier,
      candidates = extraction.entities.len(),
      "extracted entity candidates"
    );

    let mut entities: Vec<Entity> = Vec::with_capacity(extraction.entities.len());
    for candidate in extraction.entities {
      let kind = schema.resolve_entity_type(candidate.kind);
      if kind != candidate.kind {
        debug!(name = %candidate.name, from = %candidate.kind, "entity type not in schema, using other");
      }

      // Two candidates can collapse onto one entity once types are resolved.
      let canonical = canonicalize(&candidate.name);
      if let Some(planned) = entities
        .iter_mut()
        .find(|e| e.kind == kind && e.canonical_name() == canonical)
      {
        planned.add_alias(&candidate.name);
        continue;
      }

      let mut entity = match store.find_by_name(&candidate.name, kind) {
        Some(existing) => {
          let mut merged = existing.clone();
          if merged.name != candidate.name {
            merged.add_alias(&candidate.name);
          }
          merged
        }
        None => Entity::new(kind, candidate.name.clone()),
      };
      entity.add_source(&source.source_id);
      entities.push(entity);
    }

    let mentions = entities
      .iter()
      .flat_map(|e| find_mentions(&source.content, &e.id, &e.name))
      .collect();

    // Naive co-occurrence: chain consecutive entities.
    let kind = schema.resolve_relationship_type(RelationshipType::RelatedTo);
    let mut relationships: Vec<Relationship> = Vec::new();
    for pair in entities.windows(2) {
      let (from, to) = (&pair[0].id, &pair[1].id);
      if from == to {
        continue;
      }
      let exists = store.find_relationship(from, to, kind).is_some()
        || relationships
          .iter()
          .any(|r| &r.source_entity_id == from && &r.target_entity_id == to);
      if !exists {
        let mut relationship = Relationship::new(from, to, kind, self.cooccurrence_confidence);
        relationship
          .metadata
          .insert("source_id".to_owned(), serde_json::json!(source.source_id));
        relationships.push(relationship);
      }
    }

    IndexPlan { entities, relationships, mentions }
  }
}
