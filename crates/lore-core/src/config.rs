//! Engine configuration.
//!
//! Every field has a default, so an empty file (or no file) yields the stock
//! behaviour. Values are layered: built-in defaults, then an optional TOML
//! file, then `LORE_*` environment variables using `__` between sections,
//! e.g. `LORE_RETRIEVAL__RANK_DECAY=0.1`.

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;

use crate::{Result, entity::EntityType};

// ─── Top level ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub extraction:  ExtractionConfig,
  pub indexing:    IndexingConfig,
  pub retrieval:   RetrievalConfig,
  pub attribution: AttributionConfig,
  pub schema:      SchemaConfig,
}

impl EngineConfig {
  /// Load from an optional TOML file plus `LORE_*` environment overrides.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
      builder = builder.add_source(config::File::from(path).required(false));
    }
    let settings = builder
      .add_source(
        config::Environment::with_prefix("LORE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?;
    Ok(settings.try_deserialize()?)
  }
}

// ─── Extraction ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
  /// Domain terms mapped straight to an entity type. Matched as whole
  /// words, case-insensitively.
  pub keywords:              BTreeMap<String, EntityType>,
  /// Once the keyword pass alone finds this many entities the
  /// capitalisation pass is skipped.
  pub sufficient_entities:   usize,
  /// Hard cap on entities extracted from one source.
  pub max_entities:          usize,
  /// Minimum length, in characters, of the frequency-fallback word.
  pub min_fallback_word_len: usize,
}

impl Default for ExtractionConfig {
  fn default() -> Self {
    let keywords = [
      ("climate", EntityType::Concept),
      ("emissions", EntityType::Concept),
      ("economy", EntityType::Concept),
      ("inflation", EntityType::Concept),
      ("democracy", EntityType::Concept),
      ("research", EntityType::Concept),
      ("government", EntityType::Organization),
      ("university", EntityType::Organization),
      ("company", EntityType::Organization),
      ("ministry", EntityType::Organization),
      ("city", EntityType::Location),
      ("country", EntityType::Location),
      ("summit", EntityType::Event),
      ("election", EntityType::Event),
      ("conference", EntityType::Event),
      ("vaccine", EntityType::Product),
      ("software", EntityType::Product),
    ]
    .into_iter()
    .map(|(k, t)| (k.to_owned(), t))
    .collect();

    Self {
      keywords,
      sufficient_entities: 5,
      max_entities: 20,
      min_fallback_word_len: 5,
    }
  }
}

// ─── Indexing ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
  /// Confidence stamped on co-occurrence `related_to` edges.
  pub cooccurrence_confidence: f64,
}

impl Default for IndexingConfig {
  fn default() -> Self { Self { cooccurrence_confidence: 0.7 } }
}

// ─── Retrieval ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
  pub max_results:   usize,
  pub min_relevance: f64,
  /// Subtracted once per rank position after sorting.
  pub rank_decay:    f64,
  pub query_base:    f64,
  pub query_span:    f64,
  pub query_ceiling: f64,
  pub entity_base:   f64,
  pub entity_span:   f64,
}

impl Default for RetrievalConfig {
  fn default() -> Self {
    Self {
      max_results:   5,
      min_relevance: 0.0,
      rank_decay:    0.05,
      query_base:    0.5,
      query_span:    0.5,
      query_ceiling: 0.95,
      entity_base:   0.7,
      entity_span:   0.25,
    }
  }
}

// ─── Attribution ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
  /// Lowest confidence ever reported for a parsed answer.
  pub confidence_floor: f64,
}

impl Default for AttributionConfig {
  fn default() -> Self { Self { confidence_floor: 0.75 } }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
  /// Version stamped on a freshly bootstrapped schema.
  pub initial_version:             String,
  /// Relationship type keys present in every bootstrapped schema.
  pub relationship_types:          Vec<String>,
  /// Additional named relations, key → human description.
  pub extended_relationship_types: BTreeMap<String, String>,
}

impl Default for SchemaConfig {
  fn default() -> Self {
    let relationship_types = ["related_to", "part_of", "has_part", "is_a", "has_property"]
      .into_iter()
      .map(str::to_owned)
      .collect();

    let extended_relationship_types = [
      ("located_in", "Subject is physically or administratively inside the object"),
      ("created_by", "Subject was authored, founded, or produced by the object"),
      ("works_for", "Subject is employed by or acts on behalf of the object"),
      ("contradicts", "Subject asserts something incompatible with the object"),
      ("supports", "Subject provides evidence in favour of the object"),
      ("temporal", "Subject happens before, after, or during the object"),
      ("causal", "Subject brings about or contributes to the object"),
    ]
    .into_iter()
    .map(|(k, d)| (k.to_owned(), d.to_owned()))
    .collect();

    Self {
      initial_version: "1.0.0".to_owned(),
      relationship_types,
      extended_relationship_types,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn defaults_match_documented_constants() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.indexing.cooccurrence_confidence, 0.7);
    assert_eq!(cfg.retrieval.rank_decay, 0.05);
    assert_eq!(cfg.retrieval.query_span, 0.5);
    assert_eq!(cfg.retrieval.query_ceiling, 0.95);
    assert_eq!(cfg.attribution.confidence_floor, 0.75);
    assert_eq!(cfg.extraction.keywords.get("climate"), Some(&EntityType::Concept));
    assert_eq!(cfg.schema.relationship_types.len(), 5);
  }

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let cfg = EngineConfig::load(Some(Path::new("/nonexistent/lore.toml"))).unwrap();
    assert_eq!(cfg.retrieval.max_results, 5);
  }

  #[test]
  fn file_overrides_individual_fields() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
      file,
      "[retrieval]\nmax_results = 9\n\n[extraction.keywords]\nreactor = \"product\"\n"
    )
    .unwrap();

    let cfg = EngineConfig::load(Some(file.path())).unwrap();
    assert_eq!(cfg.retrieval.max_results, 9);
    // untouched fields keep their defaults
    assert_eq!(cfg.retrieval.rank_decay, 0.05);
    assert_eq!(cfg.extraction.keywords.get("reactor"), Some(&EntityType::Product));
  }
}
