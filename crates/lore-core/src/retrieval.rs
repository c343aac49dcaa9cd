//! Ranked, explained retrieval over indexed sources.
//!
//! Candidate generation is delegated to a [`CandidateSource`] (the stand-in
//! for a vector index). Scoring, ranking, and explanations happen here and
//! don't depend on where candidates came from.
//!
//! - Query scoring: `min(query_base + query_span · overlap / |query tokens|, ceiling)`.
//! - Entity scoring: `entity_base + entity_span · matched / |requested|`.
//!
//! Both rank by descending score and subtract `rank_decay · position` so
//! ties resolve deterministically.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
  config::RetrievalConfig,
  entity::Metadata,
  source::{IndexedDocument, SourceType},
  store::GraphStore,
};

// ─── Types ───────────────────────────────────────────────────────────────────

/// Provenance of a retrieved chunk; what attribution needs to cite it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
  pub source_id:         String,
  pub title:             String,
  pub source_type:       SourceType,
  pub confidence_score:  f64,
  pub reliability_score: f64,
  pub url:               Option<String>,
}

/// A candidate chunk as handed over by the backend, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub content:    String,
  pub metadata:   Metadata,
  pub entity_ids: Vec<String>,
  pub provenance: Provenance,
}

impl From<&IndexedDocument> for Candidate {
  fn from(doc: &IndexedDocument) -> Self {
    let mut metadata = doc.source.metadata.clone();
    metadata.insert("source_id".to_owned(), serde_json::json!(doc.source.source_id));
    metadata.insert("document_id".to_owned(), serde_json::json!(doc.document_id));
    metadata.insert("title".to_owned(), serde_json::json!(doc.source.title));
    if let Some(url) = &doc.source.url {
      metadata.insert("url".to_owned(), serde_json::json!(url));
    }

    Self {
      content: doc.source.content.clone(),
      metadata,
      entity_ids: doc.entity_ids.clone(),
      provenance: Provenance {
        source_id:         doc.source.source_id.clone(),
        title:             doc.source.title.clone(),
        source_type:       doc.source.source_type,
        confidence_score:  doc.source.confidence_score,
        reliability_score: doc.source.reliability_score,
        url:               doc.source.url.clone(),
      },
    }
  }
}

/// A scored, explained result. Request-scoped; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
  pub content:         String,
  pub metadata:        Metadata,
  pub relevance_score: f64,
  /// Human-readable match basis; shown to users next to the citation.
  pub explanation:     String,
  pub entity_ids:      Vec<String>,
  pub provenance:      Provenance,
}

// ─── Candidate backend ───────────────────────────────────────────────────────

/// Supplies candidate chunks for a query or an entity focus set.
///
/// Implementations return anything plausibly relevant; ranking and
/// thresholds are applied by the engine.
pub trait CandidateSource: Send + Sync {
  fn query_candidates(&self, query: &str) -> Vec<Candidate>;

  fn entity_candidates(&self, entity_ids: &[String]) -> Vec<Candidate>;
}

/// The built-in backend: a linear scan over indexed documents.
impl CandidateSource for GraphStore {
  fn query_candidates(&self, query: &str) -> Vec<Candidate> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
      return Vec::new();
    }
    self
      .documents()
      .filter(|doc| !tokenize(&doc.source.content).is_disjoint(&query_tokens))
      .map(Candidate::from)
      .collect()
  }

  fn entity_candidates(&self, entity_ids: &[String]) -> Vec<Candidate> {
    let wanted: HashSet<&str> = entity_ids.iter().map(String::as_str).collect();
    self
      .documents()
      .filter(|doc| doc.entity_ids.iter().any(|id| wanted.contains(id.as_str())))
      .map(Candidate::from)
      .collect()
  }
}

// ─── Scoring ─────────────────────────────────────────────────────────────────

/// Case-folded word tokens. Splits on whitespace and on any other
/// non-alphanumeric character, so markup and punctuation don't hide words.
pub fn tokenize(text: &str) -> HashSet<String> {
  text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| !t.is_empty())
    .map(str::to_lowercase)
    .collect()
}

pub struct Scorer<'a> {
  config: &'a RetrievalConfig,
}

impl<'a> Scorer<'a> {
  pub fn new(config: &'a RetrievalConfig) -> Self { Self { config } }

  pub fn score_query(
    &self,
    query: &str,
    candidates: Vec<Candidate>,
    max_results: usize,
    min_relevance: f64,
  ) -> Vec<RetrievalResult> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
      return Vec::new();
    }
    let total = query_tokens.len();

    let scored = candidates
      .into_iter()
      .map(|candidate| {
        let content_tokens = tokenize(&candidate.content);
        let matched: BTreeSet<&str> = query_tokens
          .iter()
          .filter(|t| content_tokens.contains(*t))
          .map(String::as_str)
          .collect();
        let overlap = matched.len();
        let relevance = (self.config.query_base
          + self.config.query_span * overlap as f64 / total as f64)
          .min(self.config.query_ceiling);
        let explanation = format!(
          "Token overlap: {overlap} of {total} query tokens matched ({})",
          matched.into_iter().collect::<Vec<_>>().join(", ")
        );
        (relevance, explanation, candidate)
      })
      .collect();

    self.rank(scored, max_results, min_relevance)
  }

  pub fn score_entities(
    &self,
    entity_ids: &[String],
    candidates: Vec<Candidate>,
    max_results: usize,
    min_relevance: f64,
  ) -> Vec<RetrievalResult> {
    let requested: BTreeSet<&str> = entity_ids.iter().map(String::as_str).collect();
    if requested.is_empty() {
      return Vec::new();
    }
    let total = requested.len();

    let scored = candidates
      .into_iter()
      .filter_map(|candidate| {
        let present: HashSet<&str> = candidate.entity_ids.iter().map(String::as_str).collect();
        let matched = requested.iter().filter(|id| present.contains(*id)).count();
        if matched == 0 {
          return None;
        }
        let relevance =
          self.config.entity_base + self.config.entity_span * matched as f64 / total as f64;
        let explanation =
          format!("Entity match: {matched} of {total} requested entities appear in this source");
        Some((relevance, explanation, candidate))
      })
      .collect();

    self.rank(scored, max_results, min_relevance)
  }

  /// Threshold on the raw score, stable-sort descending, truncate, then
  /// apply the per-position decay.
  fn rank(
    &self,
    mut scored: Vec<(f64, String, Candidate)>,
    max_results: usize,
    min_relevance: f64,
  ) -> Vec<RetrievalResult> {
    scored.retain(|(relevance, _, _)| *relevance >= min_relevance);
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(max_results);

    scored
      .into_iter()
      .enumerate()
      .map(|(position, (relevance, explanation, candidate))| RetrievalResult {
        content:         candidate.content,
        metadata:        candidate.metadata,
        relevance_score: (relevance - self.config.rank_decay * position as f64).max(0.0),
        explanation,
        entity_ids:      candidate.entity_ids,
        provenance:      candidate.provenance,
      })
      .collect()
  }
}
