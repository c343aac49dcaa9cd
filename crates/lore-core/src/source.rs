//! Sources (ingested units of content with provenance and trust scores) and
//! the record kept for each one after indexing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
  Error, Result,
  entity::{Mention, Metadata},
};

/// Where a source's content came from.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceType {
  Web,
  #[default]
  Document,
  Database,
  Api,
  KnowledgeBase,
  Calculation,
  UserProvided,
  Other,
}

impl SourceType {
  pub fn as_str(self) -> &'static str { self.into() }
}

/// Trust score assigned by [`Source::new`] when the caller supplies none.
pub const DEFAULT_TRUST: f64 = 0.8;

// ─── Source ──────────────────────────────────────────────────────────────────

/// An ingested unit of content. Immutable once indexed; indexing the same
/// `source_id` again replaces everything derived from the earlier copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
  pub source_id:         String,
  pub source_type:       SourceType,
  pub title:             String,
  pub content:           String,
  pub url:               Option<String>,
  pub authors:           Option<Vec<String>>,
  pub publication_date:  Option<DateTime<Utc>>,
  pub retrieval_date:    DateTime<Utc>,
  /// Intrinsic trustworthiness of the source, in `[0, 1]`.
  pub confidence_score:  f64,
  pub reliability_score: f64,
  #[serde(default)]
  pub metadata:          Metadata,
}

impl Source {
  /// Convenience constructor; optional fields empty, retrieved now, default
  /// trust scores.
  pub fn new(
    source_id: impl Into<String>,
    title: impl Into<String>,
    content: impl Into<String>,
  ) -> Self {
    Self {
      source_id:         source_id.into(),
      source_type:       SourceType::default(),
      title:             title.into(),
      content:           content.into(),
      url:               None,
      authors:           None,
      publication_date:  None,
      retrieval_date:    Utc::now(),
      confidence_score:  DEFAULT_TRUST,
      reliability_score: DEFAULT_TRUST,
      metadata:          Metadata::new(),
    }
  }

  pub fn with_type(mut self, source_type: SourceType) -> Self {
    self.source_type = source_type;
    self
  }

  pub fn with_url(mut self, url: impl Into<String>) -> Self {
    self.url = Some(url.into());
    self
  }

  pub fn with_scores(mut self, confidence: f64, reliability: f64) -> Self {
    self.confidence_score = confidence;
    self.reliability_score = reliability;
    self
  }

  /// Required-field and range checks. Runs before any store mutation.
  pub fn validate(&self) -> Result<()> {
    for (field, value) in [
      ("source_id", &self.source_id),
      ("title", &self.title),
      ("content", &self.content),
    ] {
      if value.trim().is_empty() {
        return Err(Error::validation(format!(
          "source is missing required field `{field}`"
        )));
      }
    }
    for (field, score) in [
      ("confidence_score", self.confidence_score),
      ("reliability_score", self.reliability_score),
    ] {
      if !(0.0..=1.0).contains(&score) {
        return Err(Error::validation(format!(
          "source {} has {field} {score} outside [0, 1]",
          self.source_id
        )));
      }
    }
    Ok(())
  }

  /// Hex SHA-256 of the content; lets callers detect unchanged re-indexing.
  pub fn content_hash(&self) -> String {
    hex::encode(Sha256::digest(self.content.as_bytes()))
  }
}

// ─── Indexed document ────────────────────────────────────────────────────────

/// What the store keeps for each indexed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
  pub document_id:  String,
  pub source:       Source,
  /// Entities extracted from this source, in extraction order.
  pub entity_ids:   Vec<String>,
  pub mentions:     Vec<Mention>,
  pub content_hash: String,
  pub indexed_at:   DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validate_names_the_missing_field() {
    let err = Source::new("s1", "  ", "body").validate().unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("`title`"));

    let err = Source::new("", "t", "body").validate().unwrap_err();
    assert!(err.to_string().contains("`source_id`"));

    let err = Source::new("s1", "t", "").validate().unwrap_err();
    assert!(err.to_string().contains("`content`"));
  }

  #[test]
  fn validate_rejects_scores_out_of_range() {
    let src = Source::new("s1", "t", "body").with_scores(1.2, 0.5);
    assert!(src.validate().unwrap_err().is_validation());
    let src = Source::new("s1", "t", "body").with_scores(0.9, f64::NAN);
    assert!(src.validate().is_err());
  }

  #[test]
  fn content_hash_is_stable() {
    let a = Source::new("s1", "t", "same body");
    let b = Source::new("s2", "other", "same body");
    assert_eq!(a.content_hash(), b.content_hash());
    assert_eq!(a.content_hash().len(), 64);
  }
}
