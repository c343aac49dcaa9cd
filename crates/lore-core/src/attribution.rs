//! The attribution protocol: cite-annotated prompts out, scored attribution
//! records back in.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  Error, Result, config::AttributionConfig, entity::Metadata, retrieval::RetrievalResult,
};

/// One cited source in an [`AttributionRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedSource {
  pub source_id:       String,
  pub title:           String,
  pub reference_count: usize,
  pub relevance_score: f64,
  pub metadata:        Metadata,
}

/// The parsed, confidence-scored view of a generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionRecord {
  pub text:        String,
  /// Referenced sources only, ordered by marker index.
  pub sources:     Vec<AttributedSource>,
  pub confidence:  f64,
  pub explanation: String,
}

pub struct AttributionProtocol {
  marker:           Regex,
  confidence_floor: f64,
}

impl AttributionProtocol {
  pub fn new(config: &AttributionConfig) -> Result<Self> {
    let marker = Regex::new(r"SOURCE_(\d+)")
      .map_err(|e| Error::validation(format!("source marker pattern: {e}")))?;
    Ok(Self { marker, confidence_floor: config.confidence_floor.clamp(0.0, 1.0) })
  }

  /// Sources are emitted in the order given, numbered from 1.
  pub fn build_attributed_prompt(&self, query: &str, sources: &[RetrievalResult]) -> String {
    let mut prompt = String::from(
      "Answer the question using only the sources below. Each source is delimited by its \
       SOURCE_i markers.\n\n",
    );

    for (i, source) in sources.iter().enumerate() {
      let n = i + 1;
      let p = &source.provenance;
      prompt.push_str(&format!(
        "[SOURCE_{n}: {} | type: {} | confidence: {:.2}]\n{}\n[/SOURCE_{n}]\n\n",
        p.title,
        p.source_type.as_str(),
        p.confidence_score,
        source.content.trim_end(),
      ));
    }

    prompt.push_str(&format!("Question: {}\n\n", query.trim()));
    prompt.push_str(
      "Instructions: every factual claim in your answer must cite the source it comes from \
       with its marker, e.g. [SOURCE_1]. Do not state facts that none of the sources support.",
    );
    prompt
  }

  pub fn process_attributed_response(
    &self,
    response_text: &str,
    sources: &[RetrievalResult],
  ) -> AttributionRecord {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    let mut unresolved = 0usize;

    for caps in self.marker.captures_iter(response_text) {
      let index = caps[1].parse::<usize>().ok().filter(|i| (1..=sources.len()).contains(i));
      match index {
        Some(i) => *counts.entry(i).or_default() += 1,
        None => {
          warn!(marker = &caps[0], sources = sources.len(), "citation marker has no matching source");
          unresolved += 1;
        }
      }
    }

    let mut total_weight = 0.0;
    let mut weighted_confidence = 0.0;
    let cited: Vec<AttributedSource> = counts
      .iter()
      .map(|(&index, &reference_count)| {
        let source = &sources[index - 1];
        let weight = reference_count as f64 * source.relevance_score;
        total_weight += weight;
        weighted_confidence += weight * source.provenance.confidence_score;
        AttributedSource {
          source_id: source.provenance.source_id.clone(),
          title: source.provenance.title.clone(),
          reference_count,
          relevance_score: source.relevance_score,
          metadata: source.metadata.clone(),
        }
      })
      .collect();

    let average = (total_weight > 0.0).then(|| weighted_confidence / total_weight);
    let confidence = match average {
      Some(c) if c >= self.confidence_floor => c,
      _ => self.confidence_floor,
    };

    let citations: usize = counts.values().sum();
    let floor = self.confidence_floor;
    let mut explanation = format!(
      "{citations} citation(s) across {} of {} provided source(s)",
      cited.len(),
      sources.len()
    );
    if unresolved > 0 {
      explanation.push_str(&format!("; {unresolved} marker(s) did not match any source"));
    }
    explanation.push_str(&match average {
      Some(c) if c >= floor => "; confidence is the citation-weighted source confidence".to_owned(),
      Some(c) => format!("; weighted source confidence {c:.2} raised to the {floor:.2} floor"),
      None => format!("; no weighted citations, confidence set to the {floor:.2} floor"),
    });

    debug!(citations, cited = cited.len(), unresolved, confidence, "processed attributed response");

    AttributionRecord { text: response_text.to_owned(), sources: cited, confidence, explanation }
  }
}
