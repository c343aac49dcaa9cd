//! Heuristic entity extraction.
//!
//! Three tiers run in order and stop as soon as they have enough:
//!
//! 1. a keyword dictionary mapping domain terms straight to a type;
//! 2. runs of capitalised words, typed as `date`, `concept`, or `other`;
//! 3. if both found nothing, the most frequent long word as one `concept`.
//!
//! Tier 3 always yields something for non-blank content, so indexing never
//! produces zero entities.

use std::collections::HashMap;

use regex::Regex;

use crate::{
  Error, Result,
  config::ExtractionConfig,
  entity::{EntityType, Mention, canonicalize},
};

const STOPWORDS: &[&str] = &[
  "a", "an", "and", "as", "at", "but", "by", "for", "from", "he", "her", "his", "i", "if",
  "in", "it", "its", "of", "on", "or", "our", "she", "so", "that", "the", "their", "then",
  "there", "these", "they", "this", "those", "to", "we", "when", "while", "with", "you",
];

const MONTHS: &[&str] = &[
  "january", "february", "march", "april", "may", "june", "july", "august", "september",
  "october", "november", "december",
];

const WEEKDAYS: &[&str] = &[
  "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

/// Longest name emitted by the last-resort fallback.
const MAX_FALLBACK_NAME_CHARS: usize = 64;

/// Which tier produced the final entity set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTier {
  Keywords,
  Capitalization,
  Frequency,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntity {
  pub name: String,
  pub kind: EntityType,
}

#[derive(Debug, Clone)]
pub struct Extraction {
  pub entities: Vec<ExtractedEntity>,
  pub tier:     ExtractionTier,
}

struct KeywordRule {
  term:    String,
  kind:    EntityType,
  pattern: Regex,
}

pub struct EntityExtractor {
  keywords:            Vec<KeywordRule>,
  capitalized:         Regex,
  sufficient_entities: usize,
  max_entities:        usize,
  min_word_len:        usize,
}

impl EntityExtractor {
  pub fn new(config: &ExtractionConfig) -> Result<Self> {
    let keywords = config
      .keywords
      .iter()
      .map(|(term, kind)| (term.trim().to_lowercase(), *kind))
      .filter(|(term, _)| !term.is_empty())
      .map(|(term, kind)| {
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&term))).map_err(|e| {
          Error::validation(format!("keyword {term:?} cannot be matched: {e}"))
        })?;
        Ok(KeywordRule { term, kind, pattern })
      })
      .collect::<Result<Vec<_>>>()?;

    let capitalized = Regex::new(r"\b[A-Z][A-Za-z0-9'-]*(?:[ \t]+[A-Z][A-Za-z0-9'-]*)*")
      .map_err(|e| Error::validation(format!("capitalisation pattern: {e}")))?;

    Ok(Self {
      keywords,
      capitalized,
      sufficient_entities: config.sufficient_entities.max(1),
      max_entities: config.max_entities.max(1),
      min_word_len: config.min_fallback_word_len,
    })
  }

  pub fn extract(&self, content: &str) -> Extraction {
    let mut tier = ExtractionTier::Keywords;
    let mut entities = self.keyword_pass(content);

    if entities.len() < self.sufficient_entities {
      let before = entities.len();
      self.capitalization_pass(content, &mut entities);
      if entities.len() > before {
        tier = ExtractionTier::Capitalization;
      }
    }

    if entities.is_empty()
      && let Some(name) = fallback_name(content, self.min_word_len)
    {
      entities.push(ExtractedEntity { name, kind: EntityType::Concept });
      tier = ExtractionTier::Frequency;
    }

    entities.truncate(self.max_entities);
    Extraction { entities, tier }
  }

  /// Keyword hits, ordered by where each term first appears.
  fn keyword_pass(&self, content: &str) -> Vec<ExtractedEntity> {
    let mut hits: Vec<(usize, ExtractedEntity)> = self
      .keywords
      .iter()
      .filter_map(|rule| {
        rule.pattern.find(content).map(|m| {
          (m.start(), ExtractedEntity { name: rule.term.clone(), kind: rule.kind })
        })
      })
      .collect();
    hits.sort_by_key(|(pos, _)| *pos);
    hits.into_iter().map(|(_, e)| e).take(self.max_entities).collect()
  }

  fn capitalization_pass(&self, content: &str, entities: &mut Vec<ExtractedEntity>) {
    for m in self.capitalized.find_iter(content) {
      if entities.len() >= self.max_entities {
        break;
      }
      let Some(run) = strip_leading_stopwords(m.as_str()) else {
        continue;
      };
      let canonical = canonicalize(run);
      if canonical.is_empty() || entities.iter().any(|e| canonicalize(&e.name) == canonical) {
        continue;
      }
      entities.push(ExtractedEntity { name: run.to_owned(), kind: classify_run(run) });
    }
  }
}

/// Drop sentence-initial function words ("The Paris Agreement" → "Paris
/// Agreement"). `None` if nothing is left.
fn strip_leading_stopwords(run: &str) -> Option<&str> {
  let mut rest = run;
  loop {
    let trimmed = rest.trim_start();
    let word_end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let word = &trimmed[..word_end];
    if word.is_empty() {
      return None;
    }
    if STOPWORDS.contains(&word.to_ascii_lowercase().as_str()) {
      rest = &trimmed[word_end..];
    } else {
      return Some(trimmed.trim_end());
    }
  }
}

fn classify_run(run: &str) -> EntityType {
  let words: Vec<String> = run.split_whitespace().map(str::to_ascii_lowercase).collect();
  if words
    .iter()
    .any(|w| MONTHS.contains(&w.as_str()) || WEEKDAYS.contains(&w.as_str()))
  {
    EntityType::Date
  } else if words.len() > 1 {
    EntityType::Concept
  } else {
    EntityType::Other
  }
}

/// The most frequent word of at least `min_len` characters, counted
/// case-insensitively and returned as first spelled; ties go to the earliest
/// occurrence.
fn most_frequent_word(content: &str, min_len: usize) -> Option<String> {
  let mut counts: HashMap<String, (usize, usize, &str)> = HashMap::new();
  for (position, word) in content
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| !w.is_empty())
    .enumerate()
  {
    if word.chars().count() < min_len {
      continue;
    }
    let entry = counts.entry(word.to_lowercase()).or_insert((0, position, word));
    entry.0 += 1;
  }
  counts
    .into_values()
    .max_by(|(ca, pa, _), (cb, pb, _)| ca.cmp(cb).then(pb.cmp(pa)))
    .map(|(_, _, surface)| surface.to_owned())
}

/// Last-resort name for content the other tiers found nothing in. Relaxes the
/// length requirement, then falls back to the raw text itself.
fn fallback_name(content: &str, min_len: usize) -> Option<String> {
  most_frequent_word(content, min_len)
    .or_else(|| most_frequent_word(content, 1))
    .or_else(|| {
      let trimmed = content.trim();
      (!trimmed.is_empty()).then(|| trimmed.chars().take(MAX_FALLBACK_NAME_CHARS).collect())
    })
}

/// Every non-overlapping, ASCII-case-insensitive occurrence of `name` in
/// `content`, as byte spans.
pub fn find_mentions(content: &str, entity_id: &str, name: &str) -> Vec<Mention> {
  let needle = name.to_ascii_lowercase();
  if needle.is_empty() {
    return Vec::new();
  }
  // ASCII folding keeps byte offsets identical between the two strings.
  let haystack = content.to_ascii_lowercase();

  let mut mentions = Vec::new();
  let mut from = 0;
  while let Some(offset) = haystack[from..].find(&needle) {
    let start = from + offset;
    let end = start + needle.len();
    mentions.push(Mention {
      entity_id:    entity_id.to_owned(),
      start,
      end,
      surface_text: content[start..end].to_owned(),
    });
    from = end;
  }
  mentions
}

#[cfg(test)]
mod tests {
  use super::*;

  fn extractor() -> EntityExtractor { EntityExtractor::new(&ExtractionConfig::default()).unwrap() }

  fn names(x: &Extraction) -> Vec<&str> { x.entities.iter().map(|e| e.name.as_str()).collect() }

  #[test]
  fn keywords_then_capitalised_runs() {
    let x = extractor().extract("<title>Climate Pact</title> was signed by <org>UN</org>.");
    assert_eq!(names(&x), vec!["climate", "Climate Pact", "UN"]);
    assert_eq!(x.entities[0].kind, EntityType::Concept);
    assert_eq!(x.entities[1].kind, EntityType::Concept);
    assert_eq!(x.entities[2].kind, EntityType::Other);
    assert_eq!(x.tier, ExtractionTier::Capitalization);
  }

  #[test]
  fn capitalised_runs_are_deduplicated_against_keywords() {
    let x = extractor().extract("Climate matters. The climate summit met in June.");
    let n = names(&x);
    assert_eq!(n.iter().filter(|s| s.eq_ignore_ascii_case("climate")).count(), 1);
    assert!(n.contains(&"summit"));
    let june = x.entities.iter().find(|e| e.name == "June").unwrap();
    assert_eq!(june.kind, EntityType::Date);
  }

  #[test]
  fn leading_stopwords_are_stripped() {
    let x = extractor().extract("The Paris Agreement entered into force.");
    assert_eq!(names(&x), vec!["Paris Agreement"]);
  }

  #[test]
  fn enough_keywords_skip_capitalisation() {
    let mut config = ExtractionConfig::default();
    config.sufficient_entities = 2;
    let x = EntityExtractor::new(&config)
      .unwrap()
      .extract("Government research into Climate Science");
    assert_eq!(x.tier, ExtractionTier::Keywords);
    assert_eq!(names(&x), vec!["government", "research", "climate"]);
  }

  #[test]
  fn falls_back_to_most_frequent_long_word() {
    let x = extractor().extract("rivers flood when rivers rise and banks erode; rivers win");
    assert_eq!(x.tier, ExtractionTier::Frequency);
    assert_eq!(names(&x), vec!["rivers"]);
    assert_eq!(x.entities[0].kind, EntityType::Concept);
  }

  #[test]
  fn fallback_name_keeps_its_spelling_so_mentions_resolve() {
    let content = "ÜBERWACHUNG überwachung ok";
    let x = extractor().extract(content);
    assert_eq!(x.tier, ExtractionTier::Frequency);
    assert_eq!(names(&x), vec!["ÜBERWACHUNG"]);
    assert_eq!(find_mentions(content, "e1", &x.entities[0].name).len(), 1);

    let content = "ÜBERWACHUNG ÜBERWACHUNG ok";
    let x = extractor().extract(content);
    assert_eq!(find_mentions(content, "e1", &x.entities[0].name).len(), 2);
  }

  #[test]
  fn fallback_never_comes_up_empty() {
    assert_eq!(names(&extractor().extract("ok go")), vec!["ok"]);
    assert_eq!(names(&extractor().extract("?!")), vec!["?!"]);
  }

  #[test]
  fn max_entities_caps_output() {
    let mut config = ExtractionConfig::default();
    config.max_entities = 2;
    let x = EntityExtractor::new(&config)
      .unwrap()
      .extract("Alpha met Bravo and Charlie near Delta");
    assert_eq!(x.entities.len(), 2);
  }

  #[test]
  fn mentions_are_non_overlapping_and_case_insensitive() {
    let m = find_mentions("Climate, climate, CLIMATE", "e1", "climate");
    let spans: Vec<_> = m.iter().map(|m| (m.start, m.end)).collect();
    assert_eq!(spans, vec![(0, 7), (9, 16), (18, 25)]);
    assert_eq!(m[2].surface_text, "CLIMATE");

    let m = find_mentions("aaaa", "e1", "aa");
    assert_eq!(m.len(), 2);
    assert!(find_mentions("anything", "e1", "").is_empty());
  }

  #[test]
  fn mention_offsets_survive_multibyte_text() {
    let content = "Über UN — das UN";
    let m = find_mentions(content, "e1", "un");
    assert_eq!(m.len(), 2);
    for mention in m {
      assert_eq!(&content[mention.start..mention.end], "UN");
    }
  }
}
