//! Error type for `lore-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] lore_core::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("corrupt row: {0}")]
  Corrupt(String),

  /// A stored type key that no longer names a known variant.
  #[error("unknown {what} {value:?}")]
  UnknownKind { what: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Core errors pass through untouched; everything else is a backend failure.
impl From<Error> for lore_core::Error {
  fn from(error: Error) -> Self {
    match error {
      Error::Core(core) => core,
      other => lore_core::Error::Persistence(other.to_string()),
    }
  }
}
