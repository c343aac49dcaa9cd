//! Error types for `lore-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Input rejected before any mutation took place.
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("relationship {relationship_id} references missing entity {entity_id}")]
  DanglingEndpoint {
    relationship_id: String,
    entity_id:       String,
  },

  #[error("entity not found: {0}")]
  EntityNotFound(String),

  #[error("relationship not found: {0}")]
  RelationshipNotFound(String),

  #[error("no document indexed for source {0}")]
  DocumentNotFound(String),

  /// A durable backend failed to read or write.
  #[error("persistence error: {0}")]
  Persistence(String),

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub(crate) fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }

  /// Caller supplied something malformed; maps to a 4xx at the transport.
  pub fn is_validation(&self) -> bool {
    matches!(self, Self::Validation(_) | Self::DanglingEndpoint { .. })
  }

  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::EntityNotFound(_)
        | Self::RelationshipNotFound(_)
        | Self::DocumentNotFound(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
