//! The durability seam.
//!
//! The engine is fully usable without durable state; a backend (e.g.
//! `lore-store-sqlite`) plugs in here when a deployment wants the schema and
//! graph to survive restarts.

use crate::{Result, schema::SchemaDefinition, store::GraphSnapshot};

/// A durable home for the schema document and graph dumps.
///
/// Schema saves run under the engine's write lock. Snapshot saves run under
/// its read lock, so they never interleave with a mutation but may overlap
/// each other and other reads; implementations guard their own state.
pub trait Persistence: Send + Sync {
  /// The most recently saved schema, or `None` if nothing was ever saved.
  fn load_schema(&self) -> Result<Option<SchemaDefinition>>;

  fn save_schema(&self, schema: &SchemaDefinition) -> Result<()>;

  /// The most recently saved graph dump, or `None` if there isn't one.
  fn load_snapshot(&self) -> Result<Option<GraphSnapshot>>;

  fn save_snapshot(&self, snapshot: &GraphSnapshot) -> Result<()>;
}

/// No durability: loads find nothing, saves succeed and are discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ephemeral;

impl Persistence for Ephemeral {
  fn load_schema(&self) -> Result<Option<SchemaDefinition>> { Ok(None) }

  fn save_schema(&self, _schema: &SchemaDefinition) -> Result<()> { Ok(()) }

  fn load_snapshot(&self) -> Result<Option<GraphSnapshot>> { Ok(None) }

  fn save_snapshot(&self, _snapshot: &GraphSnapshot) -> Result<()> { Ok(()) }
}
