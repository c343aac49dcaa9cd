//! SQLite backend for the Lore engine.
//!
//! Implements [`lore_core::persist::Persistence`]: the schema is kept as an
//! append-only series of versioned JSON documents, the graph as id-keyed
//! tables rewritten on every snapshot.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
