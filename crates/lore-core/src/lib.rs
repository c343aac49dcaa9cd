//! Core of the Lore source-attribution knowledge-graph engine.
//!
//! Ingests text sources into an entity/relationship graph, answers queries
//! with ranked and explained source sets, builds citation-annotated prompts,
//! scores generated answers against their citations, and exports bounded
//! concept maps.
//!
//! This crate has no transport or database dependencies. Durable state plugs
//! in through [`persist::Persistence`]; see `lore-store-sqlite`.

pub mod attribution;
pub mod concept_map;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod extract;
pub mod index;
pub mod persist;
pub mod retrieval;
pub mod schema;
pub mod source;
pub mod store;

pub use engine::{Engine, EngineStats};
pub use error::{Error, Result};
