//! # Versegraph - Thematic cross-reference graph engine
//!
//! Versegraph turns an annotated scripture corpus (canonical text plus
//! study notes carrying reference and theme tags) into a queryable graph:
//!
//! - Canonical parser for the block markup format
//! - Immutable graph store with validated, typed edges
//! - Derived indexes: reference, theme, and full-text
//! - Query engine for reference lookup, keyword search, and theme tracing
//! - Snapshot manager for lock-free concurrent reads across rebuilds
//! - SQLite-backed snapshot bundles loadable without re-parsing

pub mod reference;
pub mod node;
pub mod edge;
pub mod parser;
pub mod graph;
pub mod index;
pub mod query;
pub mod snapshot;
pub mod pipeline;
pub mod storage;
pub mod api;
pub mod server;
pub mod ui;
pub mod config;

// Re-exports for convenient access
pub use reference::{Book, VerseId, VerseRange};
pub use node::{NodeId, NoteId, ThemeId, Verse, Note, Theme};
pub use edge::{CrossRef, EdgeDescriptor, RelationKind, ThemeLink};
pub use parser::{ParseError, ParseReport, ParsedCorpus};
pub use graph::{GraphStore, ValidationError};
pub use index::{IndexError, SearchIndex};
pub use query::{Chain, QueryEngine, QueryError};
pub use snapshot::{Snapshot, SnapshotManager};

/// Result type alias for versegraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for versegraph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Parsing aborted: {0}")]
    ParseFatal(ParseReport),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Snapshot bundle error: {0}")]
    Bundle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
