//! Query operations over an indexed snapshot
//!
//! - Reference lookup (exact or range)
//! - Keyword search over the full-text index
//! - Theme-chain tracing (BFS over theme links and cross-references)

pub mod engine;
pub mod trace;

pub use engine::{LookupResult, QueryEngine, SearchHit, ThemeRelation};
pub use trace::{CancelToken, Chain, ChainEntry, TraceSeed};

use serde::{Deserialize, Serialize};

/// Default upper bound on `trace` depth; configurable via `Config`.
pub const DEFAULT_MAX_TRACE_DEPTH: usize = 6;

/// Errors returned to query callers. Never fatal to the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "message")]
pub enum QueryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid depth {requested}: must not exceed {max}")]
    InvalidDepth { requested: usize, max: usize },

    #[error("query cancelled")]
    Cancelled,
}
