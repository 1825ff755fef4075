//! Edge types - typed relationships between corpus nodes
//!
//! Two edge families exist:
//! - `CrossRef`: directed verse/note -> verse/note, carrying a relation kind
//! - `ThemeLink`: undirected theme <-> verse/note association
//!
//! Cross-reference edges may form cycles (mutually explanatory notes are
//! common); traversal handles that, the store does not reject it.

use crate::node::{NodeId, ThemeId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Relation kinds carried by cross-reference edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// Parallel passages (same event or teaching)
    Parallel,
    /// Source explains or expands the target
    Explanatory,
    /// Target fulfills the source (prophecy, promise)
    Fulfillment,
    /// Typological correspondence (shadow and substance)
    Typological,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Parallel => "parallel",
            RelationKind::Explanatory => "explanatory",
            RelationKind::Fulfillment => "fulfillment",
            RelationKind::Typological => "typological",
        }
    }

    pub fn all() -> &'static [RelationKind] {
        &[
            RelationKind::Parallel,
            RelationKind::Explanatory,
            RelationKind::Fulfillment,
            RelationKind::Typological,
        ]
    }
}

impl FromStr for RelationKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parallel" => Ok(RelationKind::Parallel),
            "explanatory" | "explains" | "explanation" => Ok(RelationKind::Explanatory),
            "fulfillment" | "fulfils" | "fulfills" => Ok(RelationKind::Fulfillment),
            "typological" | "type" => Ok(RelationKind::Typological),
            _ => Err(crate::Error::InvalidReference(format!(
                "Unknown relation kind: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed cross-reference between two verse/note nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrossRef {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: RelationKind,
}

impl CrossRef {
    pub fn new(source: NodeId, target: NodeId, kind: RelationKind) -> Self {
        Self { source, target, kind }
    }
}

/// An undirected association between a theme and a verse or note.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThemeLink {
    pub theme: ThemeId,
    pub node: NodeId,
}

impl ThemeLink {
    pub fn new(theme: ThemeId, node: NodeId) -> Self {
        Self { theme, node }
    }
}

/// Raw edge emitted by the parser: endpoints are syntactically valid node
/// identities, but have not been resolved against the record set.
/// `GraphStore::build` resolves them or fails with a dangling-reference
/// validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescriptor {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: RelationKind,
    /// Line in the source file the tag came from, for error reporting
    pub line: usize,
}

impl EdgeDescriptor {
    pub fn new(source: NodeId, target: NodeId, kind: RelationKind, line: usize) -> Self {
        Self { source, target, kind, line }
    }
}
