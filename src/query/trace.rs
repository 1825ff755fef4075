//! Theme-chain tracing - the central traversal algorithm
//!
//! Breadth-first expansion over theme links and cross-reference edges,
//! seeded either by every node linked to a theme or by a single start
//! node. A visited set keyed by node identity makes cyclic
//! cross-references safe; per-node provenance records the shortest
//! discovered path from a seed.
//!
//! Determinism: seeds are expanded in canonical order and each node's
//! steps are pre-sorted by the graph store, so identical inputs against an
//! identical snapshot yield byte-identical chains.

use crate::node::{NodeId, ThemeId};
use crate::query::{QueryEngine, QueryError};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Where a trace starts: a theme (all linked nodes become seeds) or a
/// single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceSeed {
    Theme(ThemeId),
    Node(NodeId),
}

impl TraceSeed {
    /// Parse a seed string: a theme label unless it parses as a node key
    /// or verse reference.
    pub fn parse(s: &str) -> TraceSeed {
        match NodeId::parse(s) {
            Ok(node) if !matches!(node, NodeId::Theme(_)) => TraceSeed::Node(node),
            _ => TraceSeed::Theme(ThemeId::from_label(s)),
        }
    }
}

/// Cooperative cancellation for long traversals: an explicit signal, an
/// optional deadline, or both. Checked between expansion steps; nothing is
/// mutated during traversal, so cancellation cannot corrupt shared state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self { flag: Arc::default(), deadline: Some(deadline) }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// One visited node with its discovery depth and shortest provenance path
/// (seed first, the node itself last).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub node: NodeId,
    pub depth: usize,
    pub path: Vec<NodeId>,
}

/// Ordered, deduplicated result of a theme trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub seed: TraceSeed,
    pub max_depth: usize,
    /// Visited nodes sorted by canonical position
    pub entries: Vec<ChainEntry>,
}

impl Chain {
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.entries.iter().map(|e| &e.node)
    }
}

impl QueryEngine<'_> {
    /// Trace a theme (or a start node) outward up to `max_depth` hops.
    ///
    /// `max_depth` above the configured maximum fails with `InvalidDepth`
    /// rather than silently truncating; `max_depth = 0` returns only the
    /// seed nodes.
    pub fn trace(
        &self,
        seed: &TraceSeed,
        max_depth: usize,
        cancel: &CancelToken,
    ) -> Result<Chain, QueryError> {
        if max_depth > self.max_trace_depth() {
            return Err(QueryError::InvalidDepth {
                requested: max_depth,
                max: self.max_trace_depth(),
            });
        }

        let graph = self.graph();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<ChainEntry> = VecDeque::new();
        let mut entries: Vec<ChainEntry> = Vec::new();

        match seed {
            TraceSeed::Theme(theme) => {
                if graph.get_theme(theme).is_none() {
                    return Err(QueryError::NotFound(format!("theme {} is not in the corpus", theme)));
                }
                // The theme node itself is provenance, not a chain member
                visited.insert(NodeId::Theme(theme.clone()));
                for member in self.index().theme_members(theme).unwrap_or(&[]) {
                    if visited.insert(member.clone()) {
                        queue.push_back(ChainEntry {
                            node: member.clone(),
                            depth: 0,
                            path: vec![member.clone()],
                        });
                    }
                }
            }
            TraceSeed::Node(node) => {
                if !graph.contains(node) {
                    return Err(QueryError::NotFound(format!("{} is not in the corpus", node)));
                }
                visited.insert(node.clone());
                queue.push_back(ChainEntry { node: node.clone(), depth: 0, path: vec![node.clone()] });
            }
        }

        while let Some(entry) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }

            if entry.depth < max_depth {
                for step in graph.steps(&entry.node) {
                    if visited.insert(step.to.clone()) {
                        let mut path = entry.path.clone();
                        path.push(step.to.clone());
                        queue.push_back(ChainEntry {
                            node: step.to.clone(),
                            depth: entry.depth + 1,
                            path,
                        });
                    }
                }
            }
            entries.push(entry);
        }

        entries.sort_by(|a, b| graph.position(&a.node).cmp(graph.position(&b.node)));
        Ok(Chain { seed: seed.clone(), max_depth, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::index::SearchIndex;
    use crate::parser::Parser;

    fn fixture(input: &str) -> (GraphStore, SearchIndex) {
        let (corpus, report) = Parser::new().parse(input).unwrap();
        assert!(report.is_clean(), "parse errors: {:?}", report.errors);
        let graph = GraphStore::build(corpus).unwrap();
        let index = SearchIndex::build(&graph).unwrap();
        (graph, index)
    }

    /// Genesis 15:6 --fulfillment--> note, note theme-linked to
    /// "Abrahamic Covenant", which is also linked to Romans 4:3.
    const COVENANT: &str = r#"
@verse GEN.15.6
And he believed in the LORD.
@ref fulfillment note:covenant-fulfilled

@verse ROM.4.3
Abraham believed God.
@theme Abrahamic Covenant

@note covenant-fulfilled GEN.15.6
Abrahamic Covenant fulfilled.
@theme Abrahamic Covenant
"#;

    #[test]
    fn test_trace_theme_scenario() {
        let (graph, index) = fixture(COVENANT);
        let engine = QueryEngine::new(&graph, &index);

        let seed = TraceSeed::Theme(ThemeId::from_label("Abrahamic Covenant"));
        let chain = engine.trace(&seed, 2, &CancelToken::new()).unwrap();

        let keys: Vec<String> = chain.nodes().map(|n| n.to_key()).collect();
        assert_eq!(
            keys,
            vec!["verse:GEN.15.6", "note:covenant-fulfilled", "verse:ROM.4.3"]
        );
    }

    #[test]
    fn test_trace_records_provenance() {
        let (graph, index) = fixture(COVENANT);
        let engine = QueryEngine::new(&graph, &index);

        let seed = TraceSeed::Theme(ThemeId::from_label("Abrahamic Covenant"));
        let chain = engine.trace(&seed, 2, &CancelToken::new()).unwrap();

        for entry in &chain.entries {
            assert_eq!(entry.path.len(), entry.depth + 1);
            assert_eq!(entry.path.last(), Some(&entry.node));
        }
        // GEN.15.6 is reached from the note seed in one hop
        let genesis = chain
            .entries
            .iter()
            .find(|e| e.node.to_key() == "verse:GEN.15.6")
            .unwrap();
        assert_eq!(genesis.depth, 1);
        assert_eq!(genesis.path[0].to_key(), "note:covenant-fulfilled");
    }

    #[test]
    fn test_trace_depth_zero_returns_seeds_only() {
        let (graph, index) = fixture(COVENANT);
        let engine = QueryEngine::new(&graph, &index);

        let seed = TraceSeed::Theme(ThemeId::from_label("Abrahamic Covenant"));
        let chain = engine.trace(&seed, 0, &CancelToken::new()).unwrap();
        let keys: Vec<String> = chain.nodes().map(|n| n.to_key()).collect();
        assert_eq!(keys, vec!["note:covenant-fulfilled", "verse:ROM.4.3"]);
        assert!(chain.entries.iter().all(|e| e.depth == 0));
    }

    #[test]
    fn test_trace_depth_above_max_fails() {
        let (graph, index) = fixture(COVENANT);
        let engine = QueryEngine::new(&graph, &index);

        let seed = TraceSeed::Theme(ThemeId::from_label("Abrahamic Covenant"));
        let err = engine.trace(&seed, 7, &CancelToken::new()).unwrap_err();
        assert_eq!(err, QueryError::InvalidDepth { requested: 7, max: 6 });
    }

    #[test]
    fn test_trace_cycle_terminates() {
        let input = r#"
@verse GEN.1.1
In the beginning.

@note alpha GEN.1.1
First of the pair.
@ref explanatory note:omega

@note omega GEN.1.1
Second of the pair.
@ref explanatory note:alpha
"#;
        let (graph, index) = fixture(input);
        let engine = QueryEngine::new(&graph, &index);

        let seed = TraceSeed::Node(NodeId::parse("note:alpha").unwrap());
        let chain = engine.trace(&seed, 5, &CancelToken::new()).unwrap();
        let keys: Vec<String> = chain.nodes().map(|n| n.to_key()).collect();
        assert_eq!(keys, vec!["note:alpha", "note:omega"]);
    }

    #[test]
    fn test_trace_unknown_theme_not_found() {
        let (graph, index) = fixture(COVENANT);
        let engine = QueryEngine::new(&graph, &index);

        let seed = TraceSeed::Theme(ThemeId::from_label("No Such Theme"));
        assert!(matches!(
            engine.trace(&seed, 2, &CancelToken::new()),
            Err(QueryError::NotFound(_))
        ));
    }

    #[test]
    fn test_trace_respects_hop_bound() {
        let input = r#"
@verse GEN.1.1
One.
@ref parallel GEN.1.2

@verse GEN.1.2
Two.
@ref parallel GEN.1.3

@verse GEN.1.3
Three.
"#;
        let (graph, index) = fixture(input);
        let engine = QueryEngine::new(&graph, &index);

        let seed = TraceSeed::Node(NodeId::parse("GEN.1.1").unwrap());
        let chain = engine.trace(&seed, 1, &CancelToken::new()).unwrap();
        let keys: Vec<String> = chain.nodes().map(|n| n.to_key()).collect();
        assert_eq!(keys, vec!["verse:GEN.1.1", "verse:GEN.1.2"]);
    }

    #[test]
    fn test_trace_cancellation() {
        let (graph, index) = fixture(COVENANT);
        let engine = QueryEngine::new(&graph, &index);

        let cancel = CancelToken::new();
        cancel.cancel();
        let seed = TraceSeed::Theme(ThemeId::from_label("Abrahamic Covenant"));
        assert_eq!(engine.trace(&seed, 2, &cancel), Err(QueryError::Cancelled));
    }

    #[test]
    fn test_trace_deterministic() {
        let (graph, index) = fixture(COVENANT);
        let engine = QueryEngine::new(&graph, &index);

        let seed = TraceSeed::Theme(ThemeId::from_label("Abrahamic Covenant"));
        let a = engine.trace(&seed, 2, &CancelToken::new()).unwrap();
        let b = engine.trace(&seed, 2, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_parse() {
        assert!(matches!(TraceSeed::parse("Genesis 15:6"), TraceSeed::Node(_)));
        assert!(matches!(TraceSeed::parse("note:alpha"), TraceSeed::Node(_)));
        assert!(matches!(TraceSeed::parse("Abrahamic Covenant"), TraceSeed::Theme(_)));
    }
}
