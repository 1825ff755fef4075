//! Query engine implementation
//!
//! Borrows one immutable (graph, index) pair and answers lookups and
//! keyword searches. Identical queries against the identical snapshot
//! produce byte-identical ordered output.

use crate::graph::GraphStore;
use crate::index::SearchIndex;
use crate::node::{NodeId, Note, NoteId, ThemeId, Verse};
use crate::query::{QueryError, DEFAULT_MAX_TRACE_DEPTH};
use crate::reference::VerseRange;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Result of a reference lookup: the resolved verses and every note whose
/// range touches them, both in canonical order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResult {
    pub verses: Vec<Verse>,
    pub notes: Vec<Note>,
}

/// One keyword search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub note: NoteId,
    pub score: f64,
}

/// A theme related to another through shared member nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeRelation {
    pub theme: ThemeId,
    pub label: String,
    /// Number of nodes linked to both themes
    pub shared: usize,
}

/// Query engine over one immutable snapshot.
pub struct QueryEngine<'a> {
    graph: &'a GraphStore,
    index: &'a SearchIndex,
    max_trace_depth: usize,
}

impl<'a> QueryEngine<'a> {
    pub fn new(graph: &'a GraphStore, index: &'a SearchIndex) -> Self {
        Self { graph, index, max_trace_depth: DEFAULT_MAX_TRACE_DEPTH }
    }

    pub fn with_max_trace_depth(mut self, max: usize) -> Self {
        self.max_trace_depth = max;
        self
    }

    pub fn graph(&self) -> &'a GraphStore {
        self.graph
    }

    pub fn index(&self) -> &'a SearchIndex {
        self.index
    }

    pub fn max_trace_depth(&self) -> usize {
        self.max_trace_depth
    }

    /// Resolve a reference string (exact verse or range) to its verses and
    /// attached notes.
    ///
    /// A reference that resolves to nothing is `NotFound`, never an empty
    /// success.
    pub fn lookup(&self, reference: &str) -> Result<LookupResult, QueryError> {
        let range = VerseRange::parse(reference)
            .map_err(|e| QueryError::NotFound(e.to_string()))?;

        let verses: Vec<Verse> = self.graph.verses_in_range(&range).cloned().collect();
        if verses.is_empty() {
            return Err(QueryError::NotFound(format!("{} is not in the corpus", range)));
        }
        let notes: Vec<Note> =
            self.graph.notes_in_range(&range).into_iter().cloned().collect();
        Ok(LookupResult { verses, notes })
    }

    /// Keyword search over the full-text index.
    ///
    /// Scores are summed per-token normalized term frequencies; hits are
    /// ordered by descending score, ties by canonical position of the note.
    /// Finite and restartable: a pure function of snapshot and keywords.
    pub fn search(&self, keywords: &[String]) -> Vec<SearchHit> {
        let mut scores: HashMap<&NoteId, f64> = HashMap::new();
        for keyword in keywords {
            for token in crate::index::tokenize(keyword) {
                for posting in self.index.postings(&token) {
                    *scores.entry(&posting.note).or_default() += posting.score;
                }
            }
        }

        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .map(|(note, score)| SearchHit { note: note.clone(), score })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    self.graph
                        .position(&NodeId::Note(a.note.clone()))
                        .cmp(self.graph.position(&NodeId::Note(b.note.clone())))
                })
        });
        hits
    }

    /// Themes sharing at least one member node with the given theme,
    /// ordered by descending overlap, ties by theme identity.
    pub fn related_themes(&self, theme: &ThemeId) -> Result<Vec<ThemeRelation>, QueryError> {
        let members = self.index.theme_members(theme).ok_or_else(|| {
            QueryError::NotFound(format!("theme {} is not in the corpus", theme))
        })?;
        let members: HashSet<&NodeId> = members.iter().collect();

        let mut relations: Vec<ThemeRelation> = Vec::new();
        for (other, other_members) in self.index.themes() {
            if other == theme {
                continue;
            }
            let shared = other_members.iter().filter(|n| members.contains(n)).count();
            if shared == 0 {
                continue;
            }
            let label = self
                .graph
                .get_theme(other)
                .map(|t| t.label.clone())
                .unwrap_or_else(|| other.to_string());
            relations.push(ThemeRelation { theme: other.clone(), label, shared });
        }
        relations.sort_by(|a, b| b.shared.cmp(&a.shared).then_with(|| a.theme.cmp(&b.theme)));
        Ok(relations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn engine_fixture(input: &str) -> (GraphStore, SearchIndex) {
        let (corpus, report) = Parser::new().parse(input).unwrap();
        assert!(report.is_clean(), "parse errors: {:?}", report.errors);
        let graph = GraphStore::build(corpus).unwrap();
        let index = SearchIndex::build(&graph).unwrap();
        (graph, index)
    }

    const CORPUS: &str = r#"
@verse GEN.15.6
And he believed in the LORD; and he counted it to him for righteousness.

@verse GEN.15.7
And he said unto him, I am the LORD.

@note covenant GEN.15.6-7
The covenant of faith counted for righteousness.
"#;

    #[test]
    fn test_lookup_exact() {
        let (graph, index) = engine_fixture(CORPUS);
        let engine = QueryEngine::new(&graph, &index);

        let result = engine.lookup("Genesis 15:6").unwrap();
        assert_eq!(result.verses.len(), 1);
        assert_eq!(result.notes.len(), 1);
        assert_eq!(result.notes[0].id.as_str(), "covenant");
    }

    #[test]
    fn test_lookup_range() {
        let (graph, index) = engine_fixture(CORPUS);
        let engine = QueryEngine::new(&graph, &index);

        let result = engine.lookup("GEN.15.6-7").unwrap();
        assert_eq!(result.verses.len(), 2);
    }

    #[test]
    fn test_lookup_missing_is_not_found() {
        let (graph, index) = engine_fixture(CORPUS);
        let engine = QueryEngine::new(&graph, &index);

        let err = engine.lookup("John 3:16").unwrap_err();
        assert!(matches!(err, QueryError::NotFound(_)));
    }

    #[test]
    fn test_lookup_unparseable_is_not_found() {
        let (graph, index) = engine_fixture(CORPUS);
        let engine = QueryEngine::new(&graph, &index);
        assert!(matches!(engine.lookup("garbage!!"), Err(QueryError::NotFound(_))));
    }

    #[test]
    fn test_search_orders_by_score() {
        let input = r#"
@verse GEN.1.1
In the beginning.

@note dense GEN.1.1
grace grace grace

@note sparse GEN.1.1
grace among many other surrounding words here
"#;
        let (graph, index) = engine_fixture(input);
        let engine = QueryEngine::new(&graph, &index);

        let hits = engine.search(&["grace".to_string()]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].note.as_str(), "dense");
    }

    #[test]
    fn test_search_multi_keyword_sums() {
        let (graph, index) = engine_fixture(CORPUS);
        let engine = QueryEngine::new(&graph, &index);

        let one = engine.search(&["covenant".to_string()]);
        let two = engine.search(&["covenant".to_string(), "faith".to_string()]);
        assert_eq!(one.len(), 1);
        assert_eq!(two.len(), 1);
        assert!(two[0].score > one[0].score);
    }

    #[test]
    fn test_search_deterministic() {
        let (graph, index) = engine_fixture(CORPUS);
        let engine = QueryEngine::new(&graph, &index);

        let keywords = vec!["righteousness".to_string()];
        let a = engine.search(&keywords);
        let b = engine.search(&keywords);
        assert_eq!(a, b);
    }

    const THEMED: &str = r#"
@verse GEN.15.6
And he believed.

@note covenant GEN.15.6
On the covenant of faith.
@theme Abrahamic Covenant
@theme Faith

@note promise GEN.15.6
On the promise.
@theme Abrahamic Covenant

@note trust GEN.15.6
On trust alone.
@theme Faith
"#;

    #[test]
    fn test_related_themes_by_shared_members() {
        let (graph, index) = engine_fixture(THEMED);
        let engine = QueryEngine::new(&graph, &index);

        let relations =
            engine.related_themes(&ThemeId::from_label("Abrahamic Covenant")).unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].label, "Faith");
        assert_eq!(relations[0].shared, 1);
    }

    #[test]
    fn test_related_themes_disjoint_is_empty() {
        let input = r#"
@verse GEN.1.1
In the beginning.

@note alpha GEN.1.1
First.
@theme Creation

@note beta GEN.1.1
Second.
@theme Fall
"#;
        let (graph, index) = engine_fixture(input);
        let engine = QueryEngine::new(&graph, &index);
        assert!(engine.related_themes(&ThemeId::from_label("Creation")).unwrap().is_empty());
    }

    #[test]
    fn test_related_themes_unknown_is_not_found() {
        let (graph, index) = engine_fixture(THEMED);
        let engine = QueryEngine::new(&graph, &index);
        assert!(matches!(
            engine.related_themes(&ThemeId::from_label("No Such Theme")),
            Err(QueryError::NotFound(_))
        ));
    }

    #[test]
    fn test_search_no_match_is_empty() {
        let (graph, index) = engine_fixture(CORPUS);
        let engine = QueryEngine::new(&graph, &index);
        assert!(engine.search(&["nonexistent".to_string()]).is_empty());
    }
}
