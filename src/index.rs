//! Indexer - derived lookup structures over a built graph
//!
//! Three indexes are built from a `GraphStore` snapshot, none of which
//! duplicates ownership of node or edge data:
//!
//! - Reference index: canonical reference -> node identity, exact and range
//! - Theme index: normalized label -> members in canonical order
//! - Full-text index: token -> note postings with length-normalized term
//!   frequency (search is intra-corpus, so no external statistics)
//!
//! A failed consistency check after build is an engine bug, never an
//! expected runtime condition, and aborts the build.

use crate::graph::GraphStore;
use crate::node::{fold_char, NodeId, NoteId, ThemeId};
use crate::reference::VerseId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Internal consistency violation found while building indexes.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("index consistency violation: {reason}")]
pub struct IndexError {
    pub reason: String,
}

/// A posting in the full-text index: note plus its normalized term
/// frequency for the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub note: NoteId,
    pub score: f64,
}

/// Derived lookup structures over one graph snapshot.
#[derive(Debug, Default)]
pub struct SearchIndex {
    /// Exact verse -> verse node (the reference index proper; range lookup
    /// delegates to the graph's ordered verse map)
    reference: BTreeMap<VerseId, NodeId>,
    /// Normalized theme label -> members ordered by canonical position
    themes: HashMap<ThemeId, Vec<NodeId>>,
    /// Token -> postings sorted by descending score, ties by canonical
    /// position of the note
    tokens: HashMap<String, Vec<Posting>>,
}

impl SearchIndex {
    /// Build all indexes over a graph snapshot.
    pub fn build(graph: &GraphStore) -> Result<SearchIndex, IndexError> {
        let mut index = SearchIndex::default();

        for verse in graph.all_verses() {
            index.reference.insert(verse.id, NodeId::Verse(verse.id));
        }

        for theme in graph.all_themes() {
            let members: Vec<NodeId> =
                graph.theme_members(&theme.id).into_iter().cloned().collect();
            index.themes.insert(theme.id.clone(), members);
        }

        for note in graph.all_notes() {
            let tokens = tokenize(&note.text);
            if tokens.is_empty() {
                continue;
            }
            let total = tokens.len() as f64;
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for token in &tokens {
                *counts.entry(token.as_str()).or_default() += 1;
            }
            for (token, count) in counts {
                index.tokens.entry(token.to_string()).or_default().push(Posting {
                    note: note.id.clone(),
                    score: count as f64 / total,
                });
            }
        }
        for postings in index.tokens.values_mut() {
            postings.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| {
                        graph
                            .position(&NodeId::Note(a.note.clone()))
                            .cmp(graph.position(&NodeId::Note(b.note.clone())))
                    })
            });
        }

        index.verify(graph)?;
        Ok(index)
    }

    /// Every node reachable in the graph must be reachable through at least
    /// one index key; anything else is a bug in the build.
    fn verify(&self, graph: &GraphStore) -> Result<(), IndexError> {
        for verse in graph.all_verses() {
            if !self.reference.contains_key(&verse.id) {
                return Err(IndexError {
                    reason: format!("verse {} missing from reference index", verse.id),
                });
            }
        }

        let mut indexed_notes: HashSet<&NoteId> = HashSet::new();
        for postings in self.tokens.values() {
            indexed_notes.extend(postings.iter().map(|p| &p.note));
        }
        for members in self.themes.values() {
            indexed_notes.extend(members.iter().filter_map(|n| match n {
                NodeId::Note(id) => Some(id),
                _ => None,
            }));
        }
        for note in graph.all_notes() {
            if indexed_notes.contains(&note.id) {
                continue;
            }
            // A tokenless, theme-less note is still reachable through its
            // verse range; only a note absent from the range scan is a bug
            let in_range =
                graph.notes_in_range(&note.range).iter().any(|n| n.id == note.id);
            if !in_range {
                return Err(IndexError {
                    reason: format!("note {} unreachable via any index key", note.id),
                });
            }
        }

        for theme in graph.all_themes() {
            if !self.themes.contains_key(&theme.id) {
                return Err(IndexError {
                    reason: format!("theme {} missing from theme index", theme.id),
                });
            }
        }
        Ok(())
    }

    /// Exact reference lookup.
    pub fn lookup_verse(&self, id: VerseId) -> Option<&NodeId> {
        self.reference.get(&id)
    }

    /// Members of a theme by normalized label, in canonical order.
    pub fn theme_members(&self, theme: &ThemeId) -> Option<&[NodeId]> {
        self.themes.get(theme).map(|v| v.as_slice())
    }

    /// All themes with their members. Iteration order is unspecified;
    /// callers needing determinism sort the result.
    pub fn themes(&self) -> impl Iterator<Item = (&ThemeId, &[NodeId])> {
        self.themes.iter().map(|(id, members)| (id, members.as_slice()))
    }

    /// Postings for one token, best first.
    pub fn postings(&self, token: &str) -> &[Posting] {
        self.tokens.get(token).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// Whitespace/punctuation tokenization with case and diacritic folding.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        let f = fold_char(c).unwrap_or(c);
        if f.is_alphanumeric() {
            current.extend(f.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
