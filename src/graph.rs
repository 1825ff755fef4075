//! Graph store - immutable, validated corpus graph
//!
//! `GraphStore::build` assembles parser output into a single consistent
//! structure: every edge endpoint resolved, adjacency lists precomputed and
//! sorted into the fixed visitation order that makes traversal
//! deterministic. The store is immutable after build; rebuilds produce a
//! fresh store published through the snapshot manager.

use crate::edge::{CrossRef, RelationKind, ThemeLink};
use crate::node::{NodeId, Note, NoteId, Theme, ThemeId, Verse};
use crate::parser::ParsedCorpus;
use crate::reference::{VerseId, VerseRange};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One reason a record set failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationFailure {
    /// An edge endpoint does not resolve to any node in the record set
    DanglingReference { source: NodeId, target: NodeId, endpoint: NodeId, line: usize },
    /// Two verses share an identity with differing content
    DuplicateIdentity { verse: VerseId },
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::DanglingReference { source, target, endpoint, line } => write!(
                f,
                "dangling reference at line {}: {} does not exist (edge {} -> {})",
                line, endpoint, source, target
            ),
            ValidationFailure::DuplicateIdentity { verse } => {
                write!(f, "duplicate identity: {} ingested with differing text", verse)
            }
        }
    }
}

/// Validation failed; carries the full itemized list so the build tool can
/// report every problem in one pass.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("validation failed with {} error(s)", failures.len())]
pub struct ValidationError {
    pub failures: Vec<ValidationFailure>,
}

/// Direction a cross-reference edge is being walked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

/// Label on a traversal step out of a node.
///
/// The derived `Ord` fixes the visitation order: theme links first, then
/// cross-references by relation kind, forward before reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepLabel {
    ThemeLink,
    CrossRef(RelationKind, Direction),
}

/// One outgoing traversal step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub label: StepLabel,
    pub to: NodeId,
}

/// Canonical position of a node, the engine-wide sort key.
///
/// Verses anchor at themselves, notes at their range start, themes at the
/// smallest linked position. Nodes sharing an anchor order verse < note <
/// theme, then by identity slug so ties stay deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub anchor: Option<VerseId>,
    class: u8,
    tiebreak: String,
}

impl Position {
    fn verse(id: VerseId) -> Self {
        Self { anchor: Some(id), class: 0, tiebreak: String::new() }
    }

    fn note(start: VerseId, id: &NoteId) -> Self {
        Self { anchor: Some(start), class: 1, tiebreak: id.as_str().to_string() }
    }

    fn theme(anchor: Option<VerseId>, id: &ThemeId) -> Self {
        Self { anchor, class: 2, tiebreak: id.as_str().to_string() }
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        // Unanchored positions (themes with no links) sort last
        match (self.anchor, other.anchor) {
            (Some(a), Some(b)) => a
                .cmp(&b)
                .then_with(|| self.class.cmp(&other.class))
                .then_with(|| self.tiebreak.cmp(&other.tiebreak)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => {
                self.class.cmp(&other.class).then_with(|| self.tiebreak.cmp(&other.tiebreak))
            }
        }
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Immutable corpus graph: nodes, typed edges, and precomputed adjacency.
#[derive(Debug, Default)]
pub struct GraphStore {
    verses: BTreeMap<VerseId, Verse>,
    notes: HashMap<NoteId, Note>,
    themes: HashMap<ThemeId, Theme>,
    cross_refs: Vec<CrossRef>,
    theme_links: Vec<ThemeLink>,
    /// Per-node steps, sorted by (label, target position) at build time
    adjacency: HashMap<NodeId, Vec<Step>>,
    /// Notes grouped by range start for range queries
    notes_by_start: BTreeMap<VerseId, Vec<NoteId>>,
    positions: HashMap<NodeId, Position>,
}

impl GraphStore {
    /// Assemble a validated graph from parser output.
    ///
    /// Pure transformation: resolves every edge descriptor against the
    /// record maps and fails with the full list of dangling references and
    /// duplicate identities if anything does not line up.
    pub fn build(corpus: ParsedCorpus) -> Result<GraphStore, ValidationError> {
        let mut failures = Vec::new();

        for verse in &corpus.conflicting_verses {
            failures.push(ValidationFailure::DuplicateIdentity { verse: *verse });
        }

        let mut cross_refs = Vec::new();
        for desc in &corpus.edges {
            let mut dangling = None;
            for endpoint in [&desc.source, &desc.target] {
                if !endpoint_exists(endpoint, &corpus) {
                    dangling = Some(endpoint.clone());
                    break;
                }
            }
            match dangling {
                Some(endpoint) => failures.push(ValidationFailure::DanglingReference {
                    source: desc.source.clone(),
                    target: desc.target.clone(),
                    endpoint,
                    line: desc.line,
                }),
                None => {
                    cross_refs.push(CrossRef::new(desc.source.clone(), desc.target.clone(), desc.kind))
                }
            }
        }

        let mut theme_links = Vec::new();
        for (theme, node, line) in &corpus.theme_links {
            let theme_node = NodeId::Theme(theme.clone());
            let missing = if !corpus.themes.contains_key(theme) {
                Some(theme_node.clone())
            } else if !endpoint_exists(node, &corpus) {
                Some(node.clone())
            } else {
                None
            };
            match missing {
                Some(endpoint) => failures.push(ValidationFailure::DanglingReference {
                    source: theme_node,
                    target: node.clone(),
                    endpoint,
                    line: *line,
                }),
                None => theme_links.push(ThemeLink::new(theme.clone(), node.clone())),
            }
        }

        if !failures.is_empty() {
            return Err(ValidationError { failures });
        }

        // Deduplicate edges so re-ingested tags do not double-connect
        cross_refs.sort_by(|a, b| {
            (a.kind, a.source.to_key(), a.target.to_key())
                .cmp(&(b.kind, b.source.to_key(), b.target.to_key()))
        });
        cross_refs.dedup();
        theme_links.sort_by(|a, b| {
            (a.theme.as_str(), a.node.to_key()).cmp(&(b.theme.as_str(), b.node.to_key()))
        });
        theme_links.dedup();

        let mut store = GraphStore {
            verses: corpus.verses,
            notes: corpus.notes.into_iter().collect(),
            themes: corpus.themes.into_iter().collect(),
            cross_refs,
            theme_links,
            ..Default::default()
        };

        for note in store.notes.values() {
            store
                .notes_by_start
                .entry(note.range.start)
                .or_default()
                .push(note.id.clone());
        }
        for ids in store.notes_by_start.values_mut() {
            ids.sort();
        }

        store.compute_positions();
        store.compute_adjacency();
        Ok(store)
    }

    fn compute_positions(&mut self) {
        for id in self.verses.keys() {
            self.positions.insert(NodeId::Verse(*id), Position::verse(*id));
        }
        for note in self.notes.values() {
            self.positions
                .insert(NodeId::Note(note.id.clone()), Position::note(note.range.start, &note.id));
        }
        // Theme anchors derive from their links
        let mut anchors: HashMap<ThemeId, VerseId> = HashMap::new();
        for link in &self.theme_links {
            if let Some(pos) = self.positions.get(&link.node)
                && let Some(anchor) = pos.anchor
            {
                anchors
                    .entry(link.theme.clone())
                    .and_modify(|a| *a = (*a).min(anchor))
                    .or_insert(anchor);
            }
        }
        for theme in self.themes.values() {
            let anchor = anchors.get(&theme.id).copied();
            self.positions
                .insert(NodeId::Theme(theme.id.clone()), Position::theme(anchor, &theme.id));
        }
    }

    fn compute_adjacency(&mut self) {
        let mut adjacency: HashMap<NodeId, Vec<Step>> = HashMap::new();
        for edge in &self.cross_refs {
            adjacency.entry(edge.source.clone()).or_default().push(Step {
                label: StepLabel::CrossRef(edge.kind, Direction::Forward),
                to: edge.target.clone(),
            });
            adjacency.entry(edge.target.clone()).or_default().push(Step {
                label: StepLabel::CrossRef(edge.kind, Direction::Reverse),
                to: edge.source.clone(),
            });
        }
        for link in &self.theme_links {
            let theme_node = NodeId::Theme(link.theme.clone());
            adjacency
                .entry(theme_node.clone())
                .or_default()
                .push(Step { label: StepLabel::ThemeLink, to: link.node.clone() });
            adjacency
                .entry(link.node.clone())
                .or_default()
                .push(Step { label: StepLabel::ThemeLink, to: theme_node });
        }

        // Fixed visitation order: label, then target canonical position
        for steps in adjacency.values_mut() {
            steps.sort_by(|a, b| {
                a.label
                    .cmp(&b.label)
                    .then_with(|| self.position(&a.to).cmp(&self.position(&b.to)))
            });
        }
        self.adjacency = adjacency;
    }

    /// Canonical position of a node. Every node in the store has one.
    pub fn position(&self, node: &NodeId) -> &Position {
        static UNANCHORED: std::sync::OnceLock<Position> = std::sync::OnceLock::new();
        self.positions.get(node).unwrap_or_else(|| {
            UNANCHORED.get_or_init(|| Position { anchor: None, class: 3, tiebreak: String::new() })
        })
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        match node {
            NodeId::Verse(v) => self.verses.contains_key(v),
            NodeId::Note(n) => self.notes.contains_key(n),
            NodeId::Theme(t) => self.themes.contains_key(t),
        }
    }

    pub fn get_verse(&self, id: VerseId) -> Option<&Verse> {
        self.verses.get(&id)
    }

    pub fn get_note(&self, id: &NoteId) -> Option<&Note> {
        self.notes.get(id)
    }

    pub fn get_theme(&self, id: &ThemeId) -> Option<&Theme> {
        self.themes.get(id)
    }

    /// Verses inside a range, in canonical order.
    pub fn verses_in_range(&self, range: &VerseRange) -> impl Iterator<Item = &Verse> {
        self.verses.range(range.start..=range.end).map(|(_, v)| v)
    }

    /// Notes whose range overlaps the given range, in canonical order.
    ///
    /// Range scan from the start of the book catches notes that begin
    /// before the queried range but extend into it.
    pub fn notes_in_range(&self, range: &VerseRange) -> Vec<&Note> {
        let book_start = VerseId::new(range.start.book, 0, 0);
        let mut out: Vec<&Note> = self
            .notes_by_start
            .range(book_start..=range.end)
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| self.notes.get(id))
            .filter(|note| note.range.overlaps(range))
            .collect();
        out.sort_by(|a, b| (a.range.start, a.id.as_str()).cmp(&(b.range.start, b.id.as_str())));
        out
    }

    /// Sorted traversal steps out of a node.
    pub fn steps(&self, node: &NodeId) -> &[Step] {
        self.adjacency.get(node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Nodes linked to a theme, in canonical order.
    pub fn theme_members(&self, theme: &ThemeId) -> Vec<&NodeId> {
        let mut members: Vec<&NodeId> = self
            .theme_links
            .iter()
            .filter(|l| &l.theme == theme)
            .map(|l| &l.node)
            .collect();
        members.sort_by(|a, b| self.position(a).cmp(self.position(b)));
        members
    }

    pub fn all_verses(&self) -> impl Iterator<Item = &Verse> {
        self.verses.values()
    }

    pub fn all_notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn all_themes(&self) -> impl Iterator<Item = &Theme> {
        self.themes.values()
    }

    pub fn all_cross_refs(&self) -> &[CrossRef] {
        &self.cross_refs
    }

    pub fn all_theme_links(&self) -> &[ThemeLink] {
        &self.theme_links
    }

    /// Checksum over the full node/edge content, stored in snapshot bundles
    /// so a load can verify integrity without re-parsing.
    pub fn checksum(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for verse in self.verses.values() {
            hasher.update(verse.id.compact().as_bytes());
            hasher.update(verse.text.as_bytes());
        }
        let mut note_ids: Vec<_> = self.notes.keys().collect();
        note_ids.sort();
        for id in note_ids {
            let note = &self.notes[id];
            hasher.update(id.as_str().as_bytes());
            hasher.update(note.range.compact().as_bytes());
            hasher.update(note.text.as_bytes());
        }
        let mut theme_ids: Vec<_> = self.themes.keys().collect();
        theme_ids.sort();
        for id in theme_ids {
            let theme = &self.themes[id];
            hasher.update(id.as_str().as_bytes());
            hasher.update(theme.label.as_bytes());
        }
        for edge in &self.cross_refs {
            hasher.update(edge.source.to_key().as_bytes());
            hasher.update(edge.target.to_key().as_bytes());
            hasher.update(edge.kind.as_str().as_bytes());
        }
        for link in &self.theme_links {
            hasher.update(link.theme.as_str().as_bytes());
            hasher.update(link.node.to_key().as_bytes());
        }
        hasher.finalize()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            verses: self.verses.len(),
            notes: self.notes.len(),
            themes: self.themes.len(),
            cross_refs: self.cross_refs.len(),
            theme_links: self.theme_links.len(),
        }
    }
}

fn endpoint_exists(node: &NodeId, corpus: &ParsedCorpus) -> bool {
    match node {
        NodeId::Verse(v) => corpus.verses.contains_key(v),
        NodeId::Note(n) => corpus.notes.contains_key(n),
        NodeId::Theme(t) => corpus.themes.contains_key(t),
    }
}

/// Statistics about a built graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub verses: usize,
    pub notes: usize,
    pub themes: usize,
    pub cross_refs: usize,
    pub theme_links: usize,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Corpus Graph Statistics:")?;
        writeln!(f, "  Verses: {}", self.verses)?;
        writeln!(f, "  Notes: {}", self.notes)?;
        writeln!(f, "  Themes: {}", self.themes)?;
        writeln!(
            f,
            "  Edges: {} cross-reference(s), {} theme link(s)",
            self.cross_refs, self.theme_links
        )
    }
}
