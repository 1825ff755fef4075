//! Node types - the three record kinds held by the graph store
//!
//! - `Verse`: canonical scripture text, identified by (book, chapter, verse)
//! - `Note`: study commentary attached to a verse range
//! - `Theme`: a label relating notes and verses across the corpus
//!
//! All three are immutable once ingested. `NodeId` is the tagged identity
//! that edges and traversal results are keyed on.

use crate::reference::{VerseId, VerseRange};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a note: a stable lowercase slug declared in the markup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a theme, derived from its label by normalization so that
/// `"Abrahamic Covenant"` and `"abrahamic covenant"` are the same theme.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThemeId(String);

impl ThemeId {
    /// Build a theme identity from a display label.
    pub fn from_label(label: &str) -> Self {
        Self(normalize_label(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Case-fold and strip diacritics from a theme label, collapsing runs of
/// non-alphanumeric characters to single hyphens.
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;
    for c in label.chars() {
        let f = fold_char(c).unwrap_or(c);
        if f.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.extend(f.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Fold common Latin diacritics to their base letters.
pub(crate) fn fold_char(c: char) -> Option<char> {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => Some('a'),
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => Some('e'),
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => Some('i'),
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => Some('o'),
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => Some('u'),
        'ç' | 'Ç' => Some('c'),
        'ñ' | 'Ñ' => Some('n'),
        _ => None,
    }
}

/// Tagged node identity - the key space shared by all edges and indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum NodeId {
    Verse(VerseId),
    Note(NoteId),
    Theme(ThemeId),
}

impl NodeId {
    pub fn kind_str(&self) -> &'static str {
        match self {
            NodeId::Verse(_) => "verse",
            NodeId::Note(_) => "note",
            NodeId::Theme(_) => "theme",
        }
    }

    /// Stable textual form: `verse:GEN.15.6`, `note:abraham-covenant`,
    /// `theme:abrahamic-covenant`.
    pub fn to_key(&self) -> String {
        match self {
            NodeId::Verse(v) => format!("verse:{}", v.compact()),
            NodeId::Note(n) => format!("note:{}", n),
            NodeId::Theme(t) => format!("theme:{}", t),
        }
    }

    /// Parse the textual form produced by `to_key`. A bare verse reference
    /// is also accepted as a convenience.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("verse", rest)) => Ok(NodeId::Verse(VerseId::parse(rest)?)),
            Some(("note", rest)) => Ok(NodeId::Note(NoteId::new(rest))),
            Some(("theme", rest)) => Ok(NodeId::Theme(ThemeId::from_label(rest))),
            _ => Ok(NodeId::Verse(VerseId::parse(s)?)),
        }
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

/// A single verse of canonical text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verse {
    pub id: VerseId,
    pub text: String,
}

impl Verse {
    pub fn new(id: VerseId, text: impl Into<String>) -> Self {
        Self { id, text: text.into() }
    }

    /// Content hash used for duplicate-identity detection: re-ingesting an
    /// identical verse is an update, differing text is a validation failure.
    pub fn content_hash(&self) -> blake3::Hash {
        blake3::hash(self.text.trim().as_bytes())
    }
}

/// A study note attached to a verse range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub range: VerseRange,
    pub text: String,
    /// Author or edition tag, e.g. "Scofield 1917"
    pub edition: Option<String>,
}

impl Note {
    pub fn new(id: NoteId, range: VerseRange, text: impl Into<String>) -> Self {
        Self { id, range, text: text.into(), edition: None }
    }

    pub fn with_edition(mut self, edition: impl Into<String>) -> Self {
        self.edition = Some(edition.into());
        self
    }
}

/// A thematic label relating notes and verses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub id: ThemeId,
    /// Original display label as first declared
    pub label: String,
    pub description: Option<String>,
}

impl Theme {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self { id: ThemeId::from_label(&label), label, description: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
