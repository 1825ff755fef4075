//! Canonical parser - turns block markup into unvalidated record sets
//!
//! Input is UTF-8 text made of blocks separated by blank lines. The first
//! line of a block is a header:
//!
//! ```text
//! @verse GEN.1.1
//! In the beginning God created the heaven and the earth.
//!
//! @note abraham-covenant GEN.15.1-6 | Scofield 1917
//! The covenant is here confirmed and enlarged.
//! @ref fulfillment ROM.4.3
//! @ref explanatory note:justification-by-faith
//! @theme Abrahamic Covenant
//!
//! @theme Abrahamic Covenant
//! The unconditional covenant made with Abram.
//! ```
//!
//! Inside `@verse` and `@note` blocks, lines starting with `@ref` declare
//! cross-reference tags and lines starting with `@theme` declare theme
//! links; every other line accumulates as text. A top-level `@theme` block
//! declares a theme with an optional description body.
//!
//! Lines whose first non-blank character is `#` are comments and are
//! dropped before block assembly, between and inside blocks alike; body
//! text cannot begin with `#`.
//!
//! Malformed blocks are collected into a [`ParseReport`] and parsing
//! continues; only excessive error density aborts the pass.

use crate::edge::{EdgeDescriptor, RelationKind};
use crate::node::{NodeId, Note, NoteId, Theme, ThemeId, Verse};
use crate::reference::{VerseId, VerseRange};
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

fn note_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@note\s+([a-z0-9][a-z0-9_-]*)\s+(\S+)(?:\s*\|\s*(.+))?$")
            .expect("note header regex")
    })
}

/// A single malformed block or line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// Accumulated outcome of a parse pass. Errors are recoverable per block;
/// the pass itself fails only when `is_fatal` reports excessive density.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseReport {
    pub errors: Vec<ParseError>,
    pub warnings: Vec<ParseError>,
    /// Total number of blocks seen, good or bad
    pub blocks: usize,
}

impl ParseReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ParseReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.blocks += other.blocks;
    }
}

impl fmt::Display for ParseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s), {} warning(s) across {} block(s)",
            self.errors.len(),
            self.warnings.len(),
            self.blocks
        )
    }
}

/// Parser output: record maps plus raw edge descriptors, not yet validated
/// against each other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedCorpus {
    pub verses: BTreeMap<VerseId, Verse>,
    pub notes: BTreeMap<NoteId, Note>,
    pub themes: BTreeMap<ThemeId, Theme>,
    pub edges: Vec<EdgeDescriptor>,
    /// (theme, node, source line) associations awaiting validation
    pub theme_links: Vec<(ThemeId, NodeId, usize)>,
    /// Verse identities ingested more than once with differing text;
    /// surfaced as DuplicateIdentity at graph build
    pub conflicting_verses: Vec<VerseId>,
}

impl ParsedCorpus {
    /// Insert a verse. Identical re-ingestion is an update; differing text
    /// for the same identity is recorded as a conflict.
    pub fn insert_verse(&mut self, verse: Verse) {
        if let Some(existing) = self.verses.get(&verse.id) {
            if existing.content_hash() != verse.content_hash() {
                self.conflicting_verses.push(verse.id);
            }
        }
        self.verses.insert(verse.id, verse);
    }

    /// Register a theme, keeping the first description seen.
    pub fn insert_theme(&mut self, theme: Theme) {
        self.themes
            .entry(theme.id.clone())
            .and_modify(|existing| {
                if existing.description.is_none() {
                    existing.description = theme.description.clone();
                }
            })
            .or_insert(theme);
    }

    /// Merge another corpus fragment into this one (used by the parallel
    /// build pipeline's sequential merge step).
    pub fn merge(&mut self, other: ParsedCorpus) {
        for verse in other.verses.into_values() {
            self.insert_verse(verse);
        }
        self.notes.extend(other.notes);
        for theme in other.themes.into_values() {
            self.insert_theme(theme);
        }
        self.edges.extend(other.edges);
        self.theme_links.extend(other.theme_links);
        self.conflicting_verses.extend(other.conflicting_verses);
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty() && self.notes.is_empty() && self.themes.is_empty()
    }
}

/// Block markup parser with configurable error-density limits.
pub struct Parser {
    /// Fraction of bad blocks above which the pass aborts
    max_error_ratio: f64,
    /// Density is only enforced once at least this many errors accumulated
    min_fatal_errors: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self { max_error_ratio: 0.2, min_fatal_errors: 10 }
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_error_ratio: f64, min_fatal_errors: usize) -> Self {
        Self { max_error_ratio, min_fatal_errors }
    }

    /// Parse one input into a corpus fragment and a report.
    ///
    /// Returns `Err(Error::ParseFatal)` only when the error density limit
    /// is exceeded; individual bad blocks are collected, not fatal.
    pub fn parse(&self, input: &str) -> Result<(ParsedCorpus, ParseReport)> {
        let mut corpus = ParsedCorpus::default();
        let mut report = ParseReport::default();

        for block in blocks(input) {
            report.blocks += 1;
            if let Err(e) = self.parse_block(&block, &mut corpus, &mut report) {
                report.errors.push(e);
            }
        }

        if report.errors.len() >= self.min_fatal_errors
            && (report.errors.len() as f64) > self.max_error_ratio * report.blocks as f64
        {
            return Err(Error::ParseFatal(report));
        }

        Ok((corpus, report))
    }

    fn parse_block(
        &self,
        block: &Block,
        corpus: &mut ParsedCorpus,
        report: &mut ParseReport,
    ) -> std::result::Result<(), ParseError> {
        let header = &block.lines[0];
        let header_line = block.first_line;

        if let Some(rest) = header.strip_prefix("@verse") {
            let id = VerseId::parse(rest.trim())
                .map_err(|e| ParseError { line: header_line, reason: e.to_string() })?;
            if id.chapter == 0 || id.verse == 0 || id.chapter > id.book.chapters() {
                report.warnings.push(ParseError {
                    line: header_line,
                    reason: format!("{} is outside the expected chapter range", id),
                });
            }
            let source = NodeId::Verse(id);
            let body = self.parse_body(block, &source, corpus, report)?;
            if body.is_empty() {
                return Err(ParseError {
                    line: header_line,
                    reason: format!("verse {} has no text", id),
                });
            }
            corpus.insert_verse(Verse::new(id, body));
            Ok(())
        } else if header.starts_with("@note") {
            let caps = note_header_re().captures(header).ok_or_else(|| ParseError {
                line: header_line,
                reason: "malformed @note header, expected '@note <slug> <range> [| edition]'"
                    .to_string(),
            })?;
            let id = NoteId::new(&caps[1]);
            let range = VerseRange::parse(&caps[2])
                .map_err(|e| ParseError { line: header_line, reason: e.to_string() })?;
            let source = NodeId::Note(id.clone());
            let body = self.parse_body(block, &source, corpus, report)?;
            if body.is_empty() {
                return Err(ParseError {
                    line: header_line,
                    reason: format!("note {} has no text", id),
                });
            }
            let mut note = Note::new(id, range, body);
            if let Some(edition) = caps.get(3) {
                note = note.with_edition(edition.as_str().trim());
            }
            corpus.notes.insert(note.id.clone(), note);
            Ok(())
        } else if let Some(rest) = header.strip_prefix("@theme") {
            let label = rest.trim();
            if label.is_empty() {
                return Err(ParseError {
                    line: header_line,
                    reason: "@theme block requires a label".to_string(),
                });
            }
            let mut theme = Theme::new(label);
            let description = block.lines[1..].join("\n");
            if !description.trim().is_empty() {
                theme = theme.with_description(description.trim());
            }
            corpus.insert_theme(theme);
            Ok(())
        } else {
            Err(ParseError {
                line: header_line,
                reason: format!("unknown block header: {}", truncate(header, 40)),
            })
        }
    }

    /// Consume the body of a verse/note block: tag lines become edge or
    /// theme-link descriptors, everything else accumulates as text.
    fn parse_body(
        &self,
        block: &Block,
        source: &NodeId,
        corpus: &mut ParsedCorpus,
        report: &mut ParseReport,
    ) -> std::result::Result<String, ParseError> {
        let mut text_lines = Vec::new();

        for (offset, line) in block.lines.iter().enumerate().skip(1) {
            let line_no = block.first_line + offset;
            if let Some(rest) = line.strip_prefix("@ref") {
                match parse_ref_tag(rest.trim()) {
                    Ok((kind, target)) => {
                        corpus
                            .edges
                            .push(EdgeDescriptor::new(source.clone(), target, kind, line_no));
                    }
                    Err(e) => {
                        // A bad tag spoils the tag, not the whole block
                        report.errors.push(ParseError { line: line_no, reason: e.to_string() });
                    }
                }
            } else if let Some(rest) = line.strip_prefix("@theme") {
                let label = rest.trim();
                if label.is_empty() {
                    report.errors.push(ParseError {
                        line: line_no,
                        reason: "@theme tag requires a label".to_string(),
                    });
                    continue;
                }
                let theme = Theme::new(label);
                let theme_id = theme.id.clone();
                // Tags register the theme so links never dangle on their own
                corpus.insert_theme(theme);
                corpus.theme_links.push((theme_id, source.clone(), line_no));
            } else {
                text_lines.push(line.as_str());
            }
        }

        Ok(text_lines.join("\n").trim().to_string())
    }
}

/// Parse `<kind> <target>` from a `@ref` tag.
fn parse_ref_tag(rest: &str) -> Result<(RelationKind, NodeId)> {
    let (kind_str, target_str) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| Error::InvalidReference(format!("@ref needs '<kind> <target>': {}", rest)))?;
    let kind: RelationKind = kind_str.parse()?;
    let target = NodeId::parse(target_str.trim())?;
    if matches!(target, NodeId::Theme(_)) {
        return Err(Error::InvalidReference(
            "cross-references cannot target a theme; use @theme".to_string(),
        ));
    }
    Ok((kind, target))
}

struct Block {
    /// 1-indexed line number of the header
    first_line: usize,
    lines: Vec<String>,
}

/// Split input into blank-line separated blocks, keeping line numbers.
fn blocks(input: &str) -> Vec<Block> {
    let mut out = Vec::new();
    let mut current: Option<Block> = None;

    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim_end();
        if line.trim().is_empty() {
            if let Some(block) = current.take() {
                out.push(block);
            }
            continue;
        }
        // Comment lines are allowed between and inside blocks
        if line.trim_start().starts_with('#') {
            continue;
        }
        match &mut current {
            Some(block) => block.lines.push(line.to_string()),
            None => {
                current = Some(Block { first_line: idx + 1, lines: vec![line.to_string()] });
            }
        }
    }
    if let Some(block) = current.take() {
        out.push(block);
    }
    out
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
