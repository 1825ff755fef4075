//! SQLite snapshot bundle implementation

use super::schema;
use crate::edge::{EdgeDescriptor, RelationKind};
use crate::index::SearchIndex;
use crate::node::{NodeId, Note, NoteId, Theme, ThemeId, Verse};
use crate::parser::ParsedCorpus;
use crate::reference::{VerseId, VerseRange};
use crate::snapshot::Snapshot;
use crate::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Single-file SQLite bundle holding one published snapshot.
///
/// Only source records go to disk: verses, notes, themes, and the two edge
/// tables, plus a meta table with format version, snapshot version and a
/// content checksum. Adjacency and search indexes are derived structures
/// and are rebuilt on load, so a bundle can never carry an index that
/// disagrees with its records.
pub struct SnapshotBundle {
    conn: Connection,
}

impl SnapshotBundle {
    /// Open a bundle file (creates if it doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let bundle = Self { conn };
        bundle.initialize_schema()?;
        Ok(bundle)
    }

    /// Open an in-memory bundle (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let bundle = Self { conn };
        bundle.initialize_schema()?;
        Ok(bundle)
    }

    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// Persist a snapshot, replacing any previous contents atomically.
    pub fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        let graph = snapshot.graph();
        let checksum = graph.checksum().to_hex().to_string();

        let tx = self.conn.transaction()?;
        for table in ["theme_links", "cross_refs", "themes", "notes", "verses", "meta"] {
            tx.execute(&format!("DELETE FROM {}", table), [])?;
        }

        for verse in graph.all_verses() {
            tx.execute(
                "INSERT INTO verses (reference, text) VALUES (?1, ?2)",
                params![verse.id.compact(), verse.text],
            )?;
        }
        for note in graph.all_notes() {
            tx.execute(
                r#"
                INSERT INTO notes (slug, range_start, range_end, text, edition)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    note.id.as_str(),
                    note.range.start.compact(),
                    note.range.end.compact(),
                    note.text,
                    note.edition,
                ],
            )?;
        }
        for theme in graph.all_themes() {
            tx.execute(
                "INSERT INTO themes (slug, label, description) VALUES (?1, ?2, ?3)",
                params![theme.id.as_str(), theme.label, theme.description],
            )?;
        }
        for edge in graph.all_cross_refs() {
            tx.execute(
                "INSERT INTO cross_refs (source, target, kind) VALUES (?1, ?2, ?3)",
                params![edge.source.to_key(), edge.target.to_key(), edge.kind.as_str()],
            )?;
        }
        for link in graph.all_theme_links() {
            tx.execute(
                "INSERT INTO theme_links (theme, node) VALUES (?1, ?2)",
                params![link.theme.as_str(), link.node.to_key()],
            )?;
        }

        for (key, value) in [
            ("format_version", schema::FORMAT_VERSION.to_string()),
            ("snapshot_version", snapshot.version().to_string()),
            ("checksum", checksum),
        ] {
            tx.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Load the stored snapshot, rebuilding graph and indexes from records.
    ///
    /// Fails on a missing or incompatible format version, on records that
    /// no longer validate, and on a checksum mismatch.
    pub fn load(&self) -> Result<Snapshot> {
        let format: u32 = self
            .meta("format_version")?
            .ok_or_else(|| Error::Bundle("missing format_version; not a snapshot bundle".into()))?
            .parse()
            .map_err(|_| Error::Bundle("malformed format_version".into()))?;
        if format != schema::FORMAT_VERSION {
            return Err(Error::Bundle(format!(
                "unsupported bundle format {} (expected {})",
                format,
                schema::FORMAT_VERSION
            )));
        }
        let version: u64 = self
            .meta("snapshot_version")?
            .ok_or_else(|| Error::Bundle("missing snapshot_version".into()))?
            .parse()
            .map_err(|_| Error::Bundle("malformed snapshot_version".into()))?;
        let stored_checksum = self
            .meta("checksum")?
            .ok_or_else(|| Error::Bundle("missing checksum".into()))?;

        let mut corpus = ParsedCorpus::default();

        let mut stmt = self.conn.prepare("SELECT reference, text FROM verses")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        for (reference, text) in rows {
            corpus.insert_verse(Verse::new(VerseId::parse(&reference)?, text));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT slug, range_start, range_end, text, edition FROM notes")?;
        let rows: Vec<(String, String, String, String, Option<String>)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<rusqlite::Result<_>>()?;
        for (slug, start, end, text, edition) in rows {
            let range = VerseRange::new(VerseId::parse(&start)?, VerseId::parse(&end)?)?;
            let mut note = Note::new(NoteId::new(slug), range, text);
            if let Some(edition) = edition {
                note = note.with_edition(edition);
            }
            corpus.notes.insert(note.id.clone(), note);
        }

        let mut stmt = self.conn.prepare("SELECT slug, label, description FROM themes")?;
        let rows: Vec<(String, String, Option<String>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<_>>()?;
        for (slug, label, description) in rows {
            let mut theme = Theme::new(label);
            if theme.id.as_str() != slug {
                return Err(Error::Bundle(format!(
                    "theme slug {} does not match label normalization {}",
                    slug, theme.id
                )));
            }
            if let Some(description) = description {
                theme = theme.with_description(description);
            }
            corpus.insert_theme(theme);
        }

        let mut stmt = self.conn.prepare("SELECT source, target, kind FROM cross_refs")?;
        let rows: Vec<(String, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<_>>()?;
        for (source, target, kind) in rows {
            let kind: RelationKind = kind.parse()?;
            corpus.edges.push(EdgeDescriptor::new(
                NodeId::parse(&source)?,
                NodeId::parse(&target)?,
                kind,
                0,
            ));
        }

        let mut stmt = self.conn.prepare("SELECT theme, node FROM theme_links")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        for (theme, node) in rows {
            corpus
                .theme_links
                .push((ThemeId::from_label(&theme), NodeId::parse(&node)?, 0));
        }

        let graph = crate::graph::GraphStore::build(corpus)?;
        let checksum = graph.checksum().to_hex().to_string();
        if checksum != stored_checksum {
            return Err(Error::Bundle(format!(
                "checksum mismatch: bundle records hash to {} but meta says {}",
                checksum, stored_checksum
            )));
        }
        let index = SearchIndex::build(&graph)?;
        Ok(Snapshot::new(version, graph, index))
    }

    /// Snapshot version stored in the bundle, if any.
    pub fn stored_version(&self) -> Result<Option<u64>> {
        match self.meta("snapshot_version")? {
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| Error::Bundle("malformed snapshot_version".into())),
            None => Ok(None),
        }
    }

    fn meta(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::parser::Parser;

    const SAMPLE: &str = r#"
@verse GEN.15.6
And he believed in the LORD; and he counted it to him for righteousness.

@verse ROM.4.3
Abraham believed God.
@ref parallel GEN.15.6

@note abraham-covenant GEN.15.1-6 | Scofield 1917
The covenant here confirmed.
@theme Abrahamic Covenant
"#;

    fn sample_snapshot(version: u64) -> Snapshot {
        let (corpus, _) = Parser::new().parse(SAMPLE).unwrap();
        let graph = GraphStore::build(corpus).unwrap();
        let index = SearchIndex::build(&graph).unwrap();
        Snapshot::new(version, graph, index)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut bundle = SnapshotBundle::open_in_memory().unwrap();
        let snapshot = sample_snapshot(3);
        bundle.save(&snapshot).unwrap();

        let loaded = bundle.load().unwrap();
        assert_eq!(loaded.version(), 3);
        assert_eq!(loaded.graph().checksum(), snapshot.graph().checksum());

        let stats = loaded.graph().stats();
        assert_eq!(stats.verses, 2);
        assert_eq!(stats.notes, 1);
        assert_eq!(stats.themes, 1);
        assert_eq!(stats.cross_refs, 1);
        assert_eq!(stats.theme_links, 1);

        let note = loaded
            .graph()
            .get_note(&NoteId::new("abraham-covenant"))
            .unwrap();
        assert_eq!(note.edition.as_deref(), Some("Scofield 1917"));
    }

    #[test]
    fn test_loaded_snapshot_answers_queries() {
        let mut bundle = SnapshotBundle::open_in_memory().unwrap();
        bundle.save(&sample_snapshot(1)).unwrap();

        let loaded = bundle.load().unwrap();
        let result = loaded.engine().lookup("Genesis 15:6").unwrap();
        assert_eq!(result.notes.len(), 1);
        let hits = loaded.engine().search(&["covenant".to_string()]);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let mut bundle = SnapshotBundle::open_in_memory().unwrap();
        bundle.save(&sample_snapshot(1)).unwrap();

        let (corpus, _) = Parser::new()
            .parse("@verse JOH.3.16\nFor God so loved the world.\n")
            .unwrap();
        let graph = GraphStore::build(corpus).unwrap();
        let index = SearchIndex::build(&graph).unwrap();
        bundle.save(&Snapshot::new(2, graph, index)).unwrap();

        let loaded = bundle.load().unwrap();
        assert_eq!(loaded.version(), 2);
        assert_eq!(loaded.graph().stats().verses, 1);
        assert!(loaded.engine().lookup("GEN.15.6").is_err());
    }

    #[test]
    fn test_empty_bundle_fails_to_load() {
        let bundle = SnapshotBundle::open_in_memory().unwrap();
        assert!(matches!(bundle.load(), Err(Error::Bundle(_))));
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut bundle = SnapshotBundle::open_in_memory().unwrap();
        bundle.save(&sample_snapshot(1)).unwrap();
        bundle
            .conn
            .execute("UPDATE verses SET text = 'tampered' WHERE reference = 'GEN.15.6'", [])
            .unwrap();
        match bundle.load() {
            Err(Error::Bundle(msg)) => assert!(msg.contains("checksum")),
            other => panic!("expected checksum error, got {:?}", other.map(|s| s.version())),
        }
    }

    #[test]
    fn test_file_bundle_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.vgsnap");

        let mut bundle = SnapshotBundle::open(&path).unwrap();
        bundle.save(&sample_snapshot(5)).unwrap();
        drop(bundle);

        let bundle = SnapshotBundle::open(&path).unwrap();
        assert_eq!(bundle.stored_version().unwrap(), Some(5));
        assert_eq!(bundle.load().unwrap().version(), 5);
    }
}
