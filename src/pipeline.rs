//! Corpus build pipeline
//!
//! Walks an input directory for markup files, parses them on a worker
//! pool, merges the per-file fragments sequentially in path order (so the
//! merged corpus is independent of worker scheduling), then validates and
//! indexes. Per-file parse errors are collected with their file attached;
//! only excessive overall error density aborts a build.

use crate::graph::GraphStore;
use crate::index::SearchIndex;
use crate::parser::{ParseError, ParsedCorpus, Parser, ParseReport};
use crate::ui::{ProgressMessage, ProgressPhase};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions recognized as corpus markup.
const MARKUP_EXTENSIONS: &[&str] = &["vg", "txt"];

/// A parse error with the file it came from.
#[derive(Debug, Clone)]
pub struct SourceError {
    pub file: PathBuf,
    pub error: ParseError,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.error)
    }
}

/// Itemized outcome of an ingest pass.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub files: usize,
    pub blocks: usize,
    pub errors: Vec<SourceError>,
    pub warnings: Vec<SourceError>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Directory-to-snapshot build pipeline.
pub struct Pipeline {
    max_error_ratio: f64,
    min_fatal_errors: usize,
    workers: usize,
    progress: Option<crossbeam::channel::Sender<ProgressMessage>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            max_error_ratio: 0.2,
            min_fatal_errors: 10,
            workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            progress: None,
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, max_error_ratio: f64, min_fatal_errors: usize) -> Self {
        self.max_error_ratio = max_error_ratio;
        self.min_fatal_errors = min_fatal_errors;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_progress(
        mut self,
        sender: crossbeam::channel::Sender<ProgressMessage>,
    ) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Markup files under a directory, in path order.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| MARKUP_EXTENSIONS.contains(&ext))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Parse every markup file under `dir` and merge into one corpus.
    ///
    /// Parsing runs on the worker pool; merging is sequential in path
    /// order, so the result does not depend on scheduling.
    pub fn ingest(&self, dir: &Path) -> Result<(ParsedCorpus, BuildReport)> {
        let files = self.discover(dir)?;
        let parser = || Parser::with_limits(f64::INFINITY, usize::MAX);

        type FileOutcome = (PathBuf, Result<(ParsedCorpus, ParseReport)>);
        let (path_tx, path_rx) = crossbeam::channel::unbounded::<PathBuf>();
        let (out_tx, out_rx) = crossbeam::channel::unbounded::<FileOutcome>();
        for file in &files {
            path_tx
                .send(file.clone())
                .map_err(|_| Error::Bundle("pipeline channel closed".into()))?;
        }
        drop(path_tx);

        std::thread::scope(|scope| {
            for _ in 0..self.workers {
                let path_rx = path_rx.clone();
                let out_tx = out_tx.clone();
                let progress = self.progress.clone();
                let parser = parser();
                scope.spawn(move || {
                    for path in path_rx {
                        let outcome = std::fs::read_to_string(&path)
                            .map_err(Error::Io)
                            .and_then(|text| parser.parse(&text));
                        if let Some(ref tx) = progress {
                            tx.send(ProgressMessage::Progress {
                                phase: ProgressPhase::Parsing,
                                current: 0,
                                file: Some(path.display().to_string()),
                            })
                            .ok();
                        }
                        out_tx.send((path, outcome)).ok();
                    }
                });
            }
            drop(out_tx);
        });

        let mut outcomes: BTreeMap<PathBuf, Result<(ParsedCorpus, ParseReport)>> = BTreeMap::new();
        for (path, outcome) in out_rx {
            outcomes.insert(path, outcome);
        }

        let mut corpus = ParsedCorpus::default();
        let mut report = BuildReport { files: files.len(), ..Default::default() };
        for (path, outcome) in outcomes {
            match outcome {
                Ok((fragment, parse_report)) => {
                    report.blocks += parse_report.blocks;
                    for error in parse_report.errors {
                        report.errors.push(SourceError { file: path.clone(), error });
                    }
                    for warning in parse_report.warnings {
                        report.warnings.push(SourceError { file: path.clone(), error: warning });
                    }
                    corpus.merge(fragment);
                }
                Err(e) => {
                    // Unreadable file: itemized like a block error at line 0
                    report.errors.push(SourceError {
                        file: path,
                        error: ParseError { line: 0, reason: e.to_string() },
                    });
                }
            }
        }

        // Density limit applies corpus-wide, not per file
        if report.errors.len() >= self.min_fatal_errors
            && (report.errors.len() as f64) > self.max_error_ratio * report.blocks as f64
        {
            let mut fatal = ParseReport { blocks: report.blocks, ..Default::default() };
            fatal.errors = report.errors.iter().map(|e| e.error.clone()).collect();
            return Err(Error::ParseFatal(fatal));
        }

        self.notify(ProgressMessage::Finished { phase: ProgressPhase::Parsing });
        Ok((corpus, report))
    }

    /// Full build: ingest, validate, index.
    pub fn build(&self, dir: &Path) -> Result<(GraphStore, SearchIndex, BuildReport)> {
        let (corpus, report) = self.ingest(dir)?;

        self.notify(ProgressMessage::Started { phase: ProgressPhase::Validating, total: 0 });
        let graph = GraphStore::build(corpus)?;
        self.notify(ProgressMessage::Finished { phase: ProgressPhase::Validating });

        self.notify(ProgressMessage::Started { phase: ProgressPhase::Indexing, total: 0 });
        let index = SearchIndex::build(&graph)?;
        self.notify(ProgressMessage::Finished { phase: ProgressPhase::Indexing });

        Ok((graph, index, report))
    }

    /// Validation-only pass: same checks as a build, nothing retained.
    ///
    /// Parse errors come back itemized in the report; dangling references
    /// and duplicate identities surface as a `Validation` error.
    pub fn validate(&self, dir: &Path) -> Result<BuildReport> {
        let (corpus, report) = self.ingest(dir)?;
        GraphStore::build(corpus)?;
        Ok(report)
    }

    fn notify(&self, msg: ProgressMessage) {
        if let Some(ref tx) = self.progress {
            tx.send(msg).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_build_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "genesis.vg",
            "@verse GEN.15.6\nAnd he believed in the LORD.\n",
        );
        write_file(
            dir.path(),
            "notes.vg",
            "@note covenant GEN.15.6\nThe covenant confirmed.\n@theme Abrahamic Covenant\n",
        );
        write_file(dir.path(), "README.md", "not corpus markup\n");

        let (graph, index, report) = Pipeline::new().build(dir.path()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.files, 2);
        assert_eq!(graph.stats().verses, 1);
        assert_eq!(graph.stats().notes, 1);
        assert!(index.token_count() > 0);
    }

    #[test]
    fn test_cross_file_conflict_detected() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.vg", "@verse GEN.1.1\nIn the beginning.\n");
        write_file(dir.path(), "b.vg", "@verse GEN.1.1\nDiffering text.\n");

        let err = Pipeline::new().build(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_parse_errors_are_itemized_with_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "good.vg", "@verse GEN.1.1\nIn the beginning.\n");
        write_file(dir.path(), "bad.vg", "@bogus header\ntext\n");

        let report = Pipeline::new().validate(dir.path()).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].file.ends_with("bad.vg"));
        assert_eq!(report.errors[0].error.line, 1);
    }

    #[test]
    fn test_density_limit_is_corpus_wide() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..12 {
            write_file(dir.path(), &format!("bad{}.vg", i), "@bogus header\ntext\n");
        }
        let err = Pipeline::new().build(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ParseFatal(_)));
    }

    #[test]
    fn test_build_deterministic_across_worker_counts() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "a.vg",
            "@verse GEN.15.6\nAnd he believed.\n\n@verse ROM.4.3\nAbraham believed God.\n@ref parallel GEN.15.6\n",
        );
        write_file(
            dir.path(),
            "b.vg",
            "@note covenant GEN.15.6\nOn the covenant of faith.\n@theme Abrahamic Covenant\n",
        );

        let (one, _, _) = Pipeline::new().with_workers(1).build(dir.path()).unwrap();
        let (four, _, _) = Pipeline::new().with_workers(4).build(dir.path()).unwrap();
        assert_eq!(one.checksum(), four.checksum());
    }

    #[test]
    fn test_empty_directory_builds_empty_graph() {
        let dir = tempfile::tempdir().unwrap();
        let (graph, _, report) = Pipeline::new().build(dir.path()).unwrap();
        assert_eq!(report.files, 0);
        assert_eq!(graph.stats().verses, 0);
    }
}
