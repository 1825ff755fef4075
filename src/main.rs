//! Versegraph CLI - build, validate, query and serve corpus snapshots

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use versegraph::api::{dispatch, QueryRequest};
use versegraph::config::{self, VersegraphConfig};
use versegraph::node::ThemeId;
use versegraph::pipeline::Pipeline;
use versegraph::query::{CancelToken, TraceSeed};
use versegraph::snapshot::{Snapshot, SnapshotManager};
use versegraph::storage::SnapshotBundle;
use versegraph::ui;

#[derive(Parser)]
#[command(name = "versegraph")]
#[command(version = "0.1.0")]
#[command(about = "Thematic cross-reference graph engine for structured text corpora")]
#[command(long_about = r#"
Versegraph ingests block-markup corpus files into a validated graph of
verses, study notes and themes, then answers reference lookups, keyword
searches and theme-chain traces against immutable snapshots.

Example usage:
  versegraph build --input ./corpus --snapshot corpus.vgsnap
  versegraph lookup --snapshot corpus.vgsnap "Genesis 15:6"
  versegraph trace --snapshot corpus.vgsnap "Abrahamic Covenant" --depth 2
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to versegraph.toml (defaults to ./versegraph.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Parse, validate and index a corpus directory into a snapshot bundle
    Build {
        /// Corpus input directory
        #[arg(short, long)]
        input: PathBuf,

        /// Snapshot bundle to write
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Validate a corpus directory without writing anything
    Validate {
        /// Corpus input directory
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Resolve a verse reference or range to its verses and notes
    Lookup {
        /// Reference, e.g. "GEN.15.6", "Genesis 15:1-6"
        reference: String,

        /// Snapshot bundle to query
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Keyword search over note text
    Search {
        /// Keywords
        keywords: Vec<String>,

        /// Snapshot bundle to query
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Maximum number of hits
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Trace a theme (or start node) outward across the graph
    Trace {
        /// Theme label, verse reference, or node key
        seed: String,

        /// Snapshot bundle to query
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Maximum hops from the seeds
        #[arg(short, long, default_value = "2")]
        depth: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List themes sharing member nodes with a theme
    Related {
        /// Theme label
        theme: String,

        /// Snapshot bundle to query
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show statistics for a snapshot bundle
    Stats {
        /// Snapshot bundle to inspect
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Serve a snapshot over HTTP
    Serve {
        /// Snapshot bundle to serve
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Port to listen on
        #[arg(short, long, default_value = "7878")]
        port: u16,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let cfg = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            let starter = VersegraphConfig {
                snapshot: Some(
                    config::default_snapshot_path_in(std::path::Path::new("."))
                        .display()
                        .to_string(),
                ),
                ..Default::default()
            };
            config::write_config(&path, &starter, force)?;
            ui::success(&format!("wrote {}", path.display()));
        }

        Commands::Build { input, snapshot } => {
            let snapshot_path = resolve_snapshot(snapshot, &cfg)?;
            ui::header(&format!("Building corpus from {}", input.display()));

            let started = Instant::now();
            let pipeline = make_pipeline(&cfg);
            let files = pipeline.discover(&input)?.len();
            let (manager, tx) = ui::ProgressManager::new(files);
            let pipeline = pipeline.with_progress(tx.clone());

            match pipeline.build(&input) {
                Ok((graph, index, report)) => {
                    tx.send(ui::ProgressMessage::Exit).ok();
                    manager.clear();
                    report_items(&report.warnings, true);
                    report_items(&report.errors, false);

                    let stats = graph.stats();
                    let snapshot_manager = SnapshotManager::new();
                    let version = snapshot_manager.publish(graph, index);
                    let published = snapshot_manager
                        .acquire()
                        .ok_or_else(|| anyhow::anyhow!("snapshot publish failed"))?;

                    config::ensure_snapshot_dir(&snapshot_path)?;
                    let mut bundle = SnapshotBundle::open(&snapshot_path)?;
                    bundle.save(&published)?;

                    manager.finish_with_summary(
                        started.elapsed(),
                        report.files,
                        stats.verses,
                        stats.cross_refs + stats.theme_links,
                    );
                    ui::info("snapshot", &format!("{} (v{})", snapshot_path.display(), version));
                    if !report.is_clean() {
                        ui::warn(&format!(
                            "built with {} recoverable parse error(s)",
                            report.errors.len()
                        ));
                    }
                }
                Err(e) => {
                    tx.send(ui::ProgressMessage::Exit).ok();
                    manager.clear();
                    report_failure(&e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Validate { input } => {
            ui::header(&format!("Validating corpus at {}", input.display()));
            let pipeline = make_pipeline(&cfg);
            match pipeline.validate(&input) {
                Ok(report) => {
                    report_items(&report.warnings, true);
                    report_items(&report.errors, false);
                    if report.is_clean() {
                        ui::success(&format!(
                            "{} file(s), {} block(s), no errors",
                            report.files, report.blocks
                        ));
                    } else {
                        ui::error(&format!(
                            "{} parse error(s) across {} file(s)",
                            report.errors.len(),
                            report.files
                        ));
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    report_failure(&e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Lookup { reference, snapshot, format } => {
            let loaded = load_snapshot(snapshot, &cfg)?;
            if format == "json" {
                let request = QueryRequest::Lookup { reference: reference.clone() };
                let response = dispatch(&loaded.engine(), &request, &CancelToken::new());
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                match loaded.engine().lookup(&reference) {
                    Ok(result) => {
                        for verse in &result.verses {
                            println!("{}  {}", verse.id, verse.text);
                        }
                        if !result.notes.is_empty() {
                            ui::section("Notes");
                            for note in &result.notes {
                                let edition = note
                                    .edition
                                    .as_deref()
                                    .map(|e| format!(" [{}]", e))
                                    .unwrap_or_default();
                                println!("{} ({}){}", note.id, note.range.compact(), edition);
                                println!("  {}", note.text);
                            }
                        }
                    }
                    Err(e) => {
                        ui::error(&e.to_string());
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Search { keywords, snapshot, limit, format } => {
            let loaded = load_snapshot(snapshot, &cfg)?;
            if format == "json" {
                let request =
                    QueryRequest::Search { keywords: keywords.clone(), limit: Some(limit) };
                let response = dispatch(&loaded.engine(), &request, &CancelToken::new());
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                let mut hits = loaded.engine().search(&keywords);
                hits.truncate(limit);
                if hits.is_empty() {
                    println!("No notes matched.");
                } else {
                    for hit in hits {
                        let note = loaded.graph().get_note(&hit.note);
                        match note {
                            Some(note) => println!(
                                "{:.3}  {} ({})",
                                hit.score,
                                note.id,
                                note.range.compact()
                            ),
                            None => println!("{:.3}  {}", hit.score, hit.note),
                        }
                    }
                }
            }
        }

        Commands::Trace { seed, snapshot, depth, format } => {
            let loaded = load_snapshot(snapshot, &cfg)?;
            let engine = loaded.engine();
            if format == "json" {
                let request =
                    QueryRequest::TraceTheme { seed: seed.clone(), max_depth: Some(depth) };
                let response = dispatch(&engine, &request, &CancelToken::new());
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                let parsed_seed = TraceSeed::parse(&seed);
                match engine.trace(&parsed_seed, depth, &CancelToken::new()) {
                    Ok(chain) => {
                        ui::header(&format!("Trace: {} (depth {})", seed, depth));
                        for entry in &chain.entries {
                            let hops = "  ".repeat(entry.depth);
                            println!("{}{} (depth {})", hops, entry.node, entry.depth);
                        }
                        ui::summary_row("nodes", &chain.entries.len().to_string());
                    }
                    Err(e) => {
                        ui::error(&e.to_string());
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Related { theme, snapshot, format } => {
            let loaded = load_snapshot(snapshot, &cfg)?;
            let engine = loaded.engine();
            if format == "json" {
                let request = QueryRequest::RelatedThemes { theme: theme.clone() };
                let response = dispatch(&engine, &request, &CancelToken::new());
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                match engine.related_themes(&ThemeId::from_label(&theme)) {
                    Ok(relations) => {
                        if relations.is_empty() {
                            println!("No related themes.");
                        } else {
                            for relation in relations {
                                println!("{}  ({} shared)", relation.label, relation.shared);
                            }
                        }
                    }
                    Err(e) => {
                        ui::error(&e.to_string());
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Stats { snapshot } => {
            let loaded = load_snapshot(snapshot, &cfg)?;
            let stats = loaded.graph().stats();
            let mut table = ui::TableBuilder::new();
            table.add_row("Snapshot version", &loaded.version().to_string());
            table.add_row("Verses", &stats.verses.to_string());
            table.add_row("Notes", &stats.notes.to_string());
            table.add_row("Themes", &stats.themes.to_string());
            table.add_row("Cross-references", &stats.cross_refs.to_string());
            table.add_row("Theme links", &stats.theme_links.to_string());
            println!("{}", table.build());
        }

        Commands::Serve { snapshot, port } => {
            let snapshot_path = resolve_snapshot(snapshot, &cfg)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(versegraph::server::start_server(
                port,
                &snapshot_path,
                cfg.max_trace_depth,
            ))?;
        }
    }

    Ok(())
}

fn make_pipeline(cfg: &VersegraphConfig) -> Pipeline {
    let mut pipeline = Pipeline::new().with_limits(
        cfg.max_error_ratio.unwrap_or(0.2),
        cfg.min_fatal_errors.unwrap_or(10),
    );
    if let Some(workers) = cfg.workers {
        pipeline = pipeline.with_workers(workers);
    }
    pipeline
}

fn resolve_snapshot(
    flag: Option<PathBuf>,
    cfg: &VersegraphConfig,
) -> anyhow::Result<PathBuf> {
    flag.or_else(|| cfg.snapshot.as_ref().map(PathBuf::from))
        .ok_or_else(|| anyhow::anyhow!("no snapshot path; pass --snapshot or set it in versegraph.toml"))
}

fn load_snapshot(flag: Option<PathBuf>, cfg: &VersegraphConfig) -> anyhow::Result<Snapshot> {
    let path = resolve_snapshot(flag, cfg)?;
    let bundle = SnapshotBundle::open(&path)?;
    let mut snapshot = bundle.load()?;
    if let Some(max) = cfg.max_trace_depth {
        snapshot = snapshot.with_max_trace_depth(max);
    }
    Ok(snapshot)
}

fn report_items(items: &[versegraph::pipeline::SourceError], warning: bool) {
    for item in items {
        if warning {
            ui::warn(&item.to_string());
        } else {
            ui::error(&item.to_string());
        }
    }
}

fn report_failure(e: &versegraph::Error) {
    match e {
        versegraph::Error::ParseFatal(report) => {
            for err in &report.errors {
                ui::error(&err.to_string());
            }
            ui::error(&format!("aborted: {}", report));
        }
        versegraph::Error::Validation(v) => {
            for failure in &v.failures {
                ui::error(&failure.to_string());
            }
            ui::error(&v.to_string());
        }
        other => ui::error(&other.to_string()),
    }
}
