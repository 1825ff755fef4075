use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::snapshot::{Snapshot, SnapshotManager};
use crate::storage::SnapshotBundle;

pub mod routes;

/// Server state: the published snapshot, swappable without downtime.
pub struct AppState {
    pub manager: SnapshotManager,
    /// Per-request traversal deadline in milliseconds
    pub query_deadline_ms: u64,
}

pub async fn start_server(
    port: u16,
    snapshot_path: &Path,
    max_trace_depth: Option<usize>,
) -> anyhow::Result<()> {
    let snapshot = restore_snapshot(snapshot_path, max_trace_depth)?;
    let version = snapshot.version();

    let manager = SnapshotManager::new();
    manager.publish_restored(snapshot);
    let state = Arc::new(AppState { manager, query_deadline_ms: 10_000 });

    let app = Router::new()
        .route("/query", post(routes::post_query))
        .route("/stats", get(routes::get_stats))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(version, "serving snapshot on {}", addr);
    println!("🌐 Server running at http://{} (snapshot v{})", addr, version);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Load a bundle and apply the configured trace-depth bound, so HTTP
/// queries honor the same limit as the CLI.
fn restore_snapshot(path: &Path, max_trace_depth: Option<usize>) -> crate::Result<Snapshot> {
    let bundle = SnapshotBundle::open(path)?;
    let mut snapshot = bundle.load()?;
    if let Some(max) = max_trace_depth {
        snapshot = snapshot.with_max_trace_depth(max);
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::index::SearchIndex;
    use crate::parser::Parser;
    use crate::query::{CancelToken, QueryError, TraceSeed, DEFAULT_MAX_TRACE_DEPTH};

    #[test]
    fn test_restore_applies_trace_depth_bound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.vgsnap");

        let (corpus, _) =
            Parser::new().parse("@verse GEN.1.1\nIn the beginning.\n").unwrap();
        let graph = GraphStore::build(corpus).unwrap();
        let index = SearchIndex::build(&graph).unwrap();
        let manager = SnapshotManager::new();
        manager.publish(graph, index);
        let published = manager.acquire().unwrap();
        let mut bundle = SnapshotBundle::open(&path).unwrap();
        bundle.save(&published).unwrap();

        let bounded = restore_snapshot(&path, Some(1)).unwrap();
        assert_eq!(bounded.engine().max_trace_depth(), 1);
        let seed = TraceSeed::parse("GEN.1.1");
        assert_eq!(
            bounded.engine().trace(&seed, 2, &CancelToken::new()),
            Err(QueryError::InvalidDepth { requested: 2, max: 1 })
        );

        let unbounded = restore_snapshot(&path, None).unwrap();
        assert_eq!(unbounded.engine().max_trace_depth(), DEFAULT_MAX_TRACE_DEPTH);
    }
}
