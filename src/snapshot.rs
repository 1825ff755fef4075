//! Snapshot manager - the single concurrency seam
//!
//! A snapshot is an immutable (graph, index) pair tagged with a
//! monotonically increasing version. The manager owns the published
//! snapshot pointer; `publish` swaps it atomically and never blocks
//! in-flight readers, which keep the prior snapshot alive through their
//! `Arc` handles until the last one drops.

use crate::graph::GraphStore;
use crate::index::SearchIndex;
use crate::query::QueryEngine;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// An immutable, versioned (graph, index) pair.
#[derive(Debug)]
pub struct Snapshot {
    version: u64,
    graph: GraphStore,
    index: SearchIndex,
    max_trace_depth: usize,
}

impl Snapshot {
    pub(crate) fn new(version: u64, graph: GraphStore, index: SearchIndex) -> Self {
        Self { version, graph, index, max_trace_depth: crate::query::DEFAULT_MAX_TRACE_DEPTH }
    }

    pub fn with_max_trace_depth(mut self, max: usize) -> Self {
        self.max_trace_depth = max;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Query engine borrowing this snapshot.
    pub fn engine(&self) -> QueryEngine<'_> {
        QueryEngine::new(&self.graph, &self.index).with_max_trace_depth(self.max_trace_depth)
    }
}

/// Owns the currently published snapshot and coordinates replacement.
///
/// Only the pointer swap itself takes the lock; reads clone the `Arc` and
/// proceed without blocking each other or the publisher.
#[derive(Debug)]
pub struct SnapshotManager {
    current: Mutex<Option<Arc<Snapshot>>>,
    next_version: AtomicU64,
}

impl Default for SnapshotManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotManager {
    pub fn new() -> Self {
        Self { current: Mutex::new(None), next_version: AtomicU64::new(1) }
    }

    /// Publish a freshly built (graph, index) pair, returning its version.
    ///
    /// Atomic swap: readers holding the prior snapshot are unaffected; the
    /// prior snapshot is freed once its last handle drops.
    pub fn publish(&self, graph: GraphStore, index: SearchIndex) -> u64 {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let snapshot = Arc::new(Snapshot::new(version, graph, index));
        let mut current = self.current.lock().expect("snapshot lock poisoned");
        *current = Some(snapshot);
        version
    }

    /// Publish a snapshot restored from a bundle, preserving its version.
    /// Future publishes continue above it.
    pub fn publish_restored(&self, snapshot: Snapshot) -> u64 {
        let version = snapshot.version();
        self.next_version.fetch_max(version + 1, Ordering::SeqCst);
        let mut current = self.current.lock().expect("snapshot lock poisoned");
        *current = Some(Arc::new(snapshot));
        version
    }

    /// Acquire the published snapshot. The handle keeps it alive on every
    /// exit path; release happens on drop.
    pub fn acquire(&self) -> Option<Arc<Snapshot>> {
        self.current.lock().expect("snapshot lock poisoned").clone()
    }

    pub fn current_version(&self) -> Option<u64> {
        self.current
            .lock()
            .expect("snapshot lock poisoned")
            .as_ref()
            .map(|s| s.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn built(input: &str) -> (GraphStore, SearchIndex) {
        let (corpus, _) = Parser::new().parse(input).unwrap();
        let graph = GraphStore::build(corpus).unwrap();
        let index = SearchIndex::build(&graph).unwrap();
        (graph, index)
    }

    #[test]
    fn test_publish_and_acquire() {
        let manager = SnapshotManager::new();
        assert!(manager.acquire().is_none());

        let (graph, index) = built("@verse GEN.1.1\nIn the beginning.\n");
        let v1 = manager.publish(graph, index);
        assert_eq!(v1, 1);

        let snap = manager.acquire().unwrap();
        assert_eq!(snap.version(), 1);
        assert!(snap.engine().lookup("GEN.1.1").is_ok());
    }

    #[test]
    fn test_versions_increase_monotonically() {
        let manager = SnapshotManager::new();
        for expected in 1..=3 {
            let (graph, index) = built("@verse GEN.1.1\nIn the beginning.\n");
            assert_eq!(manager.publish(graph, index), expected);
        }
        assert_eq!(manager.current_version(), Some(3));
    }

    #[test]
    fn test_readers_keep_prior_snapshot_alive() {
        let manager = SnapshotManager::new();

        let (graph, index) = built("@verse GEN.1.1\nIn the beginning.\n");
        manager.publish(graph, index);
        let old = manager.acquire().unwrap();

        let (graph, index) = built("@verse EXO.1.1\nNow these are the names.\n");
        manager.publish(graph, index);

        // The old handle still serves its own fully consistent view
        assert!(old.engine().lookup("GEN.1.1").is_ok());
        assert_eq!(old.version(), 1);

        let new = manager.acquire().unwrap();
        assert_eq!(new.version(), 2);
        assert!(new.engine().lookup("GEN.1.1").is_err());
    }

    #[test]
    fn test_concurrent_reads_are_consistent() {
        let manager = Arc::new(SnapshotManager::new());
        let (graph, index) = built(
            "@verse GEN.15.6\nAnd he believed.\n\n@note covenant GEN.15.6\nOn faith and righteousness.\n",
        );
        manager.publish(graph, index);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(std::thread::spawn(move || {
                let snap = manager.acquire().unwrap();
                let hits = snap.engine().search(&["faith".to_string()]);
                (snap.version(), hits.len())
            }));
        }
        for handle in handles {
            let (version, hits) = handle.join().unwrap();
            assert_eq!(version, 1);
            assert_eq!(hits, 1);
        }
    }

    #[test]
    fn test_publish_restored_preserves_version() {
        let manager = SnapshotManager::new();
        let (graph, index) = built("@verse GEN.1.1\nIn the beginning.\n");
        let snapshot = Snapshot::new(7, graph, index);
        assert_eq!(manager.publish_restored(snapshot), 7);

        let (graph, index) = built("@verse GEN.1.1\nIn the beginning.\n");
        assert_eq!(manager.publish(graph, index), 8);
    }
}
