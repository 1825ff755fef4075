//! Snapshot persistence
//!
//! A snapshot bundle is a single SQLite file holding the source records of
//! one snapshot plus integrity metadata. Derived structures (adjacency,
//! search indexes) are rebuilt on load.

pub mod schema;
pub mod sqlite;

pub use sqlite::SnapshotBundle;
