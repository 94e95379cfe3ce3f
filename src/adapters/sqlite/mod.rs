//! SQLite persistence for the vector index artifact.

pub mod connection;
pub mod index_snapshot;

pub use connection::{open_index_pool, ConnectionError, OpenMode};
pub use index_snapshot::{read_snapshot, write_snapshot, IndexSnapshot, SnapshotRef};
