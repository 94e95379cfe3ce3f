//! SQLite connection management for the index artifact.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("Failed to create directory: {0}")]
    DirectoryCreationFailed(#[source] std::io::Error),
}

/// How the artifact is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the file (and parent directories) if needed
    ReadWrite,
    /// Fail if the file does not exist; never write
    ReadOnly,
}

/// Open a single-connection pool on the index file.
///
/// The rollback journal is used instead of WAL so the artifact stays one
/// self-contained file once the pool is closed.
pub async fn open_index_pool(path: &Path, mode: OpenMode) -> Result<SqlitePool, ConnectionError> {
    if mode == OpenMode::ReadWrite {
        ensure_parent_directory(path)?;
    }

    let connect_options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(mode == OpenMode::ReadWrite)
        .read_only(mode == OpenMode::ReadOnly)
        .journal_mode(SqliteJournalMode::Delete)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(Duration::from_secs(30));

    SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
        .map_err(|source| ConnectionError::OpenFailed {
            path: path.display().to_string(),
            source,
        })
}

fn ensure_parent_directory(path: &Path) -> Result<(), ConnectionError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(ConnectionError::DirectoryCreationFailed)?;
        }
    }
    Ok(())
}
