//! Read and write the durable index artifact.
//!
//! The whole index is rewritten inside one transaction, so a crash during a
//! save leaves the previous snapshot intact.

use std::path::Path;

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::connection::{open_index_pool, OpenMode};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{RecordId, RecordKind, SourceRecord};

/// Bumped whenever the table layout changes.
pub const FORMAT_VERSION: i64 = 1;

const CREATE_META: &str = r"
CREATE TABLE IF NOT EXISTS index_meta (
    singleton INTEGER PRIMARY KEY CHECK (singleton = 1),
    format_version INTEGER NOT NULL,
    dimension INTEGER NOT NULL,
    provider TEXT NOT NULL,
    next_id INTEGER NOT NULL,
    entry_count INTEGER NOT NULL,
    saved_at TEXT NOT NULL
)";

const CREATE_ENTRIES: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    position INTEGER PRIMARY KEY,
    id INTEGER NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    source TEXT NOT NULL,
    content TEXT NOT NULL,
    chunk_index INTEGER,
    page INTEGER,
    vector BLOB NOT NULL
)";

/// Borrowed view of the in-memory index, written as-is.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotRef<'a> {
    pub dimension: usize,
    pub provider: &'a str,
    pub next_id: RecordId,
    pub records: &'a [SourceRecord],
    /// Row-major, `records.len() * dimension` values
    pub vectors: &'a [f32],
}

/// An index read back from disk.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    pub dimension: usize,
    pub provider: String,
    pub next_id: RecordId,
    pub records: Vec<SourceRecord>,
    pub vectors: Vec<f32>,
}

/// Replace the artifact's contents with `snapshot`.
pub async fn write_snapshot(path: &Path, snapshot: SnapshotRef<'_>) -> RagResult<()> {
    let pool = open_index_pool(path, OpenMode::ReadWrite)
        .await
        .map_err(|e| RagError::Storage(e.to_string()))?;

    let result = write_with_pool(&pool, snapshot).await;
    pool.close().await;
    result
}

async fn write_with_pool(pool: &SqlitePool, snapshot: SnapshotRef<'_>) -> RagResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(CREATE_META).execute(&mut *tx).await?;
    sqlx::query(CREATE_ENTRIES).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM entries").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM index_meta").execute(&mut *tx).await?;

    sqlx::query(
        "INSERT INTO index_meta
            (singleton, format_version, dimension, provider, next_id, entry_count, saved_at)
         VALUES (1, ?, ?, ?, ?, ?, ?)",
    )
    .bind(FORMAT_VERSION)
    .bind(snapshot.dimension as i64)
    .bind(snapshot.provider)
    .bind(snapshot.next_id as i64)
    .bind(snapshot.records.len() as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    let rows = snapshot
        .records
        .iter()
        .zip(snapshot.vectors.chunks_exact(snapshot.dimension.max(1)));

    for (position, (record, vector)) in rows.enumerate() {
        sqlx::query(
            "INSERT INTO entries
                (position, id, kind, source, content, chunk_index, page, vector)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(position as i64)
        .bind(record.id as i64)
        .bind(record.kind.as_str())
        .bind(&record.source)
        .bind(&record.content)
        .bind(record.chunk_index.map(|c| c as i64))
        .bind(record.page.map(i64::from))
        .bind(vector_to_bytes(vector))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!(entries = snapshot.records.len(), "Index snapshot written");
    Ok(())
}

/// Read the artifact at `path`. Returns `Ok(None)` if no file exists.
pub async fn read_snapshot(path: &Path) -> RagResult<Option<IndexSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }

    let corrupt = |reason: String| RagError::CorruptIndex(format!("{}: {reason}", path.display()));

    let pool = open_index_pool(path, OpenMode::ReadOnly)
        .await
        .map_err(|e| corrupt(e.to_string()))?;

    let result = read_with_pool(&pool).await.map_err(|e| match e {
        RagError::CorruptIndex(reason) => corrupt(reason),
        RagError::Storage(reason) => corrupt(reason),
        other => other,
    });
    pool.close().await;
    result.map(Some)
}

async fn read_with_pool(pool: &SqlitePool) -> RagResult<IndexSnapshot> {
    let meta = sqlx::query(
        "SELECT format_version, dimension, provider, next_id, entry_count FROM index_meta",
    )
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| RagError::CorruptIndex("missing index metadata".to_string()))?;

    let format_version: i64 = meta.try_get("format_version")?;
    if format_version != FORMAT_VERSION {
        return Err(RagError::CorruptIndex(format!(
            "unsupported format version {format_version}"
        )));
    }

    let dimension = non_negative(meta.try_get("dimension")?, "dimension")? as usize;
    let provider: String = meta.try_get("provider")?;
    let next_id = non_negative(meta.try_get("next_id")?, "next_id")?;
    let entry_count = non_negative(meta.try_get("entry_count")?, "entry_count")? as usize;

    if dimension == 0 {
        return Err(RagError::CorruptIndex("dimension is zero".to_string()));
    }

    let rows = sqlx::query(
        "SELECT id, kind, source, content, chunk_index, page, vector
         FROM entries ORDER BY position",
    )
    .fetch_all(pool)
    .await?;

    if rows.len() != entry_count {
        return Err(RagError::CorruptIndex(format!(
            "metadata lists {entry_count} entries but {} are stored",
            rows.len()
        )));
    }

    let mut records = Vec::with_capacity(rows.len());
    let mut vectors = Vec::with_capacity(rows.len() * dimension);

    for row in rows {
        let id = non_negative(row.try_get("id")?, "id")?;
        if id >= next_id {
            return Err(RagError::CorruptIndex(format!(
                "entry id {id} is not below next_id {next_id}"
            )));
        }

        let kind: String = row.try_get("kind")?;
        let kind = kind.parse::<RecordKind>().map_err(RagError::CorruptIndex)?;

        let chunk_index: Option<i64> = row.try_get("chunk_index")?;
        let page: Option<i64> = row.try_get("page")?;

        let blob: Vec<u8> = row.try_get("vector")?;
        let vector = bytes_to_vector(&blob)?;
        if vector.len() != dimension {
            return Err(RagError::CorruptIndex(format!(
                "entry {id} has {} components, expected {dimension}",
                vector.len()
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(RagError::CorruptIndex(format!(
                "entry {id} has a non-finite component"
            )));
        }

        records.push(SourceRecord {
            id,
            kind,
            source: row.try_get("source")?,
            content: row.try_get("content")?,
            chunk_index: chunk_index.map(|c| c as usize),
            page: page.map(|p| p as u32),
        });
        vectors.extend_from_slice(&vector);
    }

    Ok(IndexSnapshot {
        dimension,
        provider,
        next_id,
        records,
        vectors,
    })
}

fn non_negative(value: i64, field: &str) -> RagResult<u64> {
    u64::try_from(value).map_err(|_| RagError::CorruptIndex(format!("negative {field}: {value}")))
}

fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_vector(bytes: &[u8]) -> RagResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(RagError::CorruptIndex(format!(
            "vector blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::NewRecord;

    fn sample() -> (Vec<SourceRecord>, Vec<f32>) {
        let records = vec![
            NewRecord::text_chunk("docs/sky.txt", "The sky is blue.", 0).into_record(0),
            NewRecord::image("images/red.png", "Image: red.png").into_record(2),
        ];
        let vectors = vec![1.0, 0.0, 0.0, 0.0, 0.6, 0.8];
        (records, vectors)
    }

    #[test]
    fn test_vector_bytes_are_little_endian() {
        let bytes = vector_to_bytes(&[1.0]);
        assert_eq!(bytes, vec![0x00, 0x00, 0x80, 0x3F]);
        assert_eq!(bytes_to_vector(&bytes).unwrap(), vec![1.0]);
        assert!(bytes_to_vector(&[0, 0, 0]).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_snapshot(&dir.path().join("index.db"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let (records, vectors) = sample();

        write_snapshot(
            &path,
            SnapshotRef {
                dimension: 3,
                provider: "fake",
                next_id: 3,
                records: &records,
                vectors: &vectors,
            },
        )
        .await
        .unwrap();

        let snapshot = read_snapshot(&path).await.unwrap().unwrap();
        assert_eq!(snapshot.dimension, 3);
        assert_eq!(snapshot.provider, "fake");
        assert_eq!(snapshot.next_id, 3);
        assert_eq!(snapshot.records, records);
        assert_eq!(snapshot.vectors, vectors);
    }

    #[tokio::test]
    async fn test_rewrite_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let (records, vectors) = sample();

        let full = SnapshotRef {
            dimension: 3,
            provider: "fake",
            next_id: 3,
            records: &records,
            vectors: &vectors,
        };
        write_snapshot(&path, full).await.unwrap();
        write_snapshot(
            &path,
            SnapshotRef {
                records: &records[1..],
                vectors: &vectors[3..],
                ..full
            },
        )
        .await
        .unwrap();

        let snapshot = read_snapshot(&path).await.unwrap().unwrap();
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].id, 2);
    }

    #[tokio::test]
    async fn test_non_finite_vector_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let (records, mut vectors) = sample();
        vectors[4] = f32::NAN;

        write_snapshot(
            &path,
            SnapshotRef {
                dimension: 3,
                provider: "fake",
                next_id: 3,
                records: &records,
                vectors: &vectors,
            },
        )
        .await
        .unwrap();

        let err = read_snapshot(&path).await.unwrap_err();
        match err {
            RagError::CorruptIndex(reason) => assert!(reason.contains("non-finite"), "{reason}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        std::fs::write(&path, b"definitely not a database file, just some text").unwrap();

        let err = read_snapshot(&path).await.unwrap_err();
        assert!(matches!(err, RagError::CorruptIndex(_)), "got {err:?}");
    }
}
