//! In-memory vector index with a durable SQLite snapshot
//!
//! Vectors are L2-normalised on insert so that search is a brute-force inner
//! product, i.e. cosine similarity. Vectors and records are kept in two
//! parallel arrays that only ever change together under one write lock.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::adapters::sqlite::index_snapshot::{self, SnapshotRef};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{NewRecord, RecordId, RecordKind, ScoredRecord, SourceRecord};

#[derive(Debug, Default)]
struct IndexState {
    /// Row-major, one row of `dimension` values per record
    vectors: Vec<f32>,
    records: Vec<SourceRecord>,
    next_id: RecordId,
}

impl IndexState {
    fn push(&mut self, mut vector: Vec<f32>, record: NewRecord) -> RecordId {
        normalize(&mut vector);
        let id = self.next_id;
        self.next_id += 1;
        self.vectors.extend_from_slice(&vector);
        self.records.push(record.into_record(id));
        id
    }

    /// Keep only records matching `keep`; returns how many were dropped.
    fn retain(&mut self, dimension: usize, keep: impl Fn(&SourceRecord) -> bool) -> usize {
        let before = self.records.len();
        let mut vectors = Vec::with_capacity(self.vectors.len());
        let mut records = Vec::with_capacity(self.records.len());

        for (record, row) in self
            .records
            .drain(..)
            .zip(self.vectors.chunks_exact(dimension))
        {
            if keep(&record) {
                vectors.extend_from_slice(row);
                records.push(record);
            }
        }

        self.vectors = vectors;
        self.records = records;
        before - self.records.len()
    }
}

/// Counts reported by `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub count: usize,
    pub text_records: usize,
    pub image_records: usize,
    pub sources: usize,
    pub dimension: usize,
    pub next_id: RecordId,
}

/// Vector index store: append, search, remove, save, load
pub struct VectorIndexStore {
    dimension: usize,
    provider: String,
    state: RwLock<IndexState>,
}

impl VectorIndexStore {
    /// Create an empty index for vectors of `dimension` components.
    pub fn new(dimension: usize, provider: impl Into<String>) -> Self {
        Self {
            dimension,
            provider: provider.into(),
            state: RwLock::new(IndexState::default()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Reject vectors of the wrong length or with NaN/infinite components.
    fn check_vector(&self, vector: &[f32]) -> RagResult<()> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        match vector.iter().position(|x| !x.is_finite()) {
            Some(position) => Err(RagError::NonFiniteVector { position }),
            None => Ok(()),
        }
    }

    /// Append one vector with its record. Returns the assigned id.
    pub async fn add(&self, vector: Vec<f32>, record: NewRecord) -> RagResult<RecordId> {
        self.check_vector(&vector)?;
        let id = self.state.write().await.push(vector, record);
        debug!(id, "Record added");
        Ok(id)
    }

    /// Append many records at once. Either every item is added or none is.
    pub async fn add_batch(&self, items: Vec<(Vec<f32>, NewRecord)>) -> RagResult<Vec<RecordId>> {
        for (vector, _) in &items {
            self.check_vector(vector)?;
        }

        let mut state = self.state.write().await;
        let ids: Vec<RecordId> = items
            .into_iter()
            .map(|(vector, record)| state.push(vector, record))
            .collect();
        debug!(added = ids.len(), total = state.records.len(), "Batch added");
        Ok(ids)
    }

    /// Drop every record of `source` and append `items` in one step.
    ///
    /// Returns the number of records removed and the ids assigned. If any
    /// vector has the wrong dimension nothing changes.
    pub async fn replace_source(
        &self,
        source: &str,
        items: Vec<(Vec<f32>, NewRecord)>,
    ) -> RagResult<(usize, Vec<RecordId>)> {
        for (vector, _) in &items {
            self.check_vector(vector)?;
        }

        let mut state = self.state.write().await;
        let removed = state.retain(self.dimension, |r| r.source != source);
        let ids: Vec<RecordId> = items
            .into_iter()
            .map(|(vector, record)| state.push(vector, record))
            .collect();

        debug!(source, removed, added = ids.len(), "Source replaced");
        Ok((removed, ids))
    }

    /// Remove a single record. Returns false if no record has that id.
    pub async fn remove(&self, id: RecordId) -> bool {
        let mut state = self.state.write().await;
        state.retain(self.dimension, |r| r.id != id) > 0
    }

    /// Remove every record of `source`. Returns the number removed.
    pub async fn remove_source(&self, source: &str) -> usize {
        let mut state = self.state.write().await;
        state.retain(self.dimension, |r| r.source != source)
    }

    /// Remove everything. Ids are not reused afterwards.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.vectors.clear();
        state.records.clear();
    }

    /// The `k` most similar records, best first.
    ///
    /// Scores are cosine similarities; equal scores are ordered by ascending
    /// id. Returns fewer than `k` hits when the index is smaller.
    pub async fn search(&self, query: &[f32], k: usize) -> RagResult<Vec<ScoredRecord>> {
        self.check_vector(query)?;

        let state = self.state.read().await;
        if k == 0 || state.records.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        normalize(&mut query);

        let mut scored: Vec<(f32, usize)> = state
            .vectors
            .chunks_exact(self.dimension)
            .map(|row| dot(row, &query))
            .enumerate()
            .map(|(position, score)| (score, position))
            .collect();

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| state.records[a.1].id.cmp(&state.records[b.1].id))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, position)| ScoredRecord {
                record: state.records[position].clone(),
                score,
            })
            .collect())
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn get(&self, id: RecordId) -> Option<SourceRecord> {
        let state = self.state.read().await;
        state.records.iter().find(|r| r.id == id).cloned()
    }

    pub async fn stats(&self) -> IndexStats {
        let state = self.state.read().await;
        let image_records = state
            .records
            .iter()
            .filter(|r| r.kind == RecordKind::Image)
            .count();
        let sources: BTreeSet<&str> = state.records.iter().map(|r| r.source.as_str()).collect();

        IndexStats {
            count: state.records.len(),
            text_records: state.records.len() - image_records,
            image_records,
            sources: sources.len(),
            dimension: self.dimension,
            next_id: state.next_id,
        }
    }

    /// Write the whole index to `path`, replacing any earlier snapshot.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn save(&self, path: &Path) -> RagResult<()> {
        // Exclusive so no search observes the index mid-save.
        let state = self.state.write().await;

        index_snapshot::write_snapshot(
            path,
            SnapshotRef {
                dimension: self.dimension,
                provider: &self.provider,
                next_id: state.next_id,
                records: &state.records,
                vectors: &state.vectors,
            },
        )
        .await?;

        info!(count = state.records.len(), "Index saved");
        Ok(())
    }

    /// Replace the in-memory index with the snapshot at `path`.
    ///
    /// Returns `Ok(false)` and leaves the index untouched if no snapshot
    /// exists. A snapshot built with another dimension is rejected.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn load(&self, path: &Path) -> RagResult<bool> {
        let Some(snapshot) = index_snapshot::read_snapshot(path).await? else {
            debug!("No index snapshot found");
            return Ok(false);
        };

        if snapshot.dimension != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: snapshot.dimension,
            });
        }

        if snapshot.provider != self.provider {
            warn!(
                stored = %snapshot.provider,
                configured = %self.provider,
                "Index was built with a different embedding provider"
            );
        }

        let mut state = self.state.write().await;
        *state = IndexState {
            vectors: snapshot.vectors,
            records: snapshot.records,
            next_id: snapshot.next_id,
        };

        info!(count = state.records.len(), "Index loaded");
        Ok(true)
    }
}

/// Scale `vector` to unit length. Zero vectors are left as they are.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(source: &str, idx: usize) -> NewRecord {
        NewRecord::text_chunk(source, format!("{source} chunk {idx}"), idx)
    }

    async fn store_with(vectors: &[[f32; 3]]) -> VectorIndexStore {
        let store = VectorIndexStore::new(3, "fake");
        for (i, v) in vectors.iter().enumerate() {
            store.add(v.to_vec(), text(&format!("doc{i}"), 0)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_exact_vector_ranks_first() {
        let store = store_with(&[[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.7, 0.7, 0.0]]).await;

        let hits = store.search(&[2.0, 0.0, 0.0], 3).await.unwrap();
        assert_eq!(hits[0].record.source, "doc1");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_top_two_of_three_known_vectors() {
        // Cosine similarities to the query: 0.0, 1.0, 0.6
        let store = store_with(&[[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.6, 0.8, 0.0]]).await;

        let hits = store.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.source, "doc1");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].record.source, "doc2");
        assert!((hits[1].score - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_non_finite_vectors_rejected() {
        let store = VectorIndexStore::new(3, "fake");
        store.add(vec![1.0, 0.0, 0.0], text("good", 0)).await.unwrap();

        let err = store
            .add(vec![f32::NAN, 0.0, 0.0], text("nan", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NonFiniteVector { position: 0 }));
        assert!(err.is_item_error());

        let batch = store
            .add_batch(vec![
                (vec![0.0, 1.0, 0.0], text("ok", 0)),
                (vec![0.0, f32::INFINITY, 0.0], text("inf", 0)),
            ])
            .await;
        assert!(matches!(batch, Err(RagError::NonFiniteVector { position: 1 })));

        let replaced = store
            .replace_source("good", vec![(vec![0.0, 0.0, f32::NEG_INFINITY], text("good", 0))])
            .await;
        assert!(matches!(replaced, Err(RagError::NonFiniteVector { position: 2 })));

        assert!(matches!(
            store.search(&[f32::NAN, 0.0, 0.0], 1).await,
            Err(RagError::NonFiniteVector { position: 0 })
        ));

        assert_eq!(store.count().await, 1);
        let hits = store.search(&[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].record.source, "good");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_on_empty_index() {
        let store = VectorIndexStore::new(3, "fake");
        assert!(store.search(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_k_larger_than_count_and_k_zero() {
        let store = store_with(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]).await;

        assert_eq!(store.search(&[1.0, 0.0, 0.0], 10).await.unwrap().len(), 2);
        assert!(store.search(&[1.0, 0.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ties_ordered_by_id() {
        let store = store_with(&[[0.0, 0.0, 1.0], [0.0, 0.0, 1.0], [0.0, 0.0, 1.0]]).await;

        let ids: Vec<RecordId> = store
            .search(&[0.0, 0.0, 1.0], 3)
            .await
            .unwrap()
            .iter()
            .map(|h| h.record.id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let store = VectorIndexStore::new(3, "fake");

        let err = store.add(vec![1.0, 2.0], text("a", 0)).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(store.search(&[1.0; 4], 1).await.is_err());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_add_batch_is_all_or_nothing() {
        let store = VectorIndexStore::new(3, "fake");

        let result = store
            .add_batch(vec![
                (vec![1.0, 0.0, 0.0], text("a", 0)),
                (vec![1.0, 0.0], text("a", 1)),
            ])
            .await;
        assert!(result.is_err());
        assert_eq!(store.count().await, 0);

        let ids = store
            .add_batch(vec![
                (vec![1.0, 0.0, 0.0], text("a", 0)),
                (vec![0.0, 1.0, 0.0], text("a", 1)),
            ])
            .await
            .unwrap();
        assert_eq!(ids, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_replace_source_and_remove() {
        let store = VectorIndexStore::new(3, "fake");
        store
            .add_batch(vec![
                (vec![1.0, 0.0, 0.0], text("a", 0)),
                (vec![0.0, 1.0, 0.0], text("b", 0)),
                (vec![0.0, 0.0, 1.0], text("a", 1)),
            ])
            .await
            .unwrap();

        let (removed, ids) = store
            .replace_source("a", vec![(vec![1.0, 1.0, 0.0], text("a", 0))])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(ids, vec![3]);
        assert_eq!(store.count().await, 2);

        // Remaining vectors stay aligned with their records.
        let hits = store.search(&[0.0, 1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].record.source, "b");

        assert!(store.remove(1).await);
        assert!(!store.remove(1).await);
        assert_eq!(store.remove_source("a").await, 1);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_clear() {
        let store = store_with(&[[1.0, 0.0, 0.0]]).await;
        store.clear().await;
        let id = store.add(vec![0.0, 1.0, 0.0], text("b", 0)).await.unwrap();
        assert_eq!(id, 1);
    }

    #[tokio::test]
    async fn test_zero_vector_scores_zero() {
        let store = store_with(&[[0.0, 0.0, 0.0]]).await;
        let hits = store.search(&[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].score, 0.0);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = VectorIndexStore::new(3, "fake");
        store
            .add_batch(vec![
                (vec![1.0, 0.0, 0.0], text("a.md", 0)),
                (vec![1.0, 0.0, 0.0], text("a.md", 1)),
                (vec![0.0, 1.0, 0.0], NewRecord::image("red.png", "Image: red.png")),
            ])
            .await
            .unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.count, 3);
        assert_eq!(stats.text_records, 2);
        assert_eq!(stats.image_records, 1);
        assert_eq!(stats.sources, 2);
        assert_eq!(stats.next_id, 3);
    }

    #[tokio::test]
    async fn test_save_load_preserves_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let store = store_with(&[[0.1, 0.9, 0.0], [0.8, 0.2, 0.1], [0.3, 0.3, 0.3]]).await;
        store.remove(2).await;
        store.save(&path).await.unwrap();

        let reloaded = VectorIndexStore::new(3, "fake");
        assert!(reloaded.load(&path).await.unwrap());
        assert_eq!(reloaded.count().await, 2);

        let query = [0.5, 0.5, 0.1];
        assert_eq!(
            store.search(&query, 2).await.unwrap(),
            reloaded.search(&query, 2).await.unwrap()
        );

        let id = reloaded.add(vec![1.0, 0.0, 0.0], text("c", 0)).await.unwrap();
        assert_eq!(id, 3);
    }

    #[tokio::test]
    async fn test_load_missing_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&[[1.0, 0.0, 0.0]]).await;

        assert!(!store.load(&dir.path().join("nope.db")).await.unwrap());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_load_rejects_other_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        store_with(&[[1.0, 0.0, 0.0]]).await.save(&path).await.unwrap();

        let other = VectorIndexStore::new(4, "fake");
        let err = other.load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
        assert_eq!(other.count().await, 0);
    }

    #[tokio::test]
    async fn test_save_waits_for_readers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let store = store_with(&[[1.0, 0.0, 0.0]]).await;

        let reader = store.state.read().await;
        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(100), store.save(&path)).await;
        assert!(blocked.is_err(), "save ran while a reader held the index");
        drop(reader);

        store.save(&path).await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_normalize() {
        let mut v = [3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = [0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, [0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn prop_search_is_sorted_and_bounded(
            rows in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 4), 0..30),
            query in prop::collection::vec(-1.0f32..1.0, 4),
            k in 0usize..40,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let store = VectorIndexStore::new(4, "fake");
                let items = rows
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (v.clone(), text("doc", i)))
                    .collect();
                store.add_batch(items).await.unwrap();

                let hits = store.search(&query, k).await.unwrap();
                prop_assert_eq!(hits.len(), k.min(rows.len()));
                for pair in hits.windows(2) {
                    prop_assert!(pair[0].score >= pair[1].score);
                    if pair[0].score == pair[1].score {
                        prop_assert!(pair[0].record.id < pair[1].record.id);
                    }
                }
                for hit in &hits {
                    prop_assert!(hit.score <= 1.0 + 1e-5 && hit.score >= -1.0 - 1e-5);
                }
                Ok(())
            })?;
        }
    }
}
