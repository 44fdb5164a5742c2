//! Exact in-memory cosine index, optionally persisted as a snapshot file.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

use vidseek_core::traits::VectorIndex;
use vidseek_core::types::{IndexVector, SearchHit, SegmentId};

use crate::error::VectorIndexError;
use crate::snapshot::{SnapshotEntry, SnapshotStore};

/// Vectors are stored L2-normalised, so cosine similarity is a dot product.
///
/// Mutations stay in memory until [`VectorIndex::persist`] writes the
/// snapshot; callers persist once per flush, not once per batch.
pub struct FlatVectorIndex {
    dim: usize,
    entries: RwLock<HashMap<SegmentId, Vec<f32>>>,
    snapshot: Option<SnapshotStore>,
    dirty: AtomicBool,
    saving: Mutex<()>,
    saves: AtomicUsize,
}

impl FlatVectorIndex {
    /// Memory-only index.
    pub fn new(dim: usize) -> Self {
        Self::with_store(dim, HashMap::new(), None)
    }

    fn with_store(dim: usize, entries: HashMap<SegmentId, Vec<f32>>, snapshot: Option<SnapshotStore>) -> Self {
        Self {
            dim,
            entries: RwLock::new(entries),
            snapshot,
            dirty: AtomicBool::new(false),
            saving: Mutex::new(()),
            saves: AtomicUsize::new(0),
        }
    }

    /// Index backed by a snapshot at `path`, loaded now and rewritten by
    /// `persist` when there are unsaved changes.
    pub fn open(path: PathBuf, dim: usize) -> Result<Self, VectorIndexError> {
        let store = SnapshotStore::new(path);
        let loaded = store.load(dim)?;
        let mut entries = HashMap::with_capacity(loaded.len());
        for entry in loaded {
            let vector = normalize(entry.id, entry.vector, dim)?;
            entries.insert(entry.id, vector);
        }
        tracing::info!(path = %store.path().display(), count = entries.len(), "opened flat vector index");
        Ok(Self::with_store(dim, entries, Some(store)))
    }

    /// Snapshot files written since this index was opened.
    pub fn snapshot_writes(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Changes not yet written to the snapshot.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    async fn save_snapshot(&self) -> Result<(), VectorIndexError> {
        let Some(store) = self.snapshot.clone() else {
            self.dirty.store(false, Ordering::SeqCst);
            return Ok(());
        };
        let _saving = self.saving.lock().await;
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        // Copy under the read lock; searches keep running while the file is written.
        let snapshot: Vec<SnapshotEntry> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(id, vector)| SnapshotEntry { id: *id, vector: vector.clone() })
            .collect();
        let dim = self.dim;
        let saved = tokio::task::spawn_blocking(move || store.save(dim, snapshot))
            .await
            .map_err(|e| VectorIndexError::Io(std::io::Error::other(e.to_string())))
            .and_then(|r| r);
        match saved {
            Ok(()) => {
                self.saves.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(err) => {
                self.dirty.store(true, Ordering::SeqCst);
                Err(err)
            }
        }
    }
}

fn normalize(id: SegmentId, mut vector: Vec<f32>, dim: usize) -> Result<Vec<f32>, VectorIndexError> {
    if vector.len() != dim {
        return Err(VectorIndexError::DimensionMismatch { expected: dim, got: vector.len() });
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON || !norm.is_finite() {
        return Err(VectorIndexError::ZeroNorm(id));
    }
    for x in &mut vector {
        *x /= norm;
    }
    Ok(vector)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorIndex for FlatVectorIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn upsert(&self, vectors: &[IndexVector]) -> anyhow::Result<()> {
        // Validate the whole batch before touching the map.
        let normalized = vectors
            .iter()
            .map(|v| normalize(v.id, v.vector.clone(), self.dim).map(|n| (v.id, n)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut entries = self.entries.write().await;
        for (id, vector) in normalized {
            entries.insert(id, vector);
        }
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(VectorIndexError::DimensionMismatch { expected: self.dim, got: query.len() }.into());
        }
        let norm = query.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm <= f32::EPSILON || !norm.is_finite() {
            return Err(VectorIndexError::ZeroNormQuery.into());
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let entries = self.entries.read().await;
        let mut hits: Vec<SearchHit> = entries
            .iter()
            .map(|(id, vector)| SearchHit { id: *id, score: dot(query, vector) / norm })
            .collect();
        drop(entries);
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn existing_ids(&self, ids: &[SegmentId]) -> anyhow::Result<HashSet<SegmentId>> {
        let entries = self.entries.read().await;
        Ok(ids.iter().filter(|id| entries.contains_key(id)).copied().collect())
    }

    async fn delete(&self, ids: &[SegmentId]) -> anyhow::Result<()> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        for id in ids {
            entries.remove(id);
        }
        if entries.len() != before {
            self.dirty.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn persist(&self) -> anyhow::Result<()> {
        self.save_snapshot().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> SegmentId {
        SegmentId(uuid::Uuid::from_u128(n))
    }

    #[tokio::test]
    async fn ties_are_ordered_by_id() {
        let index = FlatVectorIndex::new(2);
        index
            .upsert(&[
                IndexVector { id: id(3), vector: vec![1.0, 0.0] },
                IndexVector { id: id(1), vector: vec![2.0, 0.0] },
                IndexVector { id: id(2), vector: vec![0.0, 1.0] },
            ])
            .await
            .unwrap();
        let hits = index.search(&[1.0, 0.0], 3).await.unwrap();
        let order: Vec<_> = hits.iter().map(|h| h.id).collect();
        assert_eq!(order, vec![id(1), id(3), id(2)]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[2].score.abs() < 1e-6);
    }

    #[tokio::test]
    async fn rejects_bad_vectors_without_partial_writes() {
        let index = FlatVectorIndex::new(2);
        let err = index
            .upsert(&[
                IndexVector { id: id(1), vector: vec![1.0, 0.0] },
                IndexVector { id: id(2), vector: vec![0.0, 0.0] },
            ])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("zero norm"));
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.search(&[1.0, 0.0, 0.0], 1).await.is_err());
    }
}
