#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use vidseek_catalog::SqliteCatalog;
use vidseek_core::traits::{Catalog, CatalogWriter, Embedder, Segmenter, VectorIndex};
use vidseek_core::types::{
    IndexVector, NewSegment, NewSourceFile, SearchHit, Segment, SegmentId, SegmentWithSource, SourceFile,
    SourceFileId, TranscriptSpan,
};
use vidseek_embed::FakeEmbedder;
use vidseek_vector::FlatVectorIndex;

pub const DIM: usize = 32;

pub fn span(text: &str, start: f64, end: f64) -> TranscriptSpan {
    TranscriptSpan::new(text, start, end)
}

pub async fn catalog() -> (TempDir, Arc<SqliteCatalog>) {
    let tmp = TempDir::new().expect("tmp");
    let catalog = SqliteCatalog::connect_path(&tmp.path().join("catalog.db")).await.expect("catalog");
    (tmp, Arc::new(catalog))
}

/// Segmenter answering from a table keyed by file name.
#[derive(Default)]
pub struct StubSegmenter {
    outputs: Mutex<HashMap<String, Result<Vec<TranscriptSpan>, String>>>,
    pub calls: AtomicUsize,
}

impl StubSegmenter {
    pub fn with(mut self, file_name: &str, spans: Vec<TranscriptSpan>) -> Self {
        self.outputs.get_mut().expect("lock").insert(file_name.to_string(), Ok(spans));
        self
    }

    pub fn failing(mut self, file_name: &str, message: &str) -> Self {
        self.outputs.get_mut().expect("lock").insert(file_name.to_string(), Err(message.to_string()));
        self
    }
}

#[async_trait]
impl Segmenter for StubSegmenter {
    async fn transcribe(&self, path: &Path) -> anyhow::Result<Vec<TranscriptSpan>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        match self.outputs.lock().expect("lock").get(&name) {
            Some(Ok(spans)) => Ok(spans.clone()),
            Some(Err(message)) => Err(anyhow::anyhow!(message.clone())),
            None => Err(anyhow::anyhow!("no transcript for {name}")),
        }
    }
}

/// Fake embedder that counts calls and can be told to misbehave.
pub struct CountingEmbedder {
    pub inner: FakeEmbedder,
    pub calls: AtomicUsize,
    pub texts: AtomicUsize,
    /// Fail any batch containing this text.
    pub fail_on: Option<String>,
    /// Return one vector fewer than asked for.
    pub drop_one: bool,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self { inner: FakeEmbedder::new(DIM), calls: AtomicUsize::new(0), texts: AtomicUsize::new(0), fail_on: None, drop_one: false }
    }

    pub fn failing_on(text: &str) -> Self {
        Self { fail_on: Some(text.to_string()), ..Self::new() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn dim(&self) -> usize {
        DIM
    }

    fn max_len(&self) -> usize {
        256
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        if let Some(bad) = &self.fail_on {
            if texts.iter().any(|t| t == bad) {
                anyhow::bail!("model crashed on '{bad}'");
            }
        }
        let mut out = self.inner.embed_batch(texts)?;
        if self.drop_one {
            out.pop();
        }
        Ok(out)
    }
}

/// Flat index that counts calls and can fail on demand.
pub struct CountingIndex {
    pub inner: FlatVectorIndex,
    pub searches: AtomicUsize,
    pub upserts: AtomicUsize,
    pub persists: AtomicUsize,
    pub fail_search: bool,
    pub fail_delete: bool,
}

impl CountingIndex {
    pub fn new() -> Self {
        Self {
            inner: FlatVectorIndex::new(DIM),
            searches: AtomicUsize::new(0),
            upserts: AtomicUsize::new(0),
            persists: AtomicUsize::new(0),
            fail_search: false,
            fail_delete: false,
        }
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn persists(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    fn dim(&self) -> usize {
        DIM
    }

    async fn upsert(&self, vectors: &[IndexVector]) -> anyhow::Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(vectors).await
    }

    async fn search(&self, query: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            anyhow::bail!("index offline");
        }
        self.inner.search(query, k).await
    }

    async fn existing_ids(&self, ids: &[SegmentId]) -> anyhow::Result<HashSet<SegmentId>> {
        self.inner.existing_ids(ids).await
    }

    async fn delete(&self, ids: &[SegmentId]) -> anyhow::Result<()> {
        if self.fail_delete {
            anyhow::bail!("index offline");
        }
        self.inner.delete(ids).await
    }

    async fn count(&self) -> anyhow::Result<usize> {
        self.inner.count().await
    }

    async fn persist(&self) -> anyhow::Result<()> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        self.inner.persist().await
    }
}

/// Index that ignores the query and replays fixed hits.
pub struct ScriptedIndex {
    pub hits: Vec<SearchHit>,
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    fn dim(&self) -> usize {
        DIM
    }

    async fn upsert(&self, _vectors: &[IndexVector]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn search(&self, _query: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>> {
        Ok(self.hits.iter().take(k).copied().collect())
    }

    async fn existing_ids(&self, ids: &[SegmentId]) -> anyhow::Result<HashSet<SegmentId>> {
        Ok(ids.iter().filter(|id| self.hits.iter().any(|h| h.id == **id)).copied().collect())
    }

    async fn delete(&self, _ids: &[SegmentId]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<usize> {
        Ok(self.hits.len())
    }
}

/// Catalog whose writers fail on the n-th segment insert, or whose lookups fail.
pub struct FailingCatalog {
    pub inner: Arc<SqliteCatalog>,
    /// Zero-based segment insert that fails within each writer.
    pub fail_segment_at: Option<usize>,
    pub fail_lookup: bool,
}

struct FailingWriter {
    inner: Box<dyn CatalogWriter>,
    segments: usize,
    fail_at: Option<usize>,
}

#[async_trait]
impl CatalogWriter for FailingWriter {
    async fn create_source_file(&mut self, new: NewSourceFile) -> anyhow::Result<SourceFile> {
        self.inner.create_source_file(new).await
    }

    async fn create_segment(&mut self, new: NewSegment) -> anyhow::Result<Segment> {
        let n = self.segments;
        self.segments += 1;
        if Some(n) == self.fail_at {
            anyhow::bail!("disk full");
        }
        self.inner.create_segment(new).await
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        self.inner.rollback().await
    }
}

#[async_trait]
impl Catalog for FailingCatalog {
    async fn begin(&self) -> anyhow::Result<Box<dyn CatalogWriter>> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(FailingWriter { inner, segments: 0, fail_at: self.fail_segment_at }))
    }

    async fn get_segments_by_ids(&self, ids: &[SegmentId]) -> anyhow::Result<Vec<SegmentWithSource>> {
        if self.fail_lookup {
            anyhow::bail!("connection reset");
        }
        self.inner.get_segments_by_ids(ids).await
    }

    async fn get_source_file(&self, id: SourceFileId) -> anyhow::Result<Option<SourceFile>> {
        self.inner.get_source_file(id).await
    }

    async fn list_source_files(&self) -> anyhow::Result<Vec<SourceFile>> {
        self.inner.list_source_files().await
    }

    async fn find_source_files_by_path(&self, file_path: &str) -> anyhow::Result<Vec<SourceFile>> {
        self.inner.find_source_files_by_path(file_path).await
    }

    async fn count_segments(&self, source_file_id: SourceFileId) -> anyhow::Result<usize> {
        self.inner.count_segments(source_file_id).await
    }

    async fn list_segments(&self, after: Option<SegmentId>, limit: usize) -> anyhow::Result<Vec<Segment>> {
        self.inner.list_segments(after, limit).await
    }

    async fn delete_source_file(&self, id: SourceFileId) -> anyhow::Result<Option<Vec<SegmentId>>> {
        self.inner.delete_source_file(id).await
    }
}
