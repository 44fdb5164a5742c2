use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;

use crate::types::{
    IndexVector, NewSegment, NewSourceFile, SearchHit, Segment, SegmentId, SegmentWithSource,
    SourceFile, SourceFileId, TranscriptSpan,
};

/// Speech-to-text producer of timestamped spans.
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Spans in emission order. An error aborts only the file being ingested.
    async fn transcribe(&self, path: &Path) -> anyhow::Result<Vec<TranscriptSpan>>;
}

/// Text to fixed-dimension vectors. Implementations are CPU bound and are
/// called from blocking tasks.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// Order preserving: `out[i]` is the embedding of `texts[i]`.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Similarity store keyed by segment id. Holds no text or metadata.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;
    /// Insert or replace by id, as one bulk call.
    async fn upsert(&self, vectors: &[IndexVector]) -> anyhow::Result<()>;
    /// Top `k` by cosine similarity, best first.
    async fn search(&self, query: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>>;
    /// The subset of `ids` that currently have a vector.
    async fn existing_ids(&self, ids: &[SegmentId]) -> anyhow::Result<HashSet<SegmentId>>;
    async fn delete(&self, ids: &[SegmentId]) -> anyhow::Result<()>;
    async fn count(&self) -> anyhow::Result<usize>;
    /// Make earlier upserts and deletes durable. Called once per flush or
    /// removal; backends that write through need not override it.
    async fn persist(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Relational system of record for source files and segments.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Open a write transaction.
    async fn begin(&self) -> anyhow::Result<Box<dyn CatalogWriter>>;

    /// Segments for `ids` with their source files attached, fetched in one
    /// round trip. Unknown ids are omitted; order is unspecified.
    async fn get_segments_by_ids(&self, ids: &[SegmentId]) -> anyhow::Result<Vec<SegmentWithSource>>;

    async fn get_source_file(&self, id: SourceFileId) -> anyhow::Result<Option<SourceFile>>;
    async fn list_source_files(&self) -> anyhow::Result<Vec<SourceFile>>;
    async fn find_source_files_by_path(&self, file_path: &str) -> anyhow::Result<Vec<SourceFile>>;
    async fn count_segments(&self, source_file_id: SourceFileId) -> anyhow::Result<usize>;

    /// Keyset page over all segments ordered by id.
    async fn list_segments(&self, after: Option<SegmentId>, limit: usize) -> anyhow::Result<Vec<Segment>>;

    /// Delete a source file and, by cascade, its segments. Returns the ids of
    /// the removed segments, or `None` when the file does not exist.
    async fn delete_source_file(&self, id: SourceFileId) -> anyhow::Result<Option<Vec<SegmentId>>>;
}

/// Writes inside one catalog transaction. Dropping a writer without
/// committing discards its writes.
#[async_trait]
pub trait CatalogWriter: Send {
    async fn create_source_file(&mut self, new: NewSourceFile) -> anyhow::Result<SourceFile>;
    async fn create_segment(&mut self, new: NewSegment) -> anyhow::Result<Segment>;
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}
