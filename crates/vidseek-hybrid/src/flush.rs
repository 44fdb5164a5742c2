//! Embedding stage: turns queued segments into index vectors, batch by batch.

use anyhow::{anyhow, Context};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use vidseek_core::traits::{Embedder, VectorIndex};
use vidseek_core::types::{IndexVector, SegmentId};
use vidseek_core::{Error, Stage};

use crate::queue::{EmbeddingQueue, EmbeddingTask};

/// A batch whose embedding or upsert failed. Its segments stay in the catalog
/// without vectors until the next reindex.
#[derive(Debug)]
pub struct BatchFailure {
    /// Zero-based position of the batch within the flush.
    pub batch: usize,
    pub segment_ids: Vec<SegmentId>,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct FlushReport {
    pub batches: usize,
    pub indexed: usize,
    pub failures: Vec<BatchFailure>,
    /// Set when the index could not make this flush durable. The vectors are
    /// searchable but may be lost on restart.
    pub persist_error: Option<Error>,
}

impl FlushReport {
    pub fn failed_segments(&self) -> usize {
        self.failures.iter().map(|f| f.segment_ids.len()).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub(crate) fn progress_bar(total: usize, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Run the embedder on a blocking thread.
pub(crate) async fn embed_texts(embedder: &Arc<dyn Embedder>, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
    let embedder = Arc::clone(embedder);
    tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
        .await
        .context("embedder task failed")?
}

/// Drain `queue` in batches of `batch_size`: one embed call and one upsert per
/// batch. A failing batch is reported and the rest still run. The index is
/// persisted once, after the last batch.
pub async fn flush_queue(
    embedder: &Arc<dyn Embedder>,
    index: &Arc<dyn VectorIndex>,
    queue: EmbeddingQueue,
    batch_size: usize,
    show_progress: bool,
) -> FlushReport {
    let mut report = FlushReport::default();
    if queue.is_empty() {
        return report;
    }
    let batch_size = batch_size.max(1);
    tracing::info!(segments = queue.len(), batch_size, "embedding queued segments");
    let pb = progress_bar(queue.len(), show_progress);

    for (n, batch) in queue.tasks().chunks(batch_size).enumerate() {
        report.batches += 1;
        pb.set_message(format!("batch {}", n + 1));
        match embed_and_upsert(embedder, index, batch).await {
            Ok(()) => {
                report.indexed += batch.len();
                tracing::debug!(batch = n, size = batch.len(), "indexed batch");
            }
            Err(error) => {
                tracing::warn!(batch = n, size = batch.len(), %error, "batch failed; segments left without vectors");
                report.failures.push(BatchFailure {
                    batch: n,
                    segment_ids: batch.iter().map(|t| t.id).collect(),
                    error,
                });
            }
        }
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();
    if report.indexed > 0 {
        if let Err(e) = index.persist().await {
            let error = Error::upstream(Stage::VectorIndex, e);
            tracing::warn!(%error, "vector index not persisted");
            report.persist_error = Some(error);
        }
    }
    tracing::info!(indexed = report.indexed, failed = report.failed_segments(), "embedding finished");
    report
}

async fn embed_and_upsert(
    embedder: &Arc<dyn Embedder>,
    index: &Arc<dyn VectorIndex>,
    batch: &[EmbeddingTask],
) -> Result<(), Error> {
    let texts: Vec<String> = batch.iter().map(|t| t.text.clone()).collect();
    let vectors = embed_texts(embedder, texts).await.map_err(|e| Error::upstream(Stage::Embedder, e))?;
    if vectors.len() != batch.len() {
        return Err(Error::upstream(
            Stage::Embedder,
            anyhow!("returned {} vectors for {} texts", vectors.len(), batch.len()),
        ));
    }
    let dim = embedder.dim();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(Error::upstream(Stage::Embedder, anyhow!("vector of dimension {} (expected {dim})", bad.len())));
    }
    let records: Vec<IndexVector> =
        batch.iter().zip(vectors).map(|(task, vector)| IndexVector { id: task.id, vector }).collect();
    index.upsert(&records).await.map_err(|e| Error::upstream(Stage::VectorIndex, e))
}
