//! Ingestion: segmenter output into the catalog, then vectors into the index.
//!
//! Each file is written in its own catalog transaction. Its segments are
//! queued for embedding only after that transaction commits, and the queue is
//! drained once per run.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vidseek_core::data_processor::DataProcessor;
use vidseek_core::traits::{Catalog, CatalogWriter, Embedder, Segmenter, VectorIndex};
use vidseek_core::types::{
    DuplicatePolicy, NewSegment, SegmentAttributes, SegmentId, SegmentKind, SourceFileId, TranscriptSpan,
};
use vidseek_core::{Error, Result, Stage};

use crate::flush::{flush_queue, FlushReport};
use crate::queue::{EmbeddingQueue, EmbeddingTask};
use crate::reindex::reindex;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Segments per embed + upsert call.
    pub batch_size: usize,
    pub duplicates: DuplicatePolicy,
    /// Draw a terminal progress bar while flushing.
    pub show_progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { batch_size: 100, duplicates: DuplicatePolicy::Allow, show_progress: false }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Ingested { source_file_id: SourceFileId, segments: usize },
    /// Already in the catalog under [`DuplicatePolicy::SkipExisting`].
    Skipped { existing: SourceFileId },
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Committed segments awaiting vectors.
    pub tasks: Vec<EmbeddingTask>,
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub files: Vec<FileOutcome>,
    pub failures: Vec<FileFailure>,
    pub flush: FlushReport,
}

impl IngestReport {
    pub fn ingested(&self) -> usize {
        self.files.iter().filter(|f| matches!(f.status, FileStatus::Ingested { .. })).count()
    }

    pub fn skipped(&self) -> usize {
        self.files.iter().filter(|f| matches!(f.status, FileStatus::Skipped { .. })).count()
    }

    pub fn segments(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.status {
                FileStatus::Ingested { segments, .. } => segments,
                FileStatus::Skipped { .. } => 0,
            })
            .sum()
    }
}

pub struct IngestionCoordinator {
    segmenter: Arc<dyn Segmenter>,
    embedder: Arc<dyn Embedder>,
    catalog: Arc<dyn Catalog>,
    index: Arc<dyn VectorIndex>,
    options: IngestOptions,
    processor: DataProcessor,
}

impl IngestionCoordinator {
    pub fn new(
        segmenter: Arc<dyn Segmenter>,
        embedder: Arc<dyn Embedder>,
        catalog: Arc<dyn Catalog>,
        index: Arc<dyn VectorIndex>,
        options: IngestOptions,
    ) -> Self {
        Self { segmenter, embedder, catalog, index, options, processor: DataProcessor::new() }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Transcribe one file and commit its source file and segments. Nothing is
    /// embedded yet; the returned outcome carries the work for [`Self::flush`].
    pub async fn ingest_file(&self, path: &Path) -> Result<FileOutcome> {
        let path = absolute(path)?;
        let path_str = path.display().to_string();

        if self.options.duplicates == DuplicatePolicy::SkipExisting {
            let existing = self
                .catalog
                .find_source_files_by_path(&path_str)
                .await
                .map_err(|e| Error::upstream(Stage::Catalog, e))?;
            if let Some(first) = existing.first() {
                tracing::info!(file = %path_str, existing = %first.id, "already ingested; skipping");
                return Ok(FileOutcome { path, status: FileStatus::Skipped { existing: first.id }, tasks: Vec::new() });
            }
        }

        let spans = self.segmenter.transcribe(&path).await.map_err(|e| Error::transcription(&path, e))?;
        tracing::info!(file = %path_str, spans = spans.len(), "transcribed");

        let mut writer = self.catalog.begin().await.map_err(|e| Error::upstream(Stage::Catalog, e))?;
        let written = self.write_file(writer.as_mut(), &path, &spans).await;
        let (source_file_id, tasks) = match written {
            Ok(done) => {
                writer.commit().await.map_err(|e| Error::upstream(Stage::Catalog, e))?;
                done
            }
            Err(err) => {
                if let Err(rollback) = writer.rollback().await {
                    tracing::warn!(file = %path_str, error = %rollback, "rollback failed");
                }
                return Err(Error::upstream(Stage::Catalog, err));
            }
        };

        tracing::info!(file = %path_str, source_file = %source_file_id, segments = tasks.len(), "committed");
        Ok(FileOutcome {
            path,
            status: FileStatus::Ingested { source_file_id, segments: tasks.len() },
            tasks,
        })
    }

    async fn write_file(
        &self,
        writer: &mut dyn CatalogWriter,
        path: &Path,
        spans: &[TranscriptSpan],
    ) -> anyhow::Result<(SourceFileId, Vec<EmbeddingTask>)> {
        let draft = self.processor.source_file_for(path, spans.len());
        let source_file = writer.create_source_file(draft).await.context("creating source file")?;

        let prepared = self.processor.prepare_spans(spans);
        let mut tasks = Vec::with_capacity(prepared.len());
        for span in prepared {
            let segment = writer
                .create_segment(NewSegment {
                    source_file_id: source_file.id,
                    kind: SegmentKind::Subtitle,
                    content: span.text,
                    custom: SegmentAttributes::new(span.start_seconds, span.end_seconds, span.original_index),
                })
                .await
                .with_context(|| format!("creating segment {}", span.original_index))?;
            tasks.push(EmbeddingTask { id: segment.id, text: segment.content });
        }
        Ok((source_file.id, tasks))
    }

    /// Ingest every path, then embed everything that committed. Failures are
    /// per file and per batch; the run always completes.
    pub async fn ingest_files(&self, paths: &[PathBuf]) -> IngestReport {
        let mut report = IngestReport::default();
        let mut queue = EmbeddingQueue::new();
        for path in paths {
            match self.ingest_file(path).await {
                Ok(mut outcome) => {
                    queue.extend(std::mem::take(&mut outcome.tasks));
                    report.files.push(outcome);
                }
                Err(error) => {
                    tracing::warn!(file = %path.display(), %error, "file skipped");
                    report.failures.push(FileFailure { path: path.clone(), error });
                }
            }
        }
        report.flush = self.flush(queue).await;
        report
    }

    pub async fn flush(&self, queue: EmbeddingQueue) -> FlushReport {
        flush_queue(&self.embedder, &self.index, queue, self.options.batch_size, self.options.show_progress).await
    }

    /// Delete a source file and its segments, then their vectors. A failure of
    /// the index delete is logged only; retrieval drops the dangling ids.
    pub async fn remove_source_file(&self, id: SourceFileId) -> Result<Vec<SegmentId>> {
        let removed = self
            .catalog
            .delete_source_file(id)
            .await
            .map_err(|e| Error::upstream(Stage::Catalog, e))?
            .ok_or_else(|| Error::NotFound(format!("source file {id}")))?;
        if let Err(error) = self.index.delete(&removed).await {
            tracing::warn!(source_file = %id, segments = removed.len(), error = %format!("{error:#}"), "vector delete failed");
        } else if let Err(error) = self.index.persist().await {
            tracing::warn!(source_file = %id, error = %format!("{error:#}"), "vector index not persisted");
        }
        Ok(removed)
    }

    /// Embed catalog segments the index is missing.
    pub async fn reindex(&self) -> Result<FlushReport> {
        reindex(&self.catalog, &self.index, &self.embedder, self.options.batch_size, self.options.show_progress).await
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| Error::transcription(path, e))?;
    Ok(cwd.join(path))
}
