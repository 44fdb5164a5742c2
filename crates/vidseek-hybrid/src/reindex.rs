//! Repair pass: embed catalog segments that have no vector.
//!
//! Walks the catalog, never the index, so it also fills the gaps left by
//! failed flush batches.

use std::sync::Arc;

use vidseek_core::traits::{Catalog, Embedder, VectorIndex};
use vidseek_core::types::SegmentId;
use vidseek_core::{Error, Result, Stage};

use crate::flush::{flush_queue, FlushReport};
use crate::queue::{EmbeddingQueue, EmbeddingTask};

pub async fn reindex(
    catalog: &Arc<dyn Catalog>,
    index: &Arc<dyn VectorIndex>,
    embedder: &Arc<dyn Embedder>,
    batch_size: usize,
    show_progress: bool,
) -> Result<FlushReport> {
    let page_size = batch_size.max(1);
    let mut queue = EmbeddingQueue::new();
    let mut after: Option<SegmentId> = None;
    let mut scanned = 0usize;

    loop {
        let page = catalog
            .list_segments(after, page_size)
            .await
            .map_err(|e| Error::upstream(Stage::Catalog, e))?;
        let Some(last) = page.last() else { break };
        after = Some(last.id);
        scanned += page.len();

        let ids: Vec<SegmentId> = page.iter().map(|s| s.id).collect();
        let present = index.existing_ids(&ids).await.map_err(|e| Error::upstream(Stage::VectorIndex, e))?;
        queue.extend(
            page.into_iter()
                .filter(|s| !present.contains(&s.id))
                .map(|s| EmbeddingTask { id: s.id, text: s.content }),
        );
    }

    tracing::info!(scanned, missing = queue.len(), "reindex scan finished");
    Ok(flush_queue(embedder, index, queue, batch_size, show_progress).await)
}
