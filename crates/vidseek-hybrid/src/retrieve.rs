//! Query path: embed, nearest neighbours, catalog join, group and rank.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;

use vidseek_core::traits::{Catalog, Embedder, VectorIndex};
use vidseek_core::types::{SearchHit, SegmentId, SegmentMatch, SegmentWithSource, VideoSearchResult};
use vidseek_core::{Error, Result, Stage};

use crate::flush::embed_texts;
use crate::rank::{group_and_rank, PlaybackUrls};

pub struct RetrievalAggregator {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    catalog: Arc<dyn Catalog>,
    urls: PlaybackUrls,
}

impl RetrievalAggregator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        catalog: Arc<dyn Catalog>,
        urls: PlaybackUrls,
    ) -> Self {
        Self { embedder, index, catalog, urls }
    }

    pub fn urls(&self) -> &PlaybackUrls {
        &self.urls
    }

    /// Top `k` segment hits regrouped into videos, best video first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<VideoSearchResult>> {
        let (rows, scores) = self.retrieve(query, k).await?;
        Ok(group_and_rank(rows, &scores, &self.urls))
    }

    /// Top `k` segment hits without grouping, best first.
    pub async fn search_segments(&self, query: &str, k: usize) -> Result<Vec<SegmentMatch>> {
        let (rows, scores) = self.retrieve(query, k).await?;
        let mut matches: Vec<SegmentMatch> = rows
            .into_iter()
            .filter_map(|SegmentWithSource { segment, source_file }| {
                let score = *scores.get(&segment.id)?;
                Some(SegmentMatch { segment, source_file, score })
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.segment.id.cmp(&b.segment.id)));
        Ok(matches)
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<(Vec<SegmentWithSource>, HashMap<SegmentId, f32>)> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }

        let mut vectors = embed_texts(&self.embedder, vec![query.to_string()])
            .await
            .map_err(|e| Error::upstream(Stage::Embedder, e))?;
        let vector = match (vectors.pop(), vectors.is_empty()) {
            (Some(v), true) => v,
            _ => return Err(Error::upstream(Stage::Embedder, anyhow!("expected exactly one query vector"))),
        };

        let hits = self.index.search(&vector, k).await.map_err(|e| Error::upstream(Stage::VectorIndex, e))?;
        let (ids, scores) = score_map(&hits);
        if ids.is_empty() {
            return Ok((Vec::new(), scores));
        }

        let rows = self
            .catalog
            .get_segments_by_ids(&ids)
            .await
            .map_err(|e| Error::upstream(Stage::Catalog, e))?;
        if rows.len() < ids.len() {
            tracing::debug!(hits = ids.len(), found = rows.len(), "dropping hits without catalog records");
        }
        Ok((rows, scores))
    }
}

/// Distinct hit ids in rank order, and the best score seen per id.
fn score_map(hits: &[SearchHit]) -> (Vec<SegmentId>, HashMap<SegmentId, f32>) {
    let mut ids = Vec::with_capacity(hits.len());
    let mut scores: HashMap<SegmentId, f32> = HashMap::with_capacity(hits.len());
    for hit in hits {
        match scores.get_mut(&hit.id) {
            Some(best) => *best = best.max(hit.score),
            None => {
                scores.insert(hit.id, hit.score);
                ids.push(hit.id);
            }
        }
    }
    (ids, scores)
}
