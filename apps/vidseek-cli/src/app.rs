use anyhow::{Context, Result};
use std::sync::Arc;

use vidseek_catalog::SqliteCatalog;
use vidseek_core::config::Settings;
use vidseek_core::data_processor::DataProcessor;
use vidseek_core::traits::{Embedder, VectorIndex};
use vidseek_embed::get_default_embedder;
use vidseek_hybrid::{IngestOptions, IngestionCoordinator, PlaybackUrls, RetrievalAggregator};
use vidseek_transcribe::segmenter_from_settings;
use vidseek_vector::open_vector_index;

/// Long-lived handles, built once from [`Settings`] and shared by every
/// command.
pub struct App {
    pub settings: Settings,
    pub catalog: Arc<SqliteCatalog>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
}

impl App {
    pub async fn open(settings: Settings) -> Result<Self> {
        let catalog = SqliteCatalog::connect(&settings.data.catalog_url).await.context("opening catalog")?;
        let embedder = get_default_embedder(&settings.embedding).context("loading embedder")?;
        let index = open_vector_index(&settings.vector, embedder.dim()).await.context("opening vector index")?;
        tracing::info!(dim = embedder.dim(), backend = ?settings.vector.backend, "vidseek ready");
        Ok(Self { settings, catalog: Arc::new(catalog), embedder, index })
    }

    pub fn processor(&self) -> DataProcessor {
        DataProcessor::with_extensions(self.settings.ingest.video_extensions.iter().cloned())
    }

    pub fn coordinator(&self, show_progress: bool) -> Result<IngestionCoordinator> {
        let segmenter = segmenter_from_settings(&self.settings.transcribe)?;
        let options = IngestOptions {
            batch_size: self.settings.ingest.batch_size,
            duplicates: self.settings.ingest.duplicates,
            show_progress,
        };
        Ok(IngestionCoordinator::new(
            segmenter,
            Arc::clone(&self.embedder),
            self.catalog.clone(),
            Arc::clone(&self.index),
            options,
        ))
    }

    pub fn aggregator(&self) -> RetrievalAggregator {
        RetrievalAggregator::new(
            Arc::clone(&self.embedder),
            Arc::clone(&self.index),
            self.catalog.clone(),
            PlaybackUrls::new(&self.settings.search.playback_base),
        )
    }
}
