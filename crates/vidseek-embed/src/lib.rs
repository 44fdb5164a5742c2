//! Text embedders for vidseek: a candle BERT sentence encoder and a
//! deterministic fake for tests and model-less runs.

use anyhow::Result;
use std::sync::Arc;

use vidseek_core::config::{resolve_path, EmbeddingSettings};
use vidseek_core::traits::Embedder;

pub mod device;
pub mod fake;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use fake::FakeEmbedder;
pub use model::SentenceEmbedder;
pub use pool::masked_mean_l2;

/// The configured embedder: [`FakeEmbedder`] when `embedding.fake` or
/// `APP_USE_FAKE_EMBEDDINGS` is set, otherwise the model in `model_dir`.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if settings.use_fake() {
        tracing::info!(dim = settings.fake_dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.fake_dim).with_max_len(settings.max_len)));
    }
    let dir = resolve_path(&settings.model_dir);
    Ok(Arc::new(SentenceEmbedder::load(&dir, settings.max_len)?))
}
