//! Vector index adapters: an exact flat index with a snapshot file, and a
//! LanceDB table behind the `lance` feature.

use std::sync::Arc;

use vidseek_core::config::{resolve_path, VectorBackend, VectorSettings};
use vidseek_core::traits::VectorIndex;

pub mod error;
pub mod flat;
pub mod snapshot;
#[cfg(feature = "lance")]
pub mod lance;
#[cfg(feature = "lance")]
pub mod schema;
#[cfg(feature = "lance")]
pub mod table;

pub use error::VectorIndexError;
pub use flat::FlatVectorIndex;
#[cfg(feature = "lance")]
pub use lance::LanceVectorIndex;

/// Open the configured backend for vectors of dimension `dim`.
pub async fn open_vector_index(settings: &VectorSettings, dim: usize) -> anyhow::Result<Arc<dyn VectorIndex>> {
    match settings.backend {
        VectorBackend::Flat => {
            let path = resolve_path(&settings.snapshot_path);
            Ok(Arc::new(FlatVectorIndex::open(path, dim)?))
        }
        #[cfg(feature = "lance")]
        VectorBackend::Lance => {
            let dir = resolve_path(&settings.lance_dir);
            std::fs::create_dir_all(&dir)?;
            let index = LanceVectorIndex::open(dir.to_string_lossy().as_ref(), &settings.table, dim).await?;
            Ok(Arc::new(index))
        }
        #[cfg(not(feature = "lance"))]
        VectorBackend::Lance => Err(VectorIndexError::BackendUnavailable("lance").into()),
    }
}
