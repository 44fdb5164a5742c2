use std::fmt;

use thiserror::Error;

/// The collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embedder,
    VectorIndex,
    Catalog,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Embedder => "embedder",
            Stage::VectorIndex => "vector index",
            Stage::Catalog => "catalog",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Caller-facing input problem. Raised before any side effect.
    #[error("Invalid query: {0}")]
    Validation(String),

    #[error("Transcription failed for {path}: {message}")]
    Transcription { path: String, message: String },

    #[error("{stage} call failed: {message}")]
    Upstream { stage: Stage, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Wrap a collaborator failure, keeping the full cause chain in the message.
    pub fn upstream(stage: Stage, err: impl Into<anyhow::Error>) -> Self {
        let err = err.into();
        Error::Upstream { stage, message: format!("{err:#}") }
    }

    pub fn transcription(path: &std::path::Path, err: impl Into<anyhow::Error>) -> Self {
        let err = err.into();
        Error::Transcription { path: path.display().to_string(), message: format!("{err:#}") }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
