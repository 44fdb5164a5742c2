use vidseek_core::types::SegmentId;

#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(#[from] serde_json::Error),

    #[error("Snapshot version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u32, u32),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Vector for {0} has zero norm")]
    ZeroNorm(SegmentId),

    #[error("Query vector has zero norm")]
    ZeroNormQuery,

    #[error("Backend '{0}' is not compiled in")]
    BackendUnavailable(&'static str),
}
