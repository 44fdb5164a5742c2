//! Orchestration over the catalog and the vector index.
//!
//! [`IngestionCoordinator`] keeps a catalog record and an index record in
//! correspondence for every segment; [`RetrievalAggregator`] turns nearest
//! neighbour hits back into ranked videos.

pub mod flush;
pub mod ingest;
pub mod queue;
pub mod rank;
pub mod reindex;
pub mod retrieve;

pub use flush::{flush_queue, BatchFailure, FlushReport};
pub use ingest::{FileFailure, FileOutcome, FileStatus, IngestOptions, IngestReport, IngestionCoordinator};
pub use queue::{EmbeddingQueue, EmbeddingTask};
pub use rank::{group_and_rank, PlaybackUrls};
pub use reindex::reindex;
pub use retrieve::RetrievalAggregator;
