//! Shared domain model for vidseek.
//!
//! Everything the ingestion and retrieval pipelines agree on lives here: the
//! catalog records, the collaborator traits, the error taxonomy, and the
//! configuration loader.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result, Stage};
