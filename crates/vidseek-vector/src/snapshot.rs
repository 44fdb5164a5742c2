//! On-disk snapshot of a [`FlatVectorIndex`](crate::FlatVectorIndex).
//!
//! JSON document `{"version", "dim", "entries": [{"id", "vector"}]}` with
//! entries sorted by id. Writes go to `<path>.tmp` first and are renamed over
//! the target, so a crash never leaves a half-written snapshot behind.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use vidseek_core::types::SegmentId;

use crate::error::VectorIndexError;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: SegmentId,
    pub vector: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    dim: usize,
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries from disk; empty when no snapshot exists yet.
    pub fn load(&self, expected_dim: usize) -> Result<Vec<SnapshotEntry>, VectorIndexError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let file: SnapshotFile = serde_json::from_reader(reader)?;
        if file.version != FORMAT_VERSION {
            return Err(VectorIndexError::VersionMismatch(file.version, FORMAT_VERSION));
        }
        if file.dim != expected_dim {
            return Err(VectorIndexError::DimensionMismatch { expected: expected_dim, got: file.dim });
        }
        Ok(file.entries)
    }

    pub fn save(&self, dim: usize, mut entries: Vec<SnapshotEntry>) -> Result<(), VectorIndexError> {
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let temp_path = self.path.with_extension("tmp");
        let file = SnapshotFile { version: FORMAT_VERSION, dim, entries };
        if let Err(err) = write_json(&temp_path, &file) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(err);
        }
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn write_json(path: &Path, file: &SnapshotFile) -> Result<(), VectorIndexError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, file)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}
