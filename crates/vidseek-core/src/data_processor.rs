//! Turns raw inputs into catalog-ready drafts: video discovery on disk and
//! cleanup of segmenter spans.

use std::path::{Path, PathBuf};

use crate::types::{Meta, NewSourceFile, TranscriptSpan};

pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "webm"];

/// Author recorded for files ingested without one.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// A span that survived cleanup, ready to become a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSpan {
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub original_index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DataProcessor {
    extensions: Vec<String>,
}

impl DataProcessor {
    pub fn new() -> Self {
        Self::with_extensions(DEFAULT_VIDEO_EXTENSIONS.iter().map(|s| s.to_string()))
    }

    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extensions = extensions.into_iter().map(|e| e.into().trim_start_matches('.').to_ascii_lowercase()).collect();
        Self { extensions }
    }

    /// Video files directly inside `root`, sorted by path. Subdirectories
    /// are not scanned: playback URLs are built from the bare file name.
    pub fn list_video_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.is_video(p))
            .collect();
        files.sort();
        files
    }

    pub fn list_video_files_limited(&self, root: &Path, limit: usize) -> Vec<PathBuf> {
        let mut files = self.list_video_files(root);
        if files.len() > limit {
            tracing::info!(limit, total = files.len(), "limiting ingestion to the first files");
            files.truncate(limit);
        }
        files
    }

    fn is_video(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Clean segmenter output.
    ///
    /// Text is trimmed and empty spans are dropped. Times are clamped to be
    /// non-negative and a reversed pair is swapped; spans with non-finite
    /// times are dropped. `original_index` keeps the position in the raw
    /// output, so dropped spans leave gaps.
    pub fn prepare_spans(&self, spans: &[TranscriptSpan]) -> Vec<PreparedSpan> {
        let mut prepared = Vec::with_capacity(spans.len());
        for (original_index, span) in spans.iter().enumerate() {
            let text = span.text.trim();
            if text.is_empty() {
                continue;
            }
            if !span.start.is_finite() || !span.end.is_finite() {
                tracing::warn!(original_index, "dropping span with non-finite timestamps");
                continue;
            }
            let (mut start, mut end) = (span.start.max(0.0), span.end.max(0.0));
            if start > end {
                std::mem::swap(&mut start, &mut end);
            }
            prepared.push(PreparedSpan { text: text.to_string(), start_seconds: start, end_seconds: end, original_index });
        }
        prepared
    }

    /// Draft source file for `path`, recording how many spans the segmenter
    /// produced. `path` should already be absolute.
    pub fn source_file_for(&self, path: &Path, span_count: usize) -> NewSourceFile {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let mut metadata = Meta::new();
        metadata.insert("segment_count".to_string(), serde_json::Value::from(span_count));
        NewSourceFile {
            filename,
            file_type: media_type_for(path).to_string(),
            file_path: Some(path.display().to_string()),
            author: Some(UNKNOWN_AUTHOR.to_string()),
            metadata_info: Some(metadata),
        }
    }
}

/// Media type by extension.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}
