//! Domain types shared by the catalog, the vector index and the pipelines.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form JSON attributes (`metadata_info`, extension fields).
pub type Meta = serde_json::Map<String, serde_json::Value>;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Fresh time-ordered identifier.
            pub fn generate() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identity of an ingested video.
    SourceFileId
);

uuid_id!(
    /// Identity of a segment. The same value keys the segment's vector in the
    /// vector index; there is no other mapping between the two stores.
    SegmentId
);

/// One ingested video and its top-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: SourceFileId,
    pub filename: String,
    pub file_type: String,
    pub file_path: Option<String>,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub metadata_info: Option<Meta>,
}

/// Fields for a source file about to be created. Identity and creation time
/// are assigned by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSourceFile {
    pub filename: String,
    pub file_type: String,
    pub file_path: Option<String>,
    pub author: Option<String>,
    pub metadata_info: Option<Meta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Subtitle,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Subtitle => "subtitle",
        }
    }
}

impl FromStr for SegmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subtitle" => Ok(SegmentKind::Subtitle),
            other => Err(format!("unknown segment type '{other}'")),
        }
    }
}

/// Typed form of a segment's `custom` column.
///
/// `start_seconds <= end_seconds`, both non-negative, measured from the start
/// of the file. `original_index` is the span's position in the segmenter
/// output. Unknown keys survive a round trip through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAttributes {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub original_index: usize,
    #[serde(flatten)]
    pub extra: Meta,
}

impl SegmentAttributes {
    pub fn new(start_seconds: f64, end_seconds: f64, original_index: usize) -> Self {
        Self { start_seconds, end_seconds, original_index, extra: Meta::new() }
    }
}

/// A timestamped text unit derived from a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub source_file_id: SourceFileId,
    pub kind: SegmentKind,
    pub content: String,
    pub custom: SegmentAttributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSegment {
    pub source_file_id: SourceFileId,
    pub kind: SegmentKind,
    pub content: String,
    pub custom: SegmentAttributes,
}

/// A segment with its owning source file eagerly attached.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentWithSource {
    pub segment: Segment,
    pub source_file: SourceFile,
}

/// One span as produced by a segmenter, before any cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSpan {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl TranscriptSpan {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self { text: text.into(), start, end }
    }
}

/// A vector index record.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexVector {
    pub id: SegmentId,
    pub vector: Vec<f32>,
}

/// A nearest-neighbor hit. Higher `score` is more similar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: SegmentId,
    pub score: f32,
}

/// A matching segment inside a [`VideoSearchResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleChild {
    pub segment_id: SegmentId,
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub score: f32,
    pub custom: SegmentAttributes,
}

/// One video with every matching segment, in playback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSearchResult {
    pub video_id: SourceFileId,
    pub filename: String,
    pub video_url: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub metadata_info: Option<Meta>,
    pub children: Vec<SubtitleChild>,
}

impl VideoSearchResult {
    /// Best child score; 0 for a group without children.
    pub fn representative_score(&self) -> f32 {
        self.children.iter().map(|c| c.score).reduce(f32::max).unwrap_or(0.0)
    }
}

/// Flat (ungrouped) match, used by the interactive search command.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMatch {
    pub segment: Segment,
    pub source_file: SourceFile,
    pub score: f32,
}

/// What to do when a file is ingested a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Always create new records; re-ingestion duplicates the file.
    #[default]
    Allow,
    /// Skip files whose absolute path already has a source file.
    SkipExisting,
}
