//! Database rows and their conversion into domain types.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use vidseek_core::types::{Meta, Segment, SegmentAttributes, SegmentWithSource, SourceFile};

/// Column list for `source_files` queries.
pub(crate) const SOURCE_FILE_COLUMNS: &str = "\
    id, filename, file_type, file_path, author, created_at, metadata_info";

/// Column list for `contents` queries.
pub(crate) const SEGMENT_COLUMNS: &str = "\
    id, source_file_id, type AS kind, content, custom";

/// Columns for `contents c JOIN source_files s`.
pub(crate) const JOINED_COLUMNS: &str = "\
    c.id, c.source_file_id, c.type AS kind, c.content, c.custom, \
    s.filename, s.file_type, s.file_path, s.author, s.created_at, s.metadata_info";

/// A row from the `source_files` table.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct SourceFileRow {
    pub id: String,
    pub filename: String,
    pub file_type: String,
    pub file_path: Option<String>,
    pub author: Option<String>,
    pub created_at: i64,
    pub metadata_info: Option<String>,
}

/// A row from the `contents` table.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct SegmentRow {
    pub id: String,
    pub source_file_id: String,
    pub kind: String,
    pub content: String,
    pub custom: String,
}

/// A `contents` row with its source file columns attached.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct JoinedRow {
    #[sqlx(flatten)]
    pub segment: SegmentRow,
    pub filename: String,
    pub file_type: String,
    pub file_path: Option<String>,
    pub author: Option<String>,
    pub created_at: i64,
    pub metadata_info: Option<String>,
}

pub(crate) fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("created_at {ms} out of range"))
}

pub(crate) fn meta_to_text(meta: Option<&Meta>) -> Result<Option<String>> {
    meta.map(serde_json::to_string).transpose().context("encoding metadata_info")
}

fn text_to_meta(text: Option<String>) -> Result<Option<Meta>> {
    text.map(|t| serde_json::from_str::<Meta>(&t)).transpose().context("decoding metadata_info")
}

impl TryFrom<SourceFileRow> for SourceFile {
    type Error = anyhow::Error;

    fn try_from(row: SourceFileRow) -> Result<Self> {
        Ok(SourceFile {
            id: row.id.parse().with_context(|| format!("bad source file id '{}'", row.id))?,
            filename: row.filename,
            file_type: row.file_type,
            file_path: row.file_path,
            author: row.author,
            created_at: millis_to_datetime(row.created_at)?,
            metadata_info: text_to_meta(row.metadata_info)?,
        })
    }
}

impl TryFrom<SegmentRow> for Segment {
    type Error = anyhow::Error;

    fn try_from(row: SegmentRow) -> Result<Self> {
        let custom: SegmentAttributes =
            serde_json::from_str(&row.custom).with_context(|| format!("decoding custom of segment {}", row.id))?;
        Ok(Segment {
            id: row.id.parse().with_context(|| format!("bad segment id '{}'", row.id))?,
            source_file_id: row.source_file_id.parse().context("bad source_file_id")?,
            kind: row.kind.parse().map_err(|e: String| anyhow!(e))?,
            content: row.content,
            custom,
        })
    }
}

impl TryFrom<JoinedRow> for SegmentWithSource {
    type Error = anyhow::Error;

    fn try_from(row: JoinedRow) -> Result<Self> {
        let source_file = SourceFile::try_from(SourceFileRow {
            id: row.segment.source_file_id.clone(),
            filename: row.filename,
            file_type: row.file_type,
            file_path: row.file_path,
            author: row.author,
            created_at: row.created_at,
            metadata_info: row.metadata_info,
        })?;
        Ok(SegmentWithSource { segment: Segment::try_from(row.segment)?, source_file })
    }
}
