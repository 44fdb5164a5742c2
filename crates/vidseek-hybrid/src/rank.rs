//! Regroups flat segment hits into ranked videos.

use std::cmp::Ordering;
use std::collections::HashMap;

use vidseek_core::types::{SegmentId, SegmentWithSource, SourceFileId, SubtitleChild, VideoSearchResult};

/// Builds `video_url` as `base + "/" + filename`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackUrls {
    base: String,
}

impl PlaybackUrls {
    pub const DEFAULT_BASE: &'static str = "/static/videos";

    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self { base: base.trim_end_matches('/').to_string() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/{}", self.base, filename.trim_start_matches('/'))
    }
}

impl Default for PlaybackUrls {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE)
    }
}

/// Group `rows` by source file and order the result.
///
/// Children are ordered by start time, then `original_index`, then input
/// order. Groups are ordered by their best child score, descending; equal
/// scores fall back to `created_at` and then id, both ascending. Rows with no
/// entry in `scores` are ignored.
pub fn group_and_rank(
    rows: Vec<SegmentWithSource>,
    scores: &HashMap<SegmentId, f32>,
    urls: &PlaybackUrls,
) -> Vec<VideoSearchResult> {
    let mut slots: HashMap<SourceFileId, usize> = HashMap::new();
    let mut groups: Vec<VideoSearchResult> = Vec::new();

    for SegmentWithSource { segment, source_file } in rows {
        let Some(&score) = scores.get(&segment.id) else { continue };
        let slot = *slots.entry(source_file.id).or_insert_with(|| {
            groups.push(VideoSearchResult {
                video_id: source_file.id,
                video_url: urls.url_for(&source_file.filename),
                filename: source_file.filename.clone(),
                author: source_file.author.clone(),
                created_at: source_file.created_at,
                metadata_info: source_file.metadata_info.clone(),
                children: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].children.push(SubtitleChild {
            segment_id: segment.id,
            text: segment.content,
            start_seconds: segment.custom.start_seconds,
            end_seconds: segment.custom.end_seconds,
            score,
            custom: segment.custom,
        });
    }

    for group in &mut groups {
        // Stable, so input order breaks the remaining ties.
        group.children.sort_by(|a, b| {
            a.start_seconds
                .total_cmp(&b.start_seconds)
                .then_with(|| a.custom.original_index.cmp(&b.custom.original_index))
        });
    }
    groups.sort_by(compare_groups);
    groups
}

fn compare_groups(a: &VideoSearchResult, b: &VideoSearchResult) -> Ordering {
    b.representative_score()
        .total_cmp(&a.representative_score())
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.video_id.cmp(&b.video_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vidseek_core::types::{Segment, SegmentAttributes, SegmentKind, SourceFile};

    fn source(n: u128, created_ms: i64, name: &str) -> SourceFile {
        SourceFile {
            id: SourceFileId(uuid::Uuid::from_u128(n)),
            filename: name.into(),
            file_type: "video/mp4".into(),
            file_path: None,
            author: Some("unknown".into()),
            created_at: Utc.timestamp_millis_opt(created_ms).single().expect("valid ms"),
            metadata_info: None,
        }
    }

    fn row(file: &SourceFile, start: f64, index: usize) -> SegmentWithSource {
        SegmentWithSource {
            segment: Segment {
                id: SegmentId::generate(),
                source_file_id: file.id,
                kind: SegmentKind::Subtitle,
                content: format!("{} @ {start}", file.filename),
                custom: SegmentAttributes::new(start, start + 1.0, index),
            },
            source_file: file.clone(),
        }
    }

    #[test]
    fn children_in_playback_order_and_best_score_represents() {
        let file = source(1, 0, "a.mp4");
        let rows = vec![row(&file, 12.5, 0), row(&file, 0.0, 1), row(&file, 40.0, 2)];
        let scores: HashMap<_, _> = rows.iter().zip([0.5f32, 0.9, 0.7]).map(|(r, s)| (r.segment.id, s)).collect();

        let groups = group_and_rank(rows, &scores, &PlaybackUrls::default());
        assert_eq!(groups.len(), 1);
        let starts: Vec<f64> = groups[0].children.iter().map(|c| c.start_seconds).collect();
        assert_eq!(starts, vec![0.0, 12.5, 40.0]);
        assert_eq!(groups[0].representative_score(), 0.9);
        assert_eq!(groups[0].video_url, "/static/videos/a.mp4");
    }

    #[test]
    fn equal_scores_fall_back_to_creation_then_id() {
        let older = source(9, 1_000, "older.mp4");
        let newer_low_id = source(1, 2_000, "newer-low.mp4");
        let newer_high_id = source(5, 2_000, "newer-high.mp4");
        let rows = vec![row(&newer_high_id, 0.0, 0), row(&newer_low_id, 0.0, 0), row(&older, 0.0, 0)];
        let scores: HashMap<_, _> = rows.iter().map(|r| (r.segment.id, 0.8f32)).collect();

        let groups = group_and_rank(rows, &scores, &PlaybackUrls::default());
        let names: Vec<&str> = groups.iter().map(|g| g.filename.as_str()).collect();
        assert_eq!(names, vec!["older.mp4", "newer-low.mp4", "newer-high.mp4"]);
    }

    #[test]
    fn same_start_orders_by_original_index() {
        let file = source(1, 0, "a.mp4");
        let rows = vec![row(&file, 5.0, 3), row(&file, 5.0, 1)];
        let scores: HashMap<_, _> = rows.iter().map(|r| (r.segment.id, 0.5f32)).collect();
        let groups = group_and_rank(rows, &scores, &PlaybackUrls::default());
        let order: Vec<usize> = groups[0].children.iter().map(|c| c.custom.original_index).collect();
        assert_eq!(order, vec![1, 3]);
    }

    #[test]
    fn playback_urls_join_with_one_slash() {
        assert_eq!(PlaybackUrls::new("/media/").url_for("clip.mkv"), "/media/clip.mkv");
        assert_eq!(PlaybackUrls::new("http://host/v").url_for("/x.mp4"), "http://host/v/x.mp4");
    }
}
