//! Terminal output for `vidseek search`.

use vidseek_core::types::{SegmentMatch, VideoSearchResult};

const RULE: &str = "--------------------------------------------------";

/// `mm:ss`, minutes not wrapped at the hour.
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let whole = seconds.floor() as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

pub fn render_matches(matches: &[SegmentMatch]) -> String {
    let mut lines = vec![format!("\nFound {} matches:\n", matches.len()), RULE.to_string()];
    for m in matches {
        let start = m.segment.custom.start_seconds;
        lines.push(format!("File:  {}", m.source_file.filename));
        lines.push(format!("Type:  {}", m.segment.kind.as_str()));
        lines.push(format!("Time:  {} (s: {start:.2})", format_timestamp(start)));
        lines.push(format!("Text:  {}", m.segment.content));
        lines.push(format!("Score: {:.4}", m.score));
        lines.push(RULE.to_string());
    }
    lines.join("\n")
}

pub fn render_grouped(results: &[VideoSearchResult]) -> String {
    let mut lines = vec![format!("\n🎬 Found {} videos:\n", results.len())];
    for (i, video) in results.iter().enumerate() {
        lines.push(format!(
            "  {}. {}  best={:.4}  url={}",
            i + 1,
            video.filename,
            video.representative_score(),
            video.video_url
        ));
        for child in &video.children {
            lines.push(format!(
                "     [{}-{}] {:.4}  {}",
                format_timestamp(child.start_seconds),
                format_timestamp(child.end_seconds),
                child.score,
                child.text
            ));
        }
    }
    lines.join("\n")
}
