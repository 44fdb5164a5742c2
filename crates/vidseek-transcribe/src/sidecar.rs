use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use vidseek_core::traits::Segmenter;
use vidseek_core::types::TranscriptSpan;

use crate::subtitles::{parse_subtitles, SubtitleFormat};

/// Reads `<stem>.srt` or `<stem>.vtt` next to the video, in that order.
#[derive(Debug, Clone, Default)]
pub struct SidecarSegmenter;

impl SidecarSegmenter {
    pub fn new() -> Self {
        Self
    }

    pub fn find_sidecar(video: &Path) -> Option<(PathBuf, SubtitleFormat)> {
        ["srt", "vtt", "SRT", "VTT"].iter().find_map(|ext| {
            let candidate = video.with_extension(ext);
            let format = SubtitleFormat::from_extension(ext)?;
            candidate.is_file().then_some((candidate, format))
        })
    }
}

#[async_trait]
impl Segmenter for SidecarSegmenter {
    async fn transcribe(&self, path: &Path) -> Result<Vec<TranscriptSpan>> {
        let (sidecar, format) =
            Self::find_sidecar(path).ok_or_else(|| anyhow!("no .srt or .vtt subtitles next to {}", path.display()))?;
        let raw = tokio::fs::read(&sidecar).await.with_context(|| format!("reading {}", sidecar.display()))?;
        let text = String::from_utf8_lossy(&raw);
        let spans = parse_subtitles(&text, format).with_context(|| format!("parsing {}", sidecar.display()))?;
        tracing::debug!(file = %sidecar.display(), spans = spans.len(), "read sidecar subtitles");
        Ok(spans)
    }
}
