//! Segmenter adapters: sidecar subtitle files and an external transcriber
//! command.

use std::sync::Arc;
use std::time::Duration;

use vidseek_core::config::{TranscribeMode, TranscribeSettings};
use vidseek_core::traits::Segmenter;
use vidseek_core::Error;

pub mod command;
pub mod sidecar;
pub mod subtitles;

pub use command::CommandSegmenter;
pub use sidecar::SidecarSegmenter;
pub use subtitles::{parse_subtitles, SubtitleFormat};

pub fn segmenter_from_settings(settings: &TranscribeSettings) -> Result<Arc<dyn Segmenter>, Error> {
    match settings.mode {
        TranscribeMode::Sidecar => Ok(Arc::new(SidecarSegmenter::new())),
        TranscribeMode::Command => {
            let program = settings
                .command
                .clone()
                .filter(|c| !c.is_empty())
                .ok_or_else(|| Error::InvalidConfig("transcribe.command is required in command mode".into()))?;
            let timeout = Duration::from_secs(settings.timeout_secs);
            Ok(Arc::new(CommandSegmenter::new(program, settings.args.clone(), timeout)))
        }
    }
}
