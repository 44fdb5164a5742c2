//! SubRip (`.srt`) and WebVTT (`.vtt`) cue parsing.

use anyhow::{anyhow, bail, Result};

use vidseek_core::types::TranscriptSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::Vtt),
            _ => None,
        }
    }
}

/// Cues in file order. Multi-line cue text is joined with spaces and inline
/// markup (`<i>`, `<c.color>`, `{\an8}`) is removed.
pub fn parse_subtitles(input: &str, format: SubtitleFormat) -> Result<Vec<TranscriptSpan>> {
    let input = input.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut blocks = input.split("\n\n").map(str::trim).filter(|b| !b.is_empty()).peekable();

    if format == SubtitleFormat::Vtt {
        match blocks.peek() {
            Some(first) if first.starts_with("WEBVTT") => {
                blocks.next();
            }
            _ => bail!("missing WEBVTT header"),
        }
    }

    let mut spans = Vec::new();
    for block in blocks {
        if format == SubtitleFormat::Vtt && (block.starts_with("NOTE") || block.starts_with("STYLE") || block.starts_with("REGION")) {
            continue;
        }
        let mut lines = block.lines();
        let Some(timing) = lines.by_ref().find(|l| l.contains("-->")) else {
            // Stray counter or identifier without a cue.
            continue;
        };
        let (start, end) = parse_timing(timing)?;
        let text = lines.map(strip_markup).filter(|l| !l.is_empty()).collect::<Vec<_>>().join(" ");
        spans.push(TranscriptSpan::new(text, start, end));
    }
    Ok(spans)
}

fn parse_timing(line: &str) -> Result<(f64, f64)> {
    let (left, right) = line.split_once("-->").ok_or_else(|| anyhow!("bad timing line '{line}'"))?;
    let start = parse_timestamp(left.trim())?;
    // VTT cue settings follow the end timestamp.
    let end_token = right.split_whitespace().next().ok_or_else(|| anyhow!("missing end time in '{line}'"))?;
    Ok((start, parse_timestamp(end_token)?))
}

/// `HH:MM:SS,mmm`, `HH:MM:SS.mmm` or `MM:SS.mmm` to seconds.
pub fn parse_timestamp(ts: &str) -> Result<f64> {
    let ts = ts.replace(',', ".");
    let parts: Vec<&str> = ts.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => bail!("bad timestamp '{ts}'"),
    };
    let h: f64 = h.trim().parse().map_err(|_| anyhow!("bad hours in '{ts}'"))?;
    let m: f64 = m.trim().parse().map_err(|_| anyhow!("bad minutes in '{ts}'"))?;
    let s: f64 = s.trim().parse().map_err(|_| anyhow!("bad seconds in '{ts}'"))?;
    Ok(h * 3600.0 + m * 60.0 + s)
}

fn strip_markup(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut depth: Option<char> = None;
    for c in line.chars() {
        match (depth, c) {
            (None, '<') => depth = Some('>'),
            (None, '{') => depth = Some('}'),
            (Some(close), c) if c == close => depth = None,
            (Some(_), _) => {}
            (None, c) => out.push(c),
        }
    }
    out.trim().to_string()
}
