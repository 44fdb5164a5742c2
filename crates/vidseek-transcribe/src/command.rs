//! Segmenter that shells out to an external transcriber.
//!
//! The program receives the video path as its last argument and must print
//! JSON to stdout: either `[{"text", "start", "end"}, ...]` or Whisper's
//! `{"segments": [...]}` shape.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use vidseek_core::traits::Segmenter;
use vidseek_core::types::TranscriptSpan;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Characters of stderr quoted in error messages.
const STDERR_EXCERPT: usize = 500;

#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriberOutput {
    Spans(Vec<TranscriptSpan>),
    Whisper { segments: Vec<TranscriptSpan> },
}

impl CommandSegmenter {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args, timeout }
    }

    async fn run(&self, path: &Path) -> Result<Vec<u8>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn().with_context(|| format!("spawning '{}'", self.program))?;

        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        // On timeout `child` is dropped and killed.
        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.context("waiting for transcriber")?,
            Err(_elapsed) => bail!("transcriber timed out after {}s", self.timeout.as_secs()),
        };
        let stdout = stdout_task.await.context("stdout reader failed")?.context("reading transcriber stdout")?;
        let stderr = stderr_task.await.context("stderr reader failed")?.context("reading transcriber stderr")?;
        tracing::debug!(
            program = %self.program,
            ms = start.elapsed().as_millis() as u64,
            stdout_bytes = stdout.bytes.len(),
            "transcriber finished"
        );

        if stdout.overflowed {
            bail!("transcriber output exceeds {} MiB", MAX_OUTPUT_BYTES / (1024 * 1024));
        }
        let (stdout, stderr) = (stdout.bytes, stderr.bytes);
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            bail!("transcriber exited with {}: {}", status.code().map_or("signal".to_string(), |c| c.to_string()), excerpt);
        }
        Ok(stdout)
    }
}

/// Parse transcriber stdout in either supported shape.
pub fn parse_transcriber_output(stdout: &[u8]) -> Result<Vec<TranscriptSpan>> {
    let output: TranscriberOutput =
        serde_json::from_slice(stdout).map_err(|e| anyhow!("unparsable transcriber output: {e}"))?;
    Ok(match output {
        TranscriberOutput::Spans(spans) => spans,
        TranscriberOutput::Whisper { segments } => segments,
    })
}

#[derive(Default)]
struct Captured {
    bytes: Vec<u8>,
    /// More than `MAX_OUTPUT_BYTES` arrived; `bytes` holds the first part.
    overflowed: bool,
}

/// Keep up to `MAX_OUTPUT_BYTES` and drain the rest, so the child never
/// blocks on a full pipe or dies of a closed one.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> std::io::Result<Captured> {
    let mut captured = Captured::default();
    let Some(mut handle) = handle else { return Ok(captured) };
    (&mut handle).take(MAX_OUTPUT_BYTES as u64 + 1).read_to_end(&mut captured.bytes).await?;
    if captured.bytes.len() > MAX_OUTPUT_BYTES {
        captured.bytes.truncate(MAX_OUTPUT_BYTES);
        captured.overflowed = true;
        tokio::io::copy(&mut handle, &mut tokio::io::sink()).await?;
    }
    Ok(captured)
}

#[async_trait]
impl Segmenter for CommandSegmenter {
    async fn transcribe(&self, path: &Path) -> Result<Vec<TranscriptSpan>> {
        let stdout = self.run(path).await?;
        parse_transcriber_output(&stdout)
    }
}
