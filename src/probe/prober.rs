//! Stream probe invoker.
//!
//! Wraps an external `ffprobe` invocation: spawn, bounded wait, JSON parse,
//! first video stream wins. Failures of any kind surface as "no result";
//! the caller decides whether to try another candidate URL.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::models::StreamMeta;
use crate::utils::parse_frame_rate;

/// External stream inspection, synchronous from the caller's point of view
/// and bounded by an internal timeout.
#[async_trait]
pub trait StreamProber: Send + Sync {
    /// Probe one stream URL. `Ok(None)` means the stream yielded no usable
    /// video descriptor; errors mean the probe itself could not run.
    async fn probe(&self, url: &str) -> Result<Option<StreamMeta>>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStreamData>,
}

#[derive(Debug, Deserialize)]
struct ProbeStreamData {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    r_frame_rate: Option<String>,
}

impl ProbeOutput {
    fn video_stream(&self) -> Option<&ProbeStreamData> {
        self.streams
            .iter()
            .find(|stream| stream.codec_type.as_deref() == Some("video"))
    }
}

/// ffprobe-backed [`StreamProber`].
pub struct FfprobeProber {
    ffprobe_command: String,
    probe_timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe_command: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            ffprobe_command: ffprobe_command.into(),
            probe_timeout,
        }
    }

    fn parse_output(raw: &[u8]) -> Result<Option<StreamMeta>> {
        let output: ProbeOutput = serde_json::from_slice(raw)
            .map_err(|e| anyhow!("failed to parse ffprobe output: {e}"))?;

        let Some(stream) = output.video_stream() else {
            return Ok(None);
        };
        Ok(Some(StreamMeta {
            width: stream.width.unwrap_or(0),
            height: stream.height.unwrap_or(0),
            frame_rate: stream
                .r_frame_rate
                .as_deref()
                .map(parse_frame_rate)
                .unwrap_or(0),
        }))
    }
}

#[async_trait]
impl StreamProber for FfprobeProber {
    async fn probe(&self, url: &str) -> Result<Option<StreamMeta>> {
        debug!("probing stream: {url}");

        let mut cmd = Command::new(&self.ffprobe_command);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-i",
            url,
        ]);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::null());

        let output = tokio::time::timeout(self.probe_timeout, cmd.output())
            .await
            .map_err(|_| anyhow!("ffprobe timeout after {:?}", self.probe_timeout))?
            .map_err(|e| anyhow!("failed to execute ffprobe: {e}"))?;

        if output.stdout.is_empty() {
            return Ok(None);
        }
        Self::parse_output(&output.stdout)
    }
}
