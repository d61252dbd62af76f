//! External audio encoder.
//!
//! Shells out to ffmpeg to convert raw uploads to the canonical codec,
//! and to ffprobe for the encoded file's duration.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Errors from the external encoding utility.
///
/// Any of these is terminal for the recording being processed: the
/// pipeline marks it CONVERT_ERROR and does not retry.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("Could not read duration from probe output: {0}")]
    Probe(String),
}

/// Converts audio to the canonical codec and reports duration
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    /// Encode `input` into the canonical codec at `output`
    async fn encode(&self, input: &Path, output: &Path) -> Result<(), EncodeError>;

    /// Duration of an encoded file, rounded to whole seconds
    async fn duration_secs(&self, path: &Path) -> Result<u32, EncodeError>;

    /// File extension this encoder produces
    fn target_extension(&self) -> &str;
}

/// Encoder backed by the ffmpeg / ffprobe binaries
pub struct FfmpegEncoder {
    ffmpeg: String,
    ffprobe: String,
    bitrate: String,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            bitrate: "192k".to_string(),
        }
    }

    pub fn with_paths(
        ffmpeg: impl Into<String>,
        ffprobe: impl Into<String>,
        bitrate: impl Into<String>,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            bitrate: bitrate.into(),
        }
    }
}

#[async_trait]
impl AudioEncoder for FfmpegEncoder {
    async fn encode(&self, input: &Path, output: &Path) -> Result<(), EncodeError> {
        let result = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-acodec", "aac", "-b:a", &self.bitrate])
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| EncodeError::Spawn {
                program: self.ffmpeg.clone(),
                source: e,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(EncodeError::Failed {
                program: self.ffmpeg.clone(),
                code: result.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }

    async fn duration_secs(&self, path: &Path) -> Result<u32, EncodeError> {
        let result = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| EncodeError::Spawn {
                program: self.ffprobe.clone(),
                source: e,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(EncodeError::Failed {
                program: self.ffprobe.clone(),
                code: result.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&result.stdout);
        parse_duration_secs(&stdout)
    }

    fn target_extension(&self) -> &str {
        "m4a"
    }
}

/// Parse ffprobe's `format=duration` output into whole seconds
fn parse_duration_secs(output: &str) -> Result<u32, EncodeError> {
    let seconds: f64 = output
        .trim()
        .parse()
        .map_err(|_| EncodeError::Probe(output.trim().to_string()))?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(EncodeError::Probe(output.trim().to_string()));
    }

    Ok(seconds.round() as u32)
}
