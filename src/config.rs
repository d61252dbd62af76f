//! Service configuration.
//!
//! Sources (highest priority first):
//! 1. Environment variables (SCRIBED_HOME, SCRIBED_STT_ENDPOINT, SCRIBED_STT_API_KEY)
//! 2. YAML config file (--config flag, SCRIBED_CONFIG, or ./scribed.yaml)
//! 3. Defaults under ~/.scribed
//!
//! The resolved [`Settings`] value is built once in `main` and handed to
//! the components that need it; nothing reads configuration through
//! global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::splitter::SplitterConfig;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// SQLite database path
    pub database: Option<String>,

    /// Directory for ephemeral download/encode files
    pub scratch_dir: Option<String>,

    /// Root directory of the filesystem object store
    pub object_root: Option<String>,

    /// Seconds between ingestion cycles
    pub poll_interval_secs: Option<u64>,

    #[serde(default)]
    pub encoder: EncoderConfig,

    pub stt: Option<SttConfig>,

    #[serde(default)]
    pub splitter: Option<SplitterConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncoderConfig {
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
    pub bitrate: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SttConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Resolved vendor STT settings
#[derive(Debug, Clone)]
pub struct SttSettings {
    pub endpoint: String,
    pub api_key: String,
    pub language: String,
    pub timeout: Duration,
}

/// Resolved configuration with defaults applied
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: PathBuf,
    pub scratch_dir: PathBuf,
    pub object_root: PathBuf,
    pub poll_interval: Duration,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub bitrate: String,
    /// None until an STT endpoint is configured; commands that drive the
    /// pipeline refuse to start without it
    pub stt: Option<SttSettings>,
    pub splitter: SplitterConfig,
}

impl Settings {
    /// Load settings, optionally from an explicit config file path
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file = match find_config_file(config_path) {
            Some(path) => load_config_file(&path)?,
            None => ConfigFile::default(),
        };

        Ok(Self::resolve(file))
    }

    /// Apply env overrides and defaults to a raw config file
    fn resolve(file: ConfigFile) -> Self {
        let home = home_dir();

        let database = file
            .database
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("scribed.db"));
        let scratch_dir = file
            .scratch_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("scratch"));
        let object_root = file
            .object_root
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("objects"));

        let endpoint = std::env::var("SCRIBED_STT_ENDPOINT")
            .ok()
            .or_else(|| file.stt.as_ref().map(|stt| stt.endpoint.clone()));
        let api_key = std::env::var("SCRIBED_STT_API_KEY")
            .ok()
            .or_else(|| file.stt.as_ref().and_then(|stt| stt.api_key.clone()));

        let stt = endpoint.map(|endpoint| SttSettings {
            endpoint,
            api_key: api_key.unwrap_or_default(),
            language: file
                .stt
                .as_ref()
                .and_then(|stt| stt.language.clone())
                .unwrap_or_else(|| "ko-KR".to_string()),
            timeout: Duration::from_secs(
                file.stt
                    .as_ref()
                    .and_then(|stt| stt.timeout_secs)
                    .unwrap_or(120),
            ),
        });

        Self {
            database,
            scratch_dir,
            object_root,
            poll_interval: Duration::from_secs(file.poll_interval_secs.unwrap_or(600)),
            ffmpeg: file.encoder.ffmpeg.unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe: file.encoder.ffprobe.unwrap_or_else(|| "ffprobe".to_string()),
            bitrate: file.encoder.bitrate.unwrap_or_else(|| "192k".to_string()),
            stt,
            splitter: file.splitter.unwrap_or_default(),
        }
    }
}

/// Home directory for scribed state ($SCRIBED_HOME or ~/.scribed)
fn home_dir() -> PathBuf {
    if let Ok(home) = std::env::var("SCRIBED_HOME") {
        return PathBuf::from(home);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scribed")
}

/// Locate the config file: explicit flag, then SCRIBED_CONFIG, then
/// ./scribed.yaml if present
fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("SCRIBED_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let local = PathBuf::from("scribed.yaml");
    local.exists().then_some(local)
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
