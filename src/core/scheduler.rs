//! Ingestion scheduler.
//!
//! A single cooperative loop that drives READY recordings through
//! download → transcode → blob replacement → transcription →
//! normalization → optional splitting → atomic transcript commit.
//! Recordings are processed strictly sequentially so the vendor endpoint
//! and the local scratch disk are never hit concurrently by this process;
//! a slow recording blocks the rest of that cycle's queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use thiserror::Error;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{
    AudioEncoder, EncodeError, ObjectStore, ObjectStoreError, SpeechToText, SttError,
};
use crate::core::normalize::{normalize, NormalizeError};
use crate::core::splitter::{explode, SplitterConfig};
use crate::domain::{FileStatus, Recording};
use crate::store::{StoreError, TranscriptStore};

/// A failed pipeline run for one recording.
///
/// The variant decides the recording's fate: encoder failures are
/// terminal CONVERT_ERROR, vendor/normalization failures are terminal
/// STT_ERROR, and everything else leaves the recording READY to be
/// retried next cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Object store: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    #[error("Scratch file: {0}")]
    Scratch(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Stt(#[from] SttError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("STT request timed out after {0:?}")]
    SttTimeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome counters for one scheduler cycle.
///
/// `processed == 0` means the cycle found nothing READY — an idle cycle,
/// not a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: usize,
    pub completed: usize,
    pub convert_errors: usize,
    pub stt_errors: usize,
    /// Left READY for the next cycle (transient failure or timeout)
    pub deferred: usize,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.processed == 0
    }
}

/// Scheduler tuning, resolved from [`Settings`](crate::config::Settings)
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Directory for ephemeral download/encode files
    pub scratch_dir: PathBuf,

    /// Delay between ingestion cycles
    pub poll_interval: Duration,

    /// Upper bound on one vendor STT request
    pub stt_timeout: Duration,

    /// Optional sentence-splitting stage
    pub splitter: SplitterConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("scratch"),
            poll_interval: Duration::from_secs(600),
            stt_timeout: Duration::from_secs(120),
            splitter: SplitterConfig::default(),
        }
    }
}

/// Drives READY recordings through the ingestion pipeline
pub struct Scheduler {
    store: Arc<TranscriptStore>,
    objects: Arc<dyn ObjectStore>,
    encoder: Arc<dyn AudioEncoder>,
    stt: Arc<dyn SpeechToText>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<TranscriptStore>,
        objects: Arc<dyn ObjectStore>,
        encoder: Arc<dyn AudioEncoder>,
        stt: Arc<dyn SpeechToText>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            objects,
            encoder,
            stt,
            config,
        }
    }

    /// Run ingestion cycles forever, one per poll interval
    pub async fn run(&self) -> Result<()> {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            "Ingestion scheduler started"
        );

        loop {
            ticker.tick().await;

            match self.tick().await {
                Ok(report) if report.is_idle() => debug!("No recordings ready"),
                Ok(report) => info!(
                    processed = report.processed,
                    completed = report.completed,
                    convert_errors = report.convert_errors,
                    stt_errors = report.stt_errors,
                    deferred = report.deferred,
                    "Ingestion cycle finished"
                ),
                Err(e) => error!(error = %e, "Ingestion cycle failed"),
            }
        }
    }

    /// Run one ingestion cycle over everything currently READY.
    ///
    /// Recordings already COMPLETED or errored are excluded by the pickup
    /// query and are never reprocessed.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<CycleReport, StoreError> {
        let ready = self.store.list_by_status(FileStatus::Ready)?;
        let mut report = CycleReport::default();

        for recording in ready {
            report.processed += 1;

            match self.process(&recording).await {
                Ok(count) => {
                    report.completed += 1;
                    info!(
                        recording = %recording.id,
                        utterances = count,
                        "Recording transcribed"
                    );
                }
                Err(e) => self.settle_failure(&recording, e, &mut report),
            }
        }

        Ok(report)
    }

    /// Map a failed run onto the recording's next status.
    ///
    /// A timeout is not proof of terminal failure, so timed-out (and
    /// transiently failed) recordings stay READY for the next cycle.
    fn settle_failure(&self, recording: &Recording, error: PipelineError, report: &mut CycleReport) {
        let terminal = match &error {
            PipelineError::Encode(_) => Some(FileStatus::ConvertError),
            PipelineError::Stt(_) | PipelineError::Normalize(_) => Some(FileStatus::SttError),
            PipelineError::ObjectStore(_)
            | PipelineError::Scratch(_)
            | PipelineError::SttTimeout(_)
            | PipelineError::Store(_) => None,
        };

        match terminal {
            Some(status) => {
                warn!(recording = %recording.id, error = %error, status = %status, "Recording failed");
                match self.store.set_status(recording.id, status) {
                    Ok(()) => match status {
                        FileStatus::ConvertError => report.convert_errors += 1,
                        _ => report.stt_errors += 1,
                    },
                    Err(e) => {
                        // still READY; it will be retried next cycle
                        error!(recording = %recording.id, error = %e, "Failed to record error status");
                        report.deferred += 1;
                    }
                }
            }
            None => {
                warn!(recording = %recording.id, error = %error, "Recording deferred to next cycle");
                report.deferred += 1;
            }
        }
    }

    /// Run the full pipeline for one recording; returns the persisted
    /// utterance count.
    #[instrument(skip(self, recording), fields(recording = %recording.id))]
    async fn process(&self, recording: &Recording) -> Result<usize, PipelineError> {
        let raw = self.objects.get(&recording.storage_key).await?;

        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;
        let input = self.scratch_path(recording, extension_of(&recording.storage_key));
        tokio::fs::write(&input, &raw).await?;

        // an already-canonical upload (e.g. a retry after the blob was
        // replaced) must not encode onto its own input path
        let target = self.encoder.target_extension();
        let encoded = if extension_of(&recording.storage_key) == target {
            input.with_extension(format!("enc.{}", target))
        } else {
            input.with_extension(target)
        };
        if let Err(e) = self.encoder.encode(&input, &encoded).await {
            remove_scratch(&input).await;
            remove_scratch(&encoded).await;
            return Err(e.into());
        }
        remove_scratch(&input).await;

        let result = self.transcribe_and_commit(recording, &encoded).await;
        remove_scratch(&encoded).await;
        result
    }

    /// Everything after a successful encode: blob replacement, vendor
    /// call, normalization, optional split, atomic commit.
    async fn transcribe_and_commit(
        &self,
        recording: &Recording,
        encoded: &Path,
    ) -> Result<usize, PipelineError> {
        let duration_secs = self.encoder.duration_secs(encoded).await?;
        let bytes = tokio::fs::read(encoded).await?;

        // replace the raw blob with the canonical one
        let new_key = replace_extension(&recording.storage_key, self.encoder.target_extension());
        self.objects.put(&new_key, &bytes).await?;
        if new_key != recording.storage_key {
            self.objects.delete(&recording.storage_key).await?;
        }
        self.store
            .update_media(recording.id, &new_key, duration_secs)?;
        debug!(recording = %recording.id, key = %new_key, duration_secs, "Blob transcoded");

        let file_name = file_name_of(&new_key);
        let segments = match timeout(
            self.config.stt_timeout,
            self.stt.transcribe(bytes, &file_name),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(PipelineError::SttTimeout(self.config.stt_timeout)),
        };

        let mut rows = normalize(&segments)?;
        if self.config.splitter.enabled {
            rows = explode(rows, &self.config.splitter);
        }

        let count = self.store.complete_ingestion(recording.id, &rows)?;
        Ok(count)
    }

    /// Scratch files are timestamp + recording id; two runs of the same
    /// recording within one second would collide on the same path.
    fn scratch_path(&self, recording: &Recording, extension: &str) -> PathBuf {
        let stamp = Utc::now().format("%y%m%d%H%M%S");
        self.config
            .scratch_dir
            .join(format!("{}_{}.{}", stamp, recording.id, extension))
    }
}

/// Remove a scratch file, tolerating its absence
async fn remove_scratch(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
        }
    }
}

fn extension_of(key: &str) -> &str {
    Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin")
}

fn file_name_of(key: &str) -> String {
    Path::new(key)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| key.to_string())
}

fn replace_extension(key: &str, extension: &str) -> String {
    PathBuf::from(key)
        .with_extension(extension)
        .to_string_lossy()
        .to_string()
}
