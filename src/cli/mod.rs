//! Command-line interface for scribed.
//!
//! Provides commands for running the ingestion scheduler, inspecting
//! recording status, registering uploads, operator status resets, and
//! transcript row edits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::adapters::{FfmpegEncoder, FsObjectStore, VendorSttClient};
use crate::config::Settings;
use crate::core::scheduler::{Scheduler, SchedulerConfig};
use crate::domain::FileStatus;
use crate::store::TranscriptStore;

/// scribed - voice recording ingestion pipeline
#[derive(Parser, Debug)]
#[command(name = "scribed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingestion scheduler until interrupted
    Run {
        /// Override the poll interval in seconds
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Run a single ingestion cycle and exit
    Tick,

    /// Show recording counts per status
    Status,

    /// Register an uploaded recording for pipeline pickup
    Register {
        /// Owner of the recording
        #[arg(long)]
        owner: String,

        /// Object-store key of the uploaded blob
        #[arg(long)]
        key: String,
    },

    /// Force a recording's status (operator recovery)
    Reset {
        /// Recording ID
        id: String,

        /// Status to set
        #[arg(long, default_value = "READY")]
        to: String,
    },

    /// Inspect or edit a transcript
    #[command(subcommand)]
    Transcript(TranscriptCommands),
}

#[derive(Subcommand, Debug)]
pub enum TranscriptCommands {
    /// Print a recording's transcript in order
    Show {
        /// Recording ID
        id: String,
    },

    /// Duplicate the row at POSITION into POSITION+1, shifting later rows up
    InsertAt {
        /// Recording ID
        id: String,

        /// 1-based transcript position
        position: i64,
    },

    /// Delete the row at POSITION, shifting later rows down
    DeleteAt {
        /// Recording ID
        id: String,

        /// 1-based transcript position
        position: i64,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load(self.config.as_deref())?;

        match self.command {
            Commands::Run { interval_secs } => execute_run(settings, interval_secs).await,
            Commands::Tick => execute_tick(settings).await,
            Commands::Status => execute_status(settings),
            Commands::Register { owner, key } => execute_register(settings, &owner, &key),
            Commands::Reset { id, to } => execute_reset(settings, &id, &to),
            Commands::Transcript(command) => execute_transcript(settings, command),
        }
    }
}

/// Build the scheduler with its injected adapters
fn build_scheduler(settings: &Settings, interval_secs: Option<u64>) -> Result<Scheduler> {
    let stt_settings = settings
        .stt
        .as_ref()
        .context("No STT endpoint configured (set stt.endpoint or SCRIBED_STT_ENDPOINT)")?;

    let store = Arc::new(open_store(settings)?);
    let objects = Arc::new(FsObjectStore::new(&settings.object_root));
    let encoder = Arc::new(FfmpegEncoder::with_paths(
        settings.ffmpeg.clone(),
        settings.ffprobe.clone(),
        settings.bitrate.clone(),
    ));
    let stt = Arc::new(
        VendorSttClient::new(
            stt_settings.endpoint.clone(),
            stt_settings.api_key.clone(),
            stt_settings.language.clone(),
        )
        .context("Failed to build STT client")?,
    );

    let poll_interval = interval_secs
        .map(std::time::Duration::from_secs)
        .unwrap_or(settings.poll_interval);

    Ok(Scheduler::new(
        store,
        objects,
        encoder,
        stt,
        SchedulerConfig {
            scratch_dir: settings.scratch_dir.clone(),
            poll_interval,
            stt_timeout: stt_settings.timeout,
            splitter: settings.splitter.clone(),
        },
    ))
}

fn open_store(settings: &Settings) -> Result<TranscriptStore> {
    if let Some(parent) = settings.database.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    TranscriptStore::open(&settings.database)
        .with_context(|| format!("Failed to open database {}", settings.database.display()))
}

async fn execute_run(settings: Settings, interval_secs: Option<u64>) -> Result<()> {
    let scheduler = build_scheduler(&settings, interval_secs)?;
    scheduler.run().await
}

async fn execute_tick(settings: Settings) -> Result<()> {
    let scheduler = build_scheduler(&settings, None)?;
    let report = scheduler.tick().await?;

    println!();
    println!("Ingestion cycle:");
    println!("  Processed:      {}", report.processed);
    println!("  Completed:      {}", report.completed);
    println!("  Convert errors: {}", report.convert_errors);
    println!("  STT errors:     {}", report.stt_errors);
    println!("  Deferred:       {}", report.deferred);

    Ok(())
}

fn execute_status(settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let counts = store.status_counts()?;

    println!();
    println!("Recordings");
    println!("══════════════════════════════════");
    println!("  READY:         {}", counts.ready);
    println!("  COMPLETED:     {}", counts.completed);
    println!("  CONVERT_ERROR: {}", counts.convert_error);
    println!("  STT_ERROR:     {}", counts.stt_error);
    if counts.unknown > 0 {
        println!("  (unknown):     {}", counts.unknown);
    }
    println!("  Total:         {}", counts.total());
    println!();
    println!("Database: {}", settings.database.display());

    Ok(())
}

fn execute_register(settings: Settings, owner: &str, key: &str) -> Result<()> {
    let store = open_store(&settings)?;
    let recording = store.insert_recording(owner, key)?;

    println!(
        "Registered {} ({} → {})",
        recording.id, recording.owner_id, recording.storage_key
    );
    Ok(())
}

fn execute_reset(settings: Settings, id: &str, to: &str) -> Result<()> {
    let store = open_store(&settings)?;
    let id = parse_recording_id(id)?;
    let to: FileStatus = to
        .parse()
        .with_context(|| format!("'{}' is not a valid status", to))?;

    store.reset_status(id, to)?;
    println!("Recording {} reset to {}", id, to);
    Ok(())
}

fn execute_transcript(settings: Settings, command: TranscriptCommands) -> Result<()> {
    let store = open_store(&settings)?;

    match command {
        TranscriptCommands::Show { id } => {
            let id = parse_recording_id(&id)?;
            let rows = store.utterances(id)?;

            if rows.is_empty() {
                println!("No transcript for {}", id);
                return Ok(());
            }

            for row in rows {
                println!(
                    "{:>4}  [{:>8}ms - {:>8}ms]  {:<8}  {}",
                    row.position, row.start_ms, row.end_ms, row.speaker, row.text_edited
                );
            }
        }
        TranscriptCommands::InsertAt { id, position } => {
            let id = parse_recording_id(&id)?;
            let created = store.insert_at(id, position)?;
            println!(
                "Inserted row {} at position {}",
                created.id, created.position
            );
        }
        TranscriptCommands::DeleteAt { id, position } => {
            let id = parse_recording_id(&id)?;
            store.delete_at(id, position)?;
            println!("Deleted row at position {}", position);
        }
    }

    Ok(())
}

fn parse_recording_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("'{}' is not a valid recording ID", id))
}
