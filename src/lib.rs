//! scribed - voice recording ingestion pipeline
//!
//! Converts uploaded voice recordings to a canonical codec, transcribes
//! them through an external vendor, and stores the returned utterances as
//! an ordered, editable transcript.
//!
//! # Architecture
//!
//! A single cooperative scheduler polls for READY recordings and drives
//! each one, strictly sequentially, through:
//!
//! ```text
//! object store → encoder → object store → vendor STT → normalizer
//!     (download)  (ffmpeg)   (replace)                     ↓
//!                                         (optional) sentence splitter
//!                                                          ↓
//!                                             transcript store (SQLite)
//! ```
//!
//! Per recording, transcript positions are 1-based and contiguous; the
//! store preserves that through the batch commit and through the
//! insert/delete row edits.
//!
//! # Modules
//!
//! - `adapters`: external systems (object store, encoder, vendor STT)
//! - `core`: normalization, splitting, and the ingestion scheduler
//! - `domain`: data structures (Recording, FileStatus, Utterance)
//! - `store`: SQLite transcript persistence and ordering operations
//! - `cli`: command-line interface

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod store;

// Re-export main types at crate root for convenience
pub use adapters::{
    AudioEncoder, EncodeError, FfmpegEncoder, FsObjectStore, ObjectStore, ObjectStoreError,
    SpeechToText, SttError, VendorSttClient,
};
pub use config::Settings;
pub use core::normalize::{normalize, FieldMap, NormalizeError};
pub use core::scheduler::{CycleReport, PipelineError, Scheduler, SchedulerConfig};
pub use core::splitter::{explode, split_clauses, SplitField, SplitterConfig};
pub use domain::{FileStatus, Recording, Segment, Utterance};
pub use store::{StatusCounts, StoreError, TranscriptStore};
