//! Persistence layer.
//!
//! The transcript store owns the only database connection and is the sole
//! writer of recordings and utterance rows.

pub mod transcript;

// Re-export commonly used types
pub use transcript::{StatusCounts, StoreError, TranscriptStore};
