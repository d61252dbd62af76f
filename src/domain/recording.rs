//! Recording metadata and pipeline status.
//!
//! A Recording is created when a user uploads audio (outside this crate)
//! and is then mutated only by the ingestion pipeline until it reaches a
//! terminal status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Pipeline status of an uploaded recording.
///
/// `Ready` is the initial state. All other states are terminal for the
/// pipeline: there is no automatic transition out of them, and recovery
/// requires an operator reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    /// Uploaded and awaiting pipeline pickup
    Ready,

    /// The external encoder failed on this recording
    ConvertError,

    /// The vendor STT call failed or returned an unusable result
    SttError,

    /// Transcription finished; the full utterance batch is persisted
    Completed,
}

impl FileStatus {
    /// Database / wire representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::ConvertError => "CONVERT_ERROR",
            Self::SttError => "STT_ERROR",
            Self::Completed => "COMPLETED",
        }
    }

    /// Whether the pipeline is done with this recording
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Ready)
    }

    /// Whether the pipeline may move a recording from `self` to `to`.
    ///
    /// Only READY recordings are picked up, so READY is the only state
    /// with outgoing transitions. Operator resets bypass this check.
    pub fn can_transition(self, to: FileStatus) -> bool {
        matches!(
            (self, to),
            (
                Self::Ready,
                Self::Completed | Self::ConvertError | Self::SttError
            )
        )
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown file status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for FileStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(Self::Ready),
            "CONVERT_ERROR" => Ok(Self::ConvertError),
            "STT_ERROR" => Ok(Self::SttError),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// An uploaded voice recording tracked through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Unique identifier
    pub id: Uuid,

    /// Opaque owner reference resolved by the upload/auth collaborators
    pub owner_id: String,

    /// Object-store key of the current audio blob
    pub storage_key: String,

    /// Current pipeline status
    pub status: FileStatus,

    /// Playback duration in whole seconds, known after transcoding
    pub duration_secs: Option<u32>,

    /// When the recording was registered
    pub created_at: DateTime<Utc>,

    /// Whether the transcript has been manually edited
    pub edited: bool,

    /// When the transcript was last manually edited
    pub edited_at: Option<DateTime<Utc>>,
}

impl Recording {
    /// Create a new recording in the READY state
    pub fn new(owner_id: impl Into<String>, storage_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            storage_key: storage_key.into(),
            status: FileStatus::Ready,
            duration_secs: None,
            created_at: Utc::now(),
            edited: false,
            edited_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            FileStatus::Ready,
            FileStatus::ConvertError,
            FileStatus::SttError,
            FileStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<FileStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_serde_uses_wire_names() {
        let json = serde_json::to_string(&FileStatus::ConvertError).unwrap();
        assert_eq!(json, "\"CONVERT_ERROR\"");
    }

    #[test]
    fn test_unknown_status_is_an_error() {
        assert!("PROCESSING".parse::<FileStatus>().is_err());
    }

    #[test]
    fn test_transitions_leave_ready_only() {
        use FileStatus::*;

        assert!(Ready.can_transition(Completed));
        assert!(Ready.can_transition(ConvertError));
        assert!(Ready.can_transition(SttError));

        for terminal in [Completed, ConvertError, SttError] {
            assert!(terminal.is_terminal());
            for to in [Ready, Completed, ConvertError, SttError] {
                assert!(!terminal.can_transition(to));
            }
        }
        assert!(!Ready.can_transition(Ready));
    }

    #[test]
    fn test_new_recording_is_ready() {
        let recording = Recording::new("user-1", "audio/251101_user-1.webm");
        assert_eq!(recording.status, FileStatus::Ready);
        assert!(recording.duration_secs.is_none());
        assert!(!recording.edited);
    }
}
