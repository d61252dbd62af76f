//! Transcript rows and normalized vendor segments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One timed span of transcribed speech within a recording's transcript.
///
/// `position` is 1-based and contiguous per recording: the set of
/// positions for a recording is always exactly `1..=N`. The store is the
/// only writer and preserves this through every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Unique identifier
    pub id: Uuid,

    /// Owning recording
    pub recording_id: Uuid,

    /// 1-based position within the transcript
    pub position: i64,

    /// Span start, milliseconds from the start of the recording
    pub start_ms: i64,

    /// Span end, milliseconds from the start of the recording
    pub end_ms: i64,

    /// Raw vendor transcription
    pub text: String,

    /// Editable transcription shown to users
    pub text_edited: String,

    /// Vendor confidence in [0, 1]
    pub confidence: f64,

    /// Diarized speaker label
    pub speaker: String,

    /// Speech-act classification, owned by out-of-scope features
    pub act_id: Option<i64>,

    /// Follow-up prompt classification, owned by out-of-scope features
    pub followup_id: Option<i64>,

    /// When the row was created
    pub created_at: DateTime<Utc>,
}

/// A normalized vendor segment, not yet assigned a transcript position.
///
/// Produced by the normalizer from raw vendor records, optionally
/// multiplied by the sentence splitter, and persisted in bulk when a
/// recording completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub text_edited: String,
    pub confidence: f64,
    pub speaker: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_serialization() {
        let segment = Segment {
            start_ms: 1200,
            end_ms: 4800,
            text: "hello there".to_string(),
            text_edited: "Hello there.".to_string(),
            confidence: 0.93,
            speaker: "1".to_string(),
        };

        let json = serde_json::to_string(&segment).unwrap();
        let parsed: Segment = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, segment);
    }
}
