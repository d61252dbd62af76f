//! Vendor segment normalization.
//!
//! Vendor STT segments arrive with unstable field names; only the value
//! types are informative. The mapping from field name to canonical role is
//! inferred once per batch, from the first segment, and applied to every
//! segment in the batch. An unrecognized shape is a typed error, never a
//! silent mis-mapping.
//!
//! Inference rules:
//! - of the two integer fields, the one holding the larger value in the
//!   first segment is the span end, the other the span start;
//! - the single float field is the confidence;
//! - of the two string fields, the one whose *name* contains "edited" is
//!   the editable text, the other the raw text;
//! - an object field with a name-like key is the speaker (the persisted
//!   label is its `label` value, falling back to `name`); other object
//!   fields are diarization metadata and are discarded;
//! - array fields are word-level timing detail and are discarded.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::Segment;

/// Typed rejection of a vendor batch whose shape cannot be mapped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Vendor batch is empty")]
    EmptyBatch,

    #[error("Segment {0} is not a JSON object")]
    NotAnObject(usize),

    #[error("Field '{0}' has a value type outside the vendor contract")]
    UnexpectedValue(String),

    #[error("Expected exactly two integer time fields, found {0}")]
    TimeFields(usize),

    #[error("Expected exactly one float confidence field, found {0}")]
    ConfidenceFields(usize),

    #[error("Expected two string text fields with exactly one named like 'edited', found {fields} string fields ({edited} edited)")]
    TextFields { fields: usize, edited: usize },

    #[error("No object field with a name-like key to use as speaker")]
    MissingSpeaker,

    #[error("Segment {index} is missing field '{field}'")]
    MissingField { index: usize, field: String },

    #[error("Segment {index} field '{field}' does not match the inferred type")]
    WrongType { index: usize, field: String },

    #[error("Segment {index} starts at {start_ms}ms but ends at {end_ms}ms")]
    TimeOrder {
        index: usize,
        start_ms: i64,
        end_ms: i64,
    },
}

/// Inferred mapping from vendor field names to canonical roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    pub start: String,
    pub end: String,
    pub confidence: String,
    pub text: String,
    pub text_edited: String,
    pub speaker: String,
}

impl FieldMap {
    /// Infer the field mapping from the first segment of a batch
    pub fn infer(first: &Map<String, Value>) -> Result<Self, NormalizeError> {
        let mut integers: Vec<(&String, i64)> = Vec::new();
        let mut floats: Vec<&String> = Vec::new();
        let mut strings: Vec<&String> = Vec::new();
        let mut speaker: Option<&String> = None;

        for (key, value) in first {
            match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => {
                    integers.push((key, n.as_i64().unwrap_or(i64::MAX)));
                }
                Value::Number(_) => floats.push(key),
                Value::String(_) => strings.push(key),
                Value::Object(fields) => {
                    if fields.keys().any(|k| k.to_lowercase().contains("name")) {
                        speaker.get_or_insert(key);
                    }
                    // other objects are diarization metadata, discarded
                }
                Value::Array(_) => {
                    // word-level timing detail, discarded
                }
                Value::Bool(_) | Value::Null => {
                    return Err(NormalizeError::UnexpectedValue(key.clone()));
                }
            }
        }

        if integers.len() != 2 {
            return Err(NormalizeError::TimeFields(integers.len()));
        }
        if floats.len() != 1 {
            return Err(NormalizeError::ConfidenceFields(floats.len()));
        }

        let edited: Vec<&&String> = strings
            .iter()
            .filter(|name| name.to_lowercase().contains("edited"))
            .collect();
        if strings.len() != 2 || edited.len() != 1 {
            return Err(NormalizeError::TextFields {
                fields: strings.len(),
                edited: edited.len(),
            });
        }
        let text_edited = edited[0].to_string();
        let text = strings
            .iter()
            .find(|name| !name.to_lowercase().contains("edited"))
            .map(|name| name.to_string())
            .ok_or(NormalizeError::TextFields {
                fields: strings.len(),
                edited: edited.len(),
            })?;

        let speaker = speaker.ok_or(NormalizeError::MissingSpeaker)?.to_string();

        // larger first-segment value is the span end
        let (start, end) = if integers[0].1 > integers[1].1 {
            (integers[1].0.to_string(), integers[0].0.to_string())
        } else {
            (integers[0].0.to_string(), integers[1].0.to_string())
        };

        Ok(Self {
            start,
            end,
            confidence: floats[0].to_string(),
            text,
            text_edited,
            speaker,
        })
    }
}

/// Normalize a raw vendor batch into canonical segments.
///
/// The batch order is preserved as-is: vendor output is assumed to be
/// chronological and is never re-sorted by start time.
pub fn normalize(batch: &[Value]) -> Result<Vec<Segment>, NormalizeError> {
    let first = batch.first().ok_or(NormalizeError::EmptyBatch)?;
    let first = first.as_object().ok_or(NormalizeError::NotAnObject(0))?;
    let map = FieldMap::infer(first)?;

    let mut segments = Vec::with_capacity(batch.len());
    for (index, record) in batch.iter().enumerate() {
        let fields = record
            .as_object()
            .ok_or(NormalizeError::NotAnObject(index))?;
        segments.push(apply(&map, fields, index)?);
    }

    Ok(segments)
}

/// Apply an inferred field map to one vendor segment
fn apply(
    map: &FieldMap,
    fields: &Map<String, Value>,
    index: usize,
) -> Result<Segment, NormalizeError> {
    let start_ms = integer_field(fields, &map.start, index)?;
    let end_ms = integer_field(fields, &map.end, index)?;

    if start_ms > end_ms {
        return Err(NormalizeError::TimeOrder {
            index,
            start_ms,
            end_ms,
        });
    }

    Ok(Segment {
        start_ms,
        end_ms,
        text: string_field(fields, &map.text, index)?,
        text_edited: string_field(fields, &map.text_edited, index)?,
        confidence: float_field(fields, &map.confidence, index)?,
        speaker: speaker_label(fields, &map.speaker, index)?,
    })
}

fn field<'a>(
    fields: &'a Map<String, Value>,
    name: &str,
    index: usize,
) -> Result<&'a Value, NormalizeError> {
    fields.get(name).ok_or_else(|| NormalizeError::MissingField {
        index,
        field: name.to_string(),
    })
}

fn integer_field(
    fields: &Map<String, Value>,
    name: &str,
    index: usize,
) -> Result<i64, NormalizeError> {
    field(fields, name, index)?
        .as_i64()
        .ok_or_else(|| NormalizeError::WrongType {
            index,
            field: name.to_string(),
        })
}

fn float_field(
    fields: &Map<String, Value>,
    name: &str,
    index: usize,
) -> Result<f64, NormalizeError> {
    field(fields, name, index)?
        .as_f64()
        .filter(|value| value.is_finite())
        .ok_or_else(|| NormalizeError::WrongType {
            index,
            field: name.to_string(),
        })
}

fn string_field(
    fields: &Map<String, Value>,
    name: &str,
    index: usize,
) -> Result<String, NormalizeError> {
    field(fields, name, index)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| NormalizeError::WrongType {
            index,
            field: name.to_string(),
        })
}

/// Pull the persisted speaker label out of the vendor's speaker object
fn speaker_label(
    fields: &Map<String, Value>,
    name: &str,
    index: usize,
) -> Result<String, NormalizeError> {
    let speaker = field(fields, name, index)?
        .as_object()
        .ok_or_else(|| NormalizeError::WrongType {
            index,
            field: name.to_string(),
        })?;

    speaker
        .get("label")
        .or_else(|| speaker.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| NormalizeError::WrongType {
            index,
            field: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vendor_batch() -> Vec<Value> {
        vec![
            json!({
                "begin": 0,
                "finish": 2400,
                "utterance": "annyeonghaseyo",
                "utteranceEdited": "안녕하세요.",
                "score": 0.97,
                "spk": { "label": "1", "name": "A", "edited": false },
                "diar": { "label": "1" },
                "timing": [{ "w": "안녕하세요", "at": 0 }],
            }),
            json!({
                "begin": 2500,
                "finish": 4100,
                "utterance": "bangawoyo",
                "utteranceEdited": "반가워요!",
                "score": 0.91,
                "spk": { "label": "2", "name": "B", "edited": false },
                "diar": { "label": "2" },
                "timing": [],
            }),
        ]
    }

    #[test]
    fn test_field_roles_are_inferred_from_value_types() {
        let segments = normalize(&vendor_batch()).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start_ms, 0);
        assert_eq!(segments[0].end_ms, 2400);
        assert_eq!(segments[0].text, "annyeonghaseyo");
        assert_eq!(segments[0].text_edited, "안녕하세요.");
        assert_eq!(segments[0].confidence, 0.97);
        assert_eq!(segments[0].speaker, "1");
        assert_eq!(segments[1].speaker, "2");
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let batch = vendor_batch();
        assert_eq!(normalize(&batch).unwrap(), normalize(&batch).unwrap());
    }

    #[test]
    fn test_larger_first_segment_value_becomes_end() {
        // field iteration order puts "zz_start" after "aa_end"; roles must
        // come from the values, not the field order
        let batch = vec![json!({
            "aa_end": 900,
            "zz_start": 100,
            "text": "hello",
            "textEdited": "hello",
            "confidence": 0.5,
            "speaker": { "name": "A" },
        })];

        let segments = normalize(&batch).unwrap();
        assert_eq!(segments[0].start_ms, 100);
        assert_eq!(segments[0].end_ms, 900);
    }

    #[test]
    fn test_speaker_label_falls_back_to_name() {
        let batch = vec![json!({
            "s": 0,
            "e": 100,
            "text": "hi",
            "textEdited": "hi",
            "confidence": 0.8,
            "speaker": { "name": "Narrator" },
        })];

        assert_eq!(normalize(&batch).unwrap()[0].speaker, "Narrator");
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        assert_eq!(normalize(&[]), Err(NormalizeError::EmptyBatch));
    }

    #[test]
    fn test_three_integer_fields_are_rejected() {
        let batch = vec![json!({
            "s": 0,
            "e": 100,
            "extra": 7,
            "text": "hi",
            "textEdited": "hi",
            "confidence": 0.8,
            "speaker": { "name": "A" },
        })];

        assert_eq!(normalize(&batch), Err(NormalizeError::TimeFields(3)));
    }

    #[test]
    fn test_missing_edited_string_is_rejected() {
        let batch = vec![json!({
            "s": 0,
            "e": 100,
            "text": "hi",
            "transcript": "hi",
            "confidence": 0.8,
            "speaker": { "name": "A" },
        })];

        assert_eq!(
            normalize(&batch),
            Err(NormalizeError::TextFields {
                fields: 2,
                edited: 0
            })
        );
    }

    #[test]
    fn test_boolean_field_is_outside_the_contract() {
        let batch = vec![json!({
            "s": 0,
            "e": 100,
            "final": true,
            "text": "hi",
            "textEdited": "hi",
            "confidence": 0.8,
            "speaker": { "name": "A" },
        })];

        assert_eq!(
            normalize(&batch),
            Err(NormalizeError::UnexpectedValue("final".to_string()))
        );
    }

    #[test]
    fn test_later_segment_missing_a_mapped_field_is_rejected() {
        let mut batch = vendor_batch();
        batch[1].as_object_mut().unwrap().remove("score");

        assert_eq!(
            normalize(&batch),
            Err(NormalizeError::MissingField {
                index: 1,
                field: "score".to_string()
            })
        );
    }

    #[test]
    fn test_start_after_end_is_rejected() {
        let mut batch = vendor_batch();
        batch[1]["begin"] = json!(9000);

        assert_eq!(
            normalize(&batch),
            Err(NormalizeError::TimeOrder {
                index: 1,
                start_ms: 9000,
                end_ms: 4100
            })
        );
    }
}
