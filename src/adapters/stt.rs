//! Vendor speech-to-text client.
//!
//! Sends one encoded recording per request as a multipart upload and
//! expects a JSON body whose `segments` array holds one record per
//! utterance. Segment field names are vendor-defined and not stable;
//! only the value types carry meaning (see `core::normalize`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors from the vendor STT service.
///
/// All variants mark the recording STT_ERROR; a request that never
/// completed (timeout) is handled separately by the scheduler and is not
/// represented here.
#[derive(Debug, Error)]
pub enum SttError {
    #[error("STT request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("STT service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("STT response contained no segments")]
    EmptySegments,
}

/// External speech-to-text service
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe one encoded recording into raw vendor segment records
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<Vec<Value>, SttError>;
}

/// Response envelope from the vendor
#[derive(Debug, Deserialize)]
struct VendorResponse {
    #[serde(default)]
    segments: Vec<Value>,
}

/// HTTP client for the vendor STT endpoint
pub struct VendorSttClient {
    endpoint: String,
    api_key: String,
    language: String,
    client: reqwest::Client,
}

impl VendorSttClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Self, SttError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            language: language.into(),
            client,
        })
    }

    /// Vendor request parameters sent alongside the media part
    fn request_params(&self) -> String {
        serde_json::json!({
            "language": self.language,
            "completion": "sync",
            "diarization": { "enable": true },
        })
        .to_string()
    }
}

#[async_trait]
impl SpeechToText for VendorSttClient {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<Vec<Value>, SttError> {
        let media = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str("audio/mp4")?;

        let form = Form::new()
            .part("media", media)
            .text("params", self.request_params());

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SttError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: VendorResponse = response.json().await?;
        if parsed.segments.is_empty() {
            return Err(SttError::EmptySegments);
        }

        Ok(parsed.segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_without_segments_field_parses_empty() {
        let parsed: VendorResponse = serde_json::from_str(r#"{"result": "ok"}"#).unwrap();
        assert!(parsed.segments.is_empty());
    }

    #[test]
    fn test_response_segments_stay_untyped() {
        let parsed: VendorResponse = serde_json::from_str(
            r#"{"segments": [{"start": 0, "end": 1200, "text": "hi"}]}"#,
        )
        .unwrap();

        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.segments[0]["text"], "hi");
    }

    #[test]
    fn test_request_params_include_language() {
        let client = VendorSttClient::new("https://stt.example/v1", "key", "ko-KR").unwrap();
        let params: Value = serde_json::from_str(&client.request_params()).unwrap();
        assert_eq!(params["language"], "ko-KR");
        assert_eq!(params["diarization"]["enable"], true);
    }
}
