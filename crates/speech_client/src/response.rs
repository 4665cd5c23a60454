//! Response shapes returned by the speech service
//!
//! The service is not consistent about where it puts its payloads, so each
//! pipeline decodes through an ordered list of known shapes and fails clearly
//! when none of them match.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SpeechError;
use crate::types::Transcription;

/// Synthesis JSON bodies, tried in declaration order
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SynthesisBody {
    /// `{"audios": ["<base64>", ...]}`
    AudioList { audios: Vec<String> },
    /// `{"audio_data": "<base64>"}`
    AudioData { audio_data: String },
}

impl SynthesisBody {
    /// Parse a JSON body and pick out the base64 audio payload
    pub(crate) fn decode(body: &[u8]) -> Result<String, SpeechError> {
        let parsed: Self = serde_json::from_slice(body).map_err(|_| {
            SpeechError::UnrecognizedResponse(
                "JSON body has neither `audios` nor `audio_data`".to_string(),
            )
        })?;

        match parsed {
            Self::AudioList { audios } => audios.into_iter().next().ok_or_else(|| {
                SpeechError::UnrecognizedResponse("`audios` list is empty".to_string())
            }),
            Self::AudioData { audio_data } => Ok(audio_data),
        }
    }
}

/// Field the transcript text is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptShape {
    /// `{"text": "..."}`
    Text,
    /// `{"transcript": "..."}`
    Transcript,
}

impl TranscriptShape {
    /// JSON field name for this shape
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Transcript => "transcript",
        }
    }

    fn extract(self, body: &Value) -> Option<&str> {
        body.get(self.field_name()).and_then(Value::as_str)
    }
}

/// Shapes checked when nothing else is configured
#[must_use]
pub fn default_transcript_shapes() -> Vec<TranscriptShape> {
    vec![TranscriptShape::Text, TranscriptShape::Transcript]
}

/// Decode a transcription body by trying each shape in order
pub(crate) fn decode_transcript(
    body: &[u8],
    shapes: &[TranscriptShape],
) -> Result<Transcription, SpeechError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SpeechError::InvalidResponse(format!("Failed to parse response: {e}")))?;

    let text = shapes
        .iter()
        .find_map(|shape| shape.extract(&value))
        .ok_or(SpeechError::MissingTranscript)?;

    let transcription = Transcription::new(text);
    Ok(
        match value.get("language_code").and_then(Value::as_str) {
            Some(language) => transcription.with_language(language),
            None => transcription,
        },
    )
}

/// Pull a human-readable message out of an error body
///
/// Accepts `{"message": ..}`, `{"error": ".."}` and `{"error": {"message": ..}}`.
pub(crate) fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;

    if let Some(message) = value.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }

    match value.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Object(detail) => detail
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
