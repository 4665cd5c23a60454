//! Types for the speech exchange
//!
//! Contains audio containers and formats, request options for both pipelines,
//! and the transcription result.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SpeechError;
use crate::resources::AudioHandle;

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// WAV format (uncompressed), what the service synthesizes by default
    Wav,
    /// MP3 format
    Mp3,
    /// WebM container (browser recordings)
    Webm,
    /// OGG container
    Ogg,
    /// FLAC format (lossless)
    Flac,
    /// M4A/AAC format
    M4a,
}

impl AudioFormat {
    /// Get the MIME type for this audio format
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Webm => "audio/webm",
            Self::Ogg => "audio/ogg",
            Self::Flac => "audio/flac",
            Self::M4a => "audio/mp4",
        }
    }

    /// Get the file extension for this audio format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Webm => "webm",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::M4a => "m4a",
        }
    }

    /// Parse audio format from a MIME type or `Content-Type` header value
    #[must_use]
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        // "audio/webm; codecs=opus" and friends
        let base_mime = mime.split(';').next().unwrap_or(mime).trim();

        match base_mime.to_ascii_lowercase().as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(Self::Wav),
            "audio/mpeg" | "audio/mp3" => Some(Self::Mp3),
            "audio/webm" => Some(Self::Webm),
            "audio/ogg" | "audio/opus" => Some(Self::Ogg),
            "audio/flac" | "audio/x-flac" => Some(Self::Flac),
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => Some(Self::M4a),
            _ => None,
        }
    }

    /// Parse audio format from a file extension (case-insensitive)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(Self::Wav),
            "mp3" | "mpeg" | "mpga" => Some(Self::Mp3),
            "webm" => Some(Self::Webm),
            "ogg" | "oga" | "opus" => Some(Self::Ogg),
            "flac" => Some(Self::Flac),
            "m4a" | "mp4" | "aac" => Some(Self::M4a),
            _ => None,
        }
    }
}

/// Container for audio data with metadata
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Raw audio bytes
    data: Vec<u8>,
    /// Audio format
    format: AudioFormat,
    /// Original file name for uploads
    file_name: Option<String>,
}

impl AudioData {
    /// Create new audio data
    #[must_use]
    pub const fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self {
            data,
            format,
            file_name: None,
        }
    }

    /// Attach a file name, used as the multipart part name on upload
    #[must_use]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Read an audio file from disk, deriving the format from its extension
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Validation` if the extension is not a known audio
    /// format or the file cannot be read.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SpeechError> {
        let path = path.as_ref();
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(AudioFormat::from_extension)
            .ok_or_else(|| {
                SpeechError::Validation(format!("Not an audio file: {}", path.display()))
            })?;

        let data = tokio::fs::read(path).await.map_err(|e| {
            SpeechError::Validation(format!("Failed to read {}: {e}", path.display()))
        })?;

        let audio = Self::new(data, format);
        Ok(match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => audio.with_file_name(name),
            None => audio,
        })
    }

    /// Get the raw audio bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume and return the raw audio bytes
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get the audio format
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Get the original file name, if any
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Get the size of the audio data in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if the audio data is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the MIME type for this audio
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// The original file name, or `base` with the format's extension
    #[must_use]
    pub fn filename(&self, base: &str) -> String {
        self.file_name
            .clone()
            .unwrap_or_else(|| format!("{}.{}", base, self.format.extension()))
    }
}

/// Where the audio to transcribe comes from
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// A file the user picked
    Upload(AudioData),
    /// A finished recording, addressed through the audio store
    Recording(AudioHandle),
}

/// Voices offered by the synthesis service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    #[default]
    Meera,
    Pavithra,
    Maitreyi,
    Arvind,
    Amol,
    Amartya,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Meera => "meera",
            Self::Pavithra => "pavithra",
            Self::Maitreyi => "maitreyi",
            Self::Arvind => "arvind",
            Self::Amol => "amol",
            Self::Amartya => "amartya",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Speaker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "meera" => Ok(Self::Meera),
            "pavithra" => Ok(Self::Pavithra),
            "maitreyi" => Ok(Self::Maitreyi),
            "arvind" => Ok(Self::Arvind),
            "amol" => Ok(Self::Amol),
            "amartya" => Ok(Self::Amartya),
            _ => Err(format!("Unknown speaker: {s}")),
        }
    }
}

/// Language of the audio to transcribe
///
/// Serialized as the BCP-47 tag, or `"unknown"` to let the service detect it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LanguageCode {
    /// Let the service detect the spoken language
    #[default]
    AutoDetect,
    /// Explicit language tag such as `en-IN`
    Tag(String),
}

impl LanguageCode {
    const AUTO_DETECT: &'static str = "unknown";

    /// Wire value sent as `language_code`
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AutoDetect => Self::AUTO_DETECT,
            Self::Tag(tag) => tag,
        }
    }
}

impl From<String> for LanguageCode {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(Self::AUTO_DETECT) {
            Self::AutoDetect
        } else {
            Self::Tag(trimmed.to_string())
        }
    }
}

impl From<&str> for LanguageCode {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<LanguageCode> for String {
    fn from(value: LanguageCode) -> Self {
        value.as_str().to_string()
    }
}

/// Tuning parameters for speech synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOptions {
    /// Target language tag
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Voice to speak with
    #[serde(default)]
    pub speaker: Speaker,

    /// Pitch shift (-1.0 to 1.0)
    #[serde(default)]
    pub pitch: f32,

    /// Speaking pace (0.3 to 3.0)
    #[serde(default = "default_unit")]
    pub pace: f32,

    /// Loudness multiplier (0.1 to 3.0)
    #[serde(default = "default_unit")]
    pub loudness: f32,

    /// Output sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Let the service normalize numbers, abbreviations and the like
    #[serde(default)]
    pub preprocessing: bool,

    /// Synthesis model identifier
    #[serde(default = "default_synthesis_model")]
    pub model: String,
}

fn default_target_language() -> String {
    "en-IN".to_string()
}

const fn default_unit() -> f32 {
    1.0
}

const fn default_sample_rate() -> u32 {
    22050
}

fn default_synthesis_model() -> String {
    "bulbul:v1".to_string()
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            target_language: default_target_language(),
            speaker: Speaker::default(),
            pitch: 0.0,
            pace: default_unit(),
            loudness: default_unit(),
            sample_rate: default_sample_rate(),
            preprocessing: false,
            model: default_synthesis_model(),
        }
    }
}

impl SynthesisOptions {
    /// Validate the tuning ranges accepted by the service
    ///
    /// # Errors
    ///
    /// Returns a description of the first out-of-range parameter.
    pub fn validate(&self) -> Result<(), String> {
        if !(-1.0..=1.0).contains(&self.pitch) {
            return Err(format!(
                "Pitch must be between -1.0 and 1.0, got {}",
                self.pitch
            ));
        }
        if !(0.3..=3.0).contains(&self.pace) {
            return Err(format!("Pace must be between 0.3 and 3.0, got {}", self.pace));
        }
        if !(0.1..=3.0).contains(&self.loudness) {
            return Err(format!(
                "Loudness must be between 0.1 and 3.0, got {}",
                self.loudness
            ));
        }
        if self.sample_rate == 0 {
            return Err("Sample rate must be greater than 0".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("Synthesis model must not be empty".to_string());
        }
        Ok(())
    }
}

/// Parameters for transcription requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionOptions {
    /// Transcription model identifier
    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// Spoken language, or auto-detect
    #[serde(default)]
    pub language: LanguageCode,

    /// Ask for word timestamps
    #[serde(default)]
    pub with_timestamps: bool,

    /// Ask for speaker diarization
    #[serde(default)]
    pub with_diarization: bool,
}

fn default_transcription_model() -> String {
    "saarika:v2".to_string()
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            model: default_transcription_model(),
            language: LanguageCode::default(),
            with_timestamps: false,
            with_diarization: false,
        }
    }
}

/// Result of speech-to-text transcription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    /// Transcribed text
    pub text: String,
    /// Language reported by the service
    pub language: Option<String>,
}

impl Transcription {
    /// Create a transcription with just text
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: None,
        }
    }

    /// Set the reported language
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod audio_format {
        use super::*;

        #[test]
        fn mime_types_are_correct() {
            assert_eq!(AudioFormat::Wav.mime_type(), "audio/wav");
            assert_eq!(AudioFormat::Mp3.mime_type(), "audio/mpeg");
            assert_eq!(AudioFormat::Webm.mime_type(), "audio/webm");
            assert_eq!(AudioFormat::Ogg.mime_type(), "audio/ogg");
        }

        #[test]
        fn from_mime_type_strips_parameters() {
            assert_eq!(
                AudioFormat::from_mime_type("audio/webm;codecs=opus"),
                Some(AudioFormat::Webm)
            );
            assert_eq!(
                AudioFormat::from_mime_type("Audio/MPEG"),
                Some(AudioFormat::Mp3)
            );
        }

        #[test]
        fn from_mime_type_unknown() {
            assert_eq!(AudioFormat::from_mime_type("application/json"), None);
            assert_eq!(AudioFormat::from_mime_type("audio/unknown"), None);
        }

        #[test]
        fn from_extension_is_case_insensitive() {
            assert_eq!(AudioFormat::from_extension("WAV"), Some(AudioFormat::Wav));
            assert_eq!(AudioFormat::from_extension("mp3"), Some(AudioFormat::Mp3));
            assert_eq!(AudioFormat::from_extension("txt"), None);
        }
    }

    mod audio_data {
        use super::*;

        #[test]
        fn filename_prefers_original_name() {
            let audio = AudioData::new(vec![1], AudioFormat::Mp3).with_file_name("clip.mp3");
            assert_eq!(audio.filename("recording"), "clip.mp3");
        }

        #[test]
        fn filename_falls_back_to_extension() {
            let audio = AudioData::new(vec![1], AudioFormat::Webm);
            assert_eq!(audio.filename("recording"), "recording.webm");
        }

        #[tokio::test]
        async fn from_file_reads_bytes_and_format() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("hello.wav");
            tokio::fs::write(&path, [1u8, 2, 3]).await.unwrap();

            let audio = AudioData::from_file(&path).await.unwrap();

            assert_eq!(audio.data(), &[1, 2, 3]);
            assert_eq!(audio.format(), AudioFormat::Wav);
            assert_eq!(audio.file_name(), Some("hello.wav"));
        }

        #[tokio::test]
        async fn from_file_rejects_unknown_extension() {
            let result = AudioData::from_file("notes.txt").await;
            assert!(matches!(result, Err(SpeechError::Validation(_))));
        }
    }

    mod options {
        use super::*;

        #[test]
        fn synthesis_defaults_match_service_defaults() {
            let options = SynthesisOptions::default();
            assert_eq!(options.target_language, "en-IN");
            assert_eq!(options.speaker, Speaker::Meera);
            assert_eq!(options.sample_rate, 22050);
            assert!(!options.preprocessing);
            assert_eq!(options.model, "bulbul:v1");
            assert!(options.validate().is_ok());
        }

        #[test]
        fn synthesis_rejects_out_of_range_pace() {
            let options = SynthesisOptions {
                pace: 5.0,
                ..Default::default()
            };
            assert!(options.validate().is_err());
        }

        #[test]
        fn transcription_defaults_disable_flags() {
            let options = TranscriptionOptions::default();
            assert!(!options.with_timestamps);
            assert!(!options.with_diarization);
            assert_eq!(options.language, LanguageCode::AutoDetect);
        }

        #[test]
        fn speaker_round_trips_through_str() {
            assert_eq!("Arvind".parse::<Speaker>().unwrap(), Speaker::Arvind);
            assert_eq!(Speaker::Amartya.to_string(), "amartya");
            assert!("nobody".parse::<Speaker>().is_err());
        }

        #[test]
        fn language_code_auto_detect_sentinel() {
            assert_eq!(LanguageCode::from("unknown"), LanguageCode::AutoDetect);
            assert_eq!(LanguageCode::from(""), LanguageCode::AutoDetect);
            assert_eq!(LanguageCode::AutoDetect.as_str(), "unknown");
            assert_eq!(LanguageCode::from("hi-IN").as_str(), "hi-IN");
        }

        #[test]
        fn language_code_serializes_as_plain_string() {
            let json = serde_json::to_string(&LanguageCode::from("od-IN")).unwrap();
            assert_eq!(json, "\"od-IN\"");
        }
    }
}
