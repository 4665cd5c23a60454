//! Port definitions for the speech exchange
//!
//! Defines the traits (ports) that the remote service adapter and capture
//! devices must implement.

use async_trait::async_trait;

use crate::capture::CaptureStream;
use crate::error::SpeechError;
use crate::types::{AudioData, SynthesisOptions, Transcription, TranscriptionOptions};

/// Port for Text-to-Speech (TTS) implementations
///
/// # Example
///
/// ```ignore
/// use speech_client::{SynthesisOptions, TextToSpeech};
///
/// async fn speak(tts: &impl TextToSpeech, text: &str) -> Result<Vec<u8>, SpeechError> {
///     let audio = tts.synthesize(text, &SynthesisOptions::default()).await?;
///     Ok(audio.into_data())
/// }
/// ```
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Convert text to speech
    ///
    /// The caller trims the text; empty text is rejected before any request.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` if validation, the request, or decoding fails.
    async fn synthesize(
        &self,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<AudioData, SpeechError>;

    /// Get the name of the default TTS model
    fn model_name(&self) -> &str;
}

/// Port for Speech-to-Text (STT) implementations
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe audio to text
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` if the audio is empty, the request fails, or the
    /// response carries no transcript.
    async fn transcribe(
        &self,
        audio: AudioData,
        options: &TranscriptionOptions,
    ) -> Result<Transcription, SpeechError>;

    /// Get the name of the default STT model
    fn model_name(&self) -> &str;
}

/// Port for microphone-like capture devices
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Ask for the device and start producing chunks
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::PermissionDenied` if access is refused, or
    /// `SpeechError::Capture` if no usable device exists.
    async fn acquire(&self) -> Result<CaptureStream, SpeechError>;
}

/// Exclusive handle on an open capture device
pub trait DeviceHandle: Send {
    /// Stop the device; the chunk channel closes once it has stopped
    fn release(self: Box<Self>);
}
