//! Speech Client - audio exchange with the Sarvam speech API
//!
//! Provides the two speech pipelines and the pieces around them:
//! - `TextToSpeech` - Synthesize speech from text
//! - `SpeechToText` - Transcribe an uploaded file or a recording to text
//! - `RecordingController` - Live audio capture state machine
//! - `AudioStore` - Playable audio resources addressed by handle
//!
//! # Architecture
//!
//! This crate follows the ports & adapters pattern:
//! - `ports` module defines the traits (ports)
//! - `providers` module contains the HTTP adapter for the remote service
//! - `session` module owns the single-slot result state of each pipeline
//!
//! # Example
//!
//! ```ignore
//! use speech_client::{AudioStore, SarvamSpeechProvider, SpeechConfig, SynthesisSession};
//!
//! let config = SpeechConfig::load()?;
//! let provider = Arc::new(SarvamSpeechProvider::new(config.clone())?);
//! let session = SynthesisSession::new(provider, AudioStore::new(), config.synthesis);
//!
//! match session.submit("Hello\nWorld").await {
//!     Some(SlotValue::Ready(handle)) => println!("Playable at {handle}"),
//!     Some(SlotValue::Failed(message)) => eprintln!("{message}"),
//!     // Superseded by a later submission
//!     Some(SlotValue::Empty) | None => {},
//! }
//! ```

pub mod capture;
pub mod codec;
pub mod config;
pub mod error;
pub mod ports;
pub mod providers;
pub mod resources;
pub mod response;
pub mod session;
pub mod types;

pub use capture::{CaptureState, CaptureStream, ChunkEncoding, RecordingController};
pub use codec::{base64_to_binary, binary_to_base64, data_uri, format_byte_size};
pub use config::SpeechConfig;
pub use error::SpeechError;
pub use ports::{CaptureSource, DeviceHandle, SpeechToText, TextToSpeech};
pub use providers::sarvam::SarvamSpeechProvider;
pub use resources::{AudioHandle, AudioStore};
pub use response::TranscriptShape;
pub use session::{SlotValue, SynthesisSession, TranscriptionSession};
pub use types::{
    AudioData, AudioFormat, AudioSource, LanguageCode, Speaker, SynthesisOptions, Transcription,
    TranscriptionOptions,
};

#[cfg(feature = "microphone")]
pub use providers::microphone::CpalMicrophone;
