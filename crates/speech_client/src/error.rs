//! Speech exchange errors

use thiserror::Error;

/// Errors that can occur while exchanging audio with the speech service
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Missing or unusable input, caught before any network call
    #[error("{0}")]
    Validation(String),

    /// Microphone access was refused
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    /// Capture device could not be opened or failed while recording
    #[error("Audio capture failed: {0}")]
    Capture(String),

    /// The service rejected the credential (401/403)
    #[error("{message}")]
    Authentication {
        /// HTTP status code returned by the service
        status: u16,
        /// Message extracted from the error body
        message: String,
    },

    /// Any other non-success HTTP status
    #[error("{message}")]
    Api {
        /// HTTP status code returned by the service
        status: u16,
        /// Message extracted from the error body, or a generic status message
        message: String,
    },

    /// Successful response that matches none of the known shapes
    #[error("Unrecognized response: {0}")]
    UnrecognizedResponse(String),

    /// Transcription response without any transcript field
    #[error("No transcript in response")]
    MissingTranscript,

    /// Response body could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Malformed base64 audio payload
    #[error("Failed to decode audio payload: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Failed to connect to speech service
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request to speech service failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Timeout during processing
    #[error("Speech request timeout after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SpeechError {
    /// HTTP status carried by the error, if the service answered at all
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Validation errors are shown inline but never logged
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Single message string shown to the user
    #[must_use]
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
