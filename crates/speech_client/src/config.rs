//! Configuration for the speech exchange client

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::response::{TranscriptShape, default_transcript_shapes};
use crate::types::{SynthesisOptions, TranscriptionOptions};

/// Environment prefix, e.g. `SARVAM__API_KEY`
pub const ENV_PREFIX: &str = "SARVAM";

/// Optional config file looked up in the working directory
pub const CONFIG_FILE: &str = "sarvam";

/// Configuration for the speech service client
#[derive(Clone, Deserialize)]
pub struct SpeechConfig {
    /// API credential (sensitive - uses SecretString, never defaulted)
    pub api_key: SecretString,

    /// Service base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Header names the synthesis credential is presented under
    #[serde(default = "default_auth_headers")]
    pub synthesis_auth_headers: Vec<String>,

    /// Header name the transcription credential is presented under
    #[serde(default = "default_auth_header")]
    pub transcription_auth_header: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Default synthesis tuning
    #[serde(default)]
    pub synthesis: SynthesisOptions,

    /// Default transcription parameters
    #[serde(default)]
    pub transcription: TranscriptionOptions,

    /// Transcript fields to look for, in order
    #[serde(default = "default_transcript_shapes")]
    pub transcript_shapes: Vec<TranscriptShape>,
}

fn default_base_url() -> String {
    "https://api.sarvam.ai".to_string()
}

fn default_auth_header() -> String {
    "api-subscription-key".to_string()
}

fn default_auth_headers() -> Vec<String> {
    vec![default_auth_header()]
}

const fn default_timeout_ms() -> u64 {
    30000 // 30 seconds
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("synthesis_auth_headers", &self.synthesis_auth_headers)
            .field("transcription_auth_header", &self.transcription_auth_header)
            .field("timeout_ms", &self.timeout_ms)
            .field("synthesis", &self.synthesis)
            .field("transcription", &self.transcription)
            .field("transcript_shapes", &self.transcript_shapes)
            .finish()
    }
}

impl SpeechConfig {
    /// Create a config with defaults around the given credential
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: default_base_url(),
            synthesis_auth_headers: default_auth_headers(),
            transcription_auth_header: default_auth_header(),
            timeout_ms: default_timeout_ms(),
            synthesis: SynthesisOptions::default(),
            transcription: TranscriptionOptions::default(),
            transcript_shapes: default_transcript_shapes(),
        }
    }

    /// Create a minimal config for testing
    #[cfg(test)]
    pub fn test() -> Self {
        Self::new("test-key")
    }

    /// Load from `sarvam.toml` (optional) and `SARVAM__*` environment variables
    ///
    /// There is no fallback credential: a missing `api_key` fails here.
    ///
    /// # Errors
    ///
    /// Returns `config::ConfigError` if sources cannot be read, the key is
    /// missing, or validation fails.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(config::File::with_name(CONFIG_FILE).required(false), None)
    }

    /// Load from the given file source and an environment snapshot
    ///
    /// `env` replaces the process environment when set.
    fn load_from<F>(
        file: F,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, config::ConfigError>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let builder = config::Config::builder()
            .add_source(file)
            // Override with environment variables (e.g., SARVAM__BASE_URL)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("synthesis_auth_headers")
                    .with_list_parse_key("transcript_shapes")
                    .source(env),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate().map_err(config::ConfigError::Message)?;
        Ok(config)
    }

    /// Expose the credential for request headers
    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Build an endpoint URL
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err("API key must not be empty".to_string());
        }

        if self.base_url.trim().is_empty() {
            return Err("Base URL must not be empty".to_string());
        }

        if self.synthesis_auth_headers.is_empty()
            || self
                .synthesis_auth_headers
                .iter()
                .any(|h| h.trim().is_empty())
        {
            return Err("At least one non-empty synthesis auth header is required".to_string());
        }

        if self.transcription_auth_header.trim().is_empty() {
            return Err("Transcription auth header must not be empty".to_string());
        }

        if self.timeout_ms == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.transcript_shapes.is_empty() {
            return Err("At least one transcript shape is required".to_string());
        }

        self.synthesis.validate()
    }
}
