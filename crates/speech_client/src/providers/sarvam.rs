//! Sarvam Speech Provider
//!
//! Implements `TextToSpeech` against `POST /text-to-speech` and
//! `SpeechToText` against `POST /speech-to-text`.
//!
//! # Synthesis responses
//!
//! - JSON with base64 audio under `audios` (list) or `audio_data` (string)
//! - Raw audio bytes with an `audio/*` content type
//! - JSON error body with a `message` field on failure

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::codec::{base64_to_binary, normalize_synthesis_text};
use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::ports::{SpeechToText, TextToSpeech};
use crate::response::{SynthesisBody, decode_transcript, error_message};
use crate::types::{
    AudioData, AudioFormat, Speaker, SynthesisOptions, Transcription, TranscriptionOptions,
};

const TTS_PATH: &str = "/text-to-speech";
const STT_PATH: &str = "/speech-to-text";

/// Sarvam speech provider implementing both STT and TTS
#[derive(Debug, Clone)]
pub struct SarvamSpeechProvider {
    client: Client,
    config: SpeechConfig,
    synthesis_auth: Vec<(HeaderName, HeaderValue)>,
    transcription_auth: (HeaderName, HeaderValue),
}

impl SarvamSpeechProvider {
    /// Create a new Sarvam speech provider
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the configuration is invalid or
    /// an auth header name/value cannot be used in a request.
    pub fn new(config: SpeechConfig) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Configuration)?;

        let synthesis_auth = config
            .synthesis_auth_headers
            .iter()
            .map(|name| auth_header(name, config.api_key()))
            .collect::<Result<Vec<_>, _>>()?;
        let transcription_auth = auth_header(&config.transcription_auth_header, config.api_key())?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                SpeechError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            synthesis_auth,
            transcription_auth,
        })
    }

    fn with_synthesis_auth(&self, mut request: RequestBuilder) -> RequestBuilder {
        for (name, value) in &self.synthesis_auth {
            request = request.header(name.clone(), value.clone());
        }
        request
    }

    /// Map a transport failure, on send or while reading the body
    fn transport_error(&self, err: reqwest::Error) -> SpeechError {
        if err.is_timeout() {
            SpeechError::Timeout(self.config.timeout_ms)
        } else if err.is_connect() {
            SpeechError::ConnectionFailed(err.to_string())
        } else if err.is_body() || err.is_decode() {
            SpeechError::InvalidResponse(format!("Failed to read body: {err}"))
        } else {
            SpeechError::RequestFailed(err.to_string())
        }
    }
}

/// Build one credential header; `Authorization` gets the bearer scheme
fn auth_header(name: &str, api_key: &str) -> Result<(HeaderName, HeaderValue), SpeechError> {
    let header_name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| SpeechError::Configuration(format!("Invalid auth header `{name}`: {e}")))?;

    let raw = if header_name == reqwest::header::AUTHORIZATION {
        format!("Bearer {api_key}")
    } else {
        api_key.to_string()
    };

    let mut value = HeaderValue::from_str(&raw)
        .map_err(|e| SpeechError::Configuration(format!("Invalid API key characters: {e}")))?;
    value.set_sensitive(true);

    Ok((header_name, value))
}

/// Map a non-success status plus body to an error
fn status_error(status: StatusCode, body: &[u8], fallback: &str) -> SpeechError {
    let extracted = error_message(body);

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return SpeechError::Authentication {
            status: status.as_u16(),
            message: extracted
                .unwrap_or_else(|| "Authentication failed. Please check your API key.".to_string()),
        };
    }

    SpeechError::Api {
        status: status.as_u16(),
        message: extracted.unwrap_or_else(|| format!("{fallback} (HTTP {})", status.as_u16())),
    }
}

/// Sarvam TTS request body
#[derive(Debug, Serialize)]
pub(crate) struct TtsRequest<'a> {
    inputs: Vec<String>,
    target_language_code: &'a str,
    speaker: Speaker,
    pitch: f32,
    pace: f32,
    loudness: f32,
    speech_sample_rate: u32,
    enable_preprocessing: bool,
    model: &'a str,
}

impl<'a> TtsRequest<'a> {
    pub(crate) fn new(text: &str, options: &'a SynthesisOptions) -> Self {
        Self {
            inputs: vec![normalize_synthesis_text(text)],
            target_language_code: &options.target_language,
            speaker: options.speaker,
            pitch: options.pitch,
            pace: options.pace,
            loudness: options.loudness,
            speech_sample_rate: options.sample_rate,
            enable_preprocessing: options.preprocessing,
            model: &options.model,
        }
    }
}

#[async_trait]
impl TextToSpeech for SarvamSpeechProvider {
    #[instrument(skip(self, text, options), fields(text_len = text.len(), speaker = %options.speaker))]
    async fn synthesize(
        &self,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<AudioData, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::Validation(
                "Please enter some text first".to_string(),
            ));
        }
        options.validate().map_err(SpeechError::Validation)?;

        debug!("Synthesizing speech with Sarvam TTS");

        let request = TtsRequest::new(text, options);
        let response = self
            .with_synthesis_auth(self.client.post(self.config.endpoint(TTS_PATH)))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let err = status_error(status, &body, "Failed to convert text to speech");
            debug!(status = status.as_u16(), error = %err, "Synthesis rejected");
            return Err(err);
        }

        let audio = if content_type.contains("application/json") {
            let encoded = SynthesisBody::decode(&body)?;
            AudioData::new(base64_to_binary(&encoded)?, AudioFormat::Wav)
        } else if content_type.contains("audio/") {
            let format = AudioFormat::from_mime_type(&content_type).unwrap_or(AudioFormat::Mp3);
            AudioData::new(body.to_vec(), format)
        } else {
            return Err(SpeechError::UnrecognizedResponse(format!(
                "unexpected content type `{content_type}`"
            )));
        };

        debug!(audio_size = audio.size_bytes(), format = ?audio.format(), "Speech synthesis complete");
        Ok(audio)
    }

    fn model_name(&self) -> &str {
        &self.config.synthesis.model
    }
}

#[async_trait]
impl SpeechToText for SarvamSpeechProvider {
    #[instrument(skip(self, audio, options), fields(audio_size = audio.size_bytes(), format = ?audio.format(), language = %options.language.as_str()))]
    async fn transcribe(
        &self,
        audio: AudioData,
        options: &TranscriptionOptions,
    ) -> Result<Transcription, SpeechError> {
        if audio.is_empty() {
            return Err(SpeechError::Validation("Audio data is empty".to_string()));
        }

        debug!("Transcribing audio with Sarvam STT");

        let filename = audio.filename("audio");
        let mime_type = audio.mime_type();
        let data = audio.into_data();

        let file_part = Part::bytes(data)
            .file_name(filename)
            .mime_str(mime_type)
            .map_err(|e| SpeechError::Validation(format!("Invalid MIME type: {e}")))?;

        let form = Form::new()
            .part("file", file_part)
            .text("model", options.model.clone())
            .text("language_code", options.language.as_str().to_string())
            .text("with_timestamps", options.with_timestamps.to_string())
            .text("with_diarization", options.with_diarization.to_string());

        let (header_name, header_value) = &self.transcription_auth;
        let response = self
            .client
            .post(self.config.endpoint(STT_PATH))
            .header(header_name.clone(), header_value.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let err = status_error(status, &body, "Transcription request failed");
            debug!(status = status.as_u16(), error = %err, "Transcription rejected");
            return Err(err);
        }

        let transcription = decode_transcript(&body, &self.config.transcript_shapes)?;

        debug!(
            text_len = transcription.text.len(),
            language = ?transcription.language,
            "Transcription complete"
        );

        Ok(transcription)
    }

    fn model_name(&self) -> &str {
        &self.config.transcription.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::binary_to_base64;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_provider(mock_server: &MockServer) -> SarvamSpeechProvider {
        let config = SpeechConfig {
            base_url: mock_server.uri(),
            ..SpeechConfig::new("test-api-key")
        };
        SarvamSpeechProvider::new(config).unwrap()
    }

    mod request_tests {
        use super::*;

        #[test]
        fn newlines_become_sentence_breaks_in_inputs() {
            let options = SynthesisOptions::default();
            let request = TtsRequest::new("Hello\nWorld", &options);
            let json = serde_json::to_value(&request).unwrap();

            assert_eq!(json["inputs"], serde_json::json!(["Hello. World"]));
            assert_eq!(json["speaker"], "meera");
            assert_eq!(json["model"], "bulbul:v1");
            assert_eq!(json["speech_sample_rate"], 22050);
            assert_eq!(json["enable_preprocessing"], false);
        }

        #[test]
        fn authorization_header_uses_bearer_scheme() {
            let (name, value) = auth_header("Authorization", "k").unwrap();
            assert_eq!(name, reqwest::header::AUTHORIZATION);
            assert_eq!(value.to_str().unwrap(), "Bearer k");
            assert!(value.is_sensitive());
        }

        #[test]
        fn custom_header_carries_bare_key() {
            let (name, value) = auth_header("api-subscription-key", "k").unwrap();
            assert_eq!(name.as_str(), "api-subscription-key");
            assert_eq!(value.to_str().unwrap(), "k");
        }

        #[test]
        fn invalid_header_name_is_configuration_error() {
            let mut config = SpeechConfig::test();
            config.synthesis_auth_headers = vec!["bad header".to_string()];
            assert!(matches!(
                SarvamSpeechProvider::new(config),
                Err(SpeechError::Configuration(_))
            ));
        }
    }

    mod tts_tests {
        use super::*;

        #[tokio::test]
        async fn synthesize_decodes_audios_list() {
            let mock_server = MockServer::start().await;
            let audio_bytes = vec![82u8, 73, 70, 70, 0, 1, 2, 3];

            Mock::given(method("POST"))
                .and(path("/text-to-speech"))
                .and(header("api-subscription-key", "test-api-key"))
                .and(body_partial_json(serde_json::json!({
                    "inputs": ["Hello. World"],
                    "target_language_code": "en-IN"
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "request_id": "abc",
                    "audios": [binary_to_base64(&audio_bytes)]
                })))
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let audio = provider
                .synthesize("Hello\nWorld", &SynthesisOptions::default())
                .await
                .unwrap();

            assert_eq!(audio.data(), audio_bytes.as_slice());
            assert_eq!(audio.format(), AudioFormat::Wav);
        }

        #[tokio::test]
        async fn synthesize_decodes_audio_data_field() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/text-to-speech"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "audio_data": "AAECAw=="
                })))
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let audio = provider
                .synthesize("Hi", &SynthesisOptions::default())
                .await
                .unwrap();

            assert_eq!(audio.data(), &[0, 1, 2, 3]);
        }

        #[tokio::test]
        async fn synthesize_uses_raw_audio_body() {
            let mock_server = MockServer::start().await;
            // Not JSON; parsing it would fail
            let mp3 = vec![0xFF, 0xFB, 0x90, 0x00, 0x7B];

            Mock::given(method("POST"))
                .and(path("/text-to-speech"))
                .respond_with(ResponseTemplate::new(200).set_body_raw(mp3.clone(), "audio/mpeg"))
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let audio = provider
                .synthesize("Hi", &SynthesisOptions::default())
                .await
                .unwrap();

            assert_eq!(audio.data(), mp3.as_slice());
            assert_eq!(audio.format(), AudioFormat::Mp3);
        }

        #[tokio::test]
        async fn synthesize_forbidden_surfaces_message() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/text-to-speech"))
                .respond_with(
                    ResponseTemplate::new(403)
                        .set_body_json(serde_json::json!({ "message": "bad key" })),
                )
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let err = provider
                .synthesize("Hi", &SynthesisOptions::default())
                .await
                .unwrap_err();

            assert!(matches!(err, SpeechError::Authentication { status: 403, .. }));
            assert_eq!(err.user_message(), "bad key");
        }

        #[tokio::test]
        async fn synthesize_server_error_without_body_is_generic() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/text-to-speech"))
                .respond_with(ResponseTemplate::new(500))
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let err = provider
                .synthesize("Hi", &SynthesisOptions::default())
                .await
                .unwrap_err();

            assert_eq!(err.status(), Some(500));
            assert_eq!(
                err.user_message(),
                "Failed to convert text to speech (HTTP 500)"
            );
        }

        #[tokio::test]
        async fn synthesize_unknown_content_type_fails() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/text-to-speech"))
                .respond_with(ResponseTemplate::new(200).set_body_raw("ok", "text/plain"))
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let result = provider
                .synthesize("Hi", &SynthesisOptions::default())
                .await;

            assert!(matches!(result, Err(SpeechError::UnrecognizedResponse(_))));
        }

        #[tokio::test]
        async fn synthesize_malformed_base64_fails() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/text-to-speech"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "audios": ["%%%not-base64%%%"]
                })))
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let result = provider
                .synthesize("Hi", &SynthesisOptions::default())
                .await;

            assert!(matches!(result, Err(SpeechError::Decode(_))));
        }

        #[tokio::test]
        async fn synthesize_blank_text_never_calls_service() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let result = provider
                .synthesize("  \n ", &SynthesisOptions::default())
                .await;

            assert!(matches!(result, Err(SpeechError::Validation(_))));
        }

        #[tokio::test]
        async fn synthesize_sends_every_configured_header() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/text-to-speech"))
                .and(header("authorization", "Bearer test-api-key"))
                .and(header("x-api-key", "test-api-key"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "audios": ["AA=="]
                })))
                .expect(1)
                .mount(&mock_server)
                .await;

            let config = SpeechConfig {
                base_url: mock_server.uri(),
                synthesis_auth_headers: vec!["Authorization".to_string(), "x-api-key".to_string()],
                ..SpeechConfig::new("test-api-key")
            };
            let provider = SarvamSpeechProvider::new(config).unwrap();

            let result = provider
                .synthesize("Hi", &SynthesisOptions::default())
                .await;

            assert!(result.is_ok());
        }
    }

    mod stt_tests {
        use super::*;

        #[tokio::test]
        async fn transcribe_success() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/speech-to-text"))
                .and(header("api-subscription-key", "test-api-key"))
                .and(body_string_contains("name=\"with_diarization\""))
                .and(body_string_contains("name=\"language_code\""))
                .and(body_string_contains("saarika:v2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "text": "Hello, world!",
                    "language_code": "en-IN"
                })))
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let audio = AudioData::new(vec![0, 1, 2, 3], AudioFormat::Wav);

            let transcription = provider
                .transcribe(audio, &TranscriptionOptions::default())
                .await
                .unwrap();

            assert_eq!(transcription.text, "Hello, world!");
            assert_eq!(transcription.language.as_deref(), Some("en-IN"));
        }

        #[tokio::test]
        async fn transcribe_reads_transcript_field() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/speech-to-text"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({ "transcript": "hi there" })),
                )
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let audio = AudioData::new(vec![1], AudioFormat::Webm);

            let transcription = provider
                .transcribe(audio, &TranscriptionOptions::default())
                .await
                .unwrap();

            assert_eq!(transcription.text, "hi there");
        }

        #[tokio::test]
        async fn transcribe_without_text_field_fails() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/speech-to-text"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({ "request_id": "r" })),
                )
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let audio = AudioData::new(vec![1], AudioFormat::Wav);

            let result = provider
                .transcribe(audio, &TranscriptionOptions::default())
                .await;

            assert!(matches!(result, Err(SpeechError::MissingTranscript)));
        }

        #[tokio::test]
        async fn transcribe_error_carries_status() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/speech-to-text"))
                .respond_with(ResponseTemplate::new(422).set_body_string("unprocessable"))
                .expect(1)
                .mount(&mock_server)
                .await;

            let provider = create_test_provider(&mock_server);
            let audio = AudioData::new(vec![1], AudioFormat::Wav);

            let err = provider
                .transcribe(audio, &TranscriptionOptions::default())
                .await
                .unwrap_err();

            assert_eq!(err.status(), Some(422));
            assert!(err.user_message().contains("422"));
        }

        #[tokio::test]
        async fn transcribe_empty_audio_fails() {
            let mock_server = MockServer::start().await;
            let provider = create_test_provider(&mock_server);
            let audio = AudioData::new(vec![], AudioFormat::Wav);

            let result = provider
                .transcribe(audio, &TranscriptionOptions::default())
                .await;

            assert!(matches!(result, Err(SpeechError::Validation(_))));
        }
    }

    mod transport_tests {
        use super::*;
        use std::time::Duration;

        #[tokio::test]
        async fn slow_service_times_out_with_configured_limit() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/text-to-speech"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "audio/wav")
                        .set_body_bytes(vec![1u8, 2, 3])
                        .set_delay(Duration::from_millis(1000)),
                )
                .mount(&mock_server)
                .await;

            let config = SpeechConfig {
                base_url: mock_server.uri(),
                timeout_ms: 100,
                ..SpeechConfig::new("test-api-key")
            };
            let provider = SarvamSpeechProvider::new(config).unwrap();

            let err = provider
                .synthesize("Hello", &SynthesisOptions::default())
                .await
                .unwrap_err();

            assert!(matches!(err, SpeechError::Timeout(100)), "{err:?}");
        }

        #[tokio::test]
        async fn unreachable_service_is_connection_failure() {
            // Nothing listens on a released ephemeral port
            let base_url = {
                let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
                format!("http://{}", listener.local_addr().unwrap())
            };
            let config = SpeechConfig {
                base_url,
                ..SpeechConfig::new("test-api-key")
            };
            let provider = SarvamSpeechProvider::new(config).unwrap();

            let err = provider
                .transcribe(
                    AudioData::new(vec![1], AudioFormat::Wav),
                    &TranscriptionOptions::default(),
                )
                .await
                .unwrap_err();

            assert!(matches!(err, SpeechError::ConnectionFailed(_)), "{err:?}");
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn new_fails_with_blank_key() {
            let result = SarvamSpeechProvider::new(SpeechConfig::new(""));
            assert!(matches!(result, Err(SpeechError::Configuration(_))));
        }

        #[test]
        fn model_names_come_from_config() {
            let provider = SarvamSpeechProvider::new(SpeechConfig::test()).unwrap();

            assert_eq!(TextToSpeech::model_name(&provider), "bulbul:v1");
            assert_eq!(SpeechToText::model_name(&provider), "saarika:v2");
        }
    }
}
