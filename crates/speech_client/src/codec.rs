//! Binary encoding helpers
//!
//! Base64 conversion for audio payloads, request text normalization, and
//! human-readable byte sizes for display.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::SpeechError;
use crate::types::AudioData;

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Decode standard base64 text into raw bytes
///
/// # Errors
///
/// Returns `SpeechError::Decode` on malformed input.
pub fn base64_to_binary(text: &str) -> Result<Vec<u8>, SpeechError> {
    Ok(STANDARD.decode(text.trim())?)
}

/// Encode raw bytes as standard base64
#[must_use]
pub fn binary_to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// `data:` URI for inline playback of an audio payload
#[must_use]
pub fn data_uri(audio: &AudioData) -> String {
    format!(
        "data:{};base64,{}",
        audio.mime_type(),
        binary_to_base64(audio.data())
    )
}

/// Replace every newline with a sentence break before synthesis
#[must_use]
pub fn normalize_synthesis_text(text: &str) -> String {
    text.replace('\n', ". ")
}

/// Human-readable byte count using base-1024 scaling
#[must_use]
pub fn format_byte_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{value:.2} {}", SIZE_UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioFormat;

    #[test]
    fn decodes_standard_base64() {
        assert_eq!(base64_to_binary("AAEC").unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn malformed_base64_fails() {
        assert!(matches!(
            base64_to_binary("@@not-base64@@"),
            Err(SpeechError::Decode(_))
        ));
    }

    #[test]
    fn truncated_base64_fails() {
        assert!(base64_to_binary("AAE").is_err());
    }

    #[test]
    fn newlines_become_sentence_breaks() {
        assert_eq!(normalize_synthesis_text("Hello\nWorld"), "Hello. World");
        assert_eq!(normalize_synthesis_text("a\n\nb"), "a. . b");
        assert_eq!(normalize_synthesis_text("plain"), "plain");
    }

    #[test]
    fn data_uri_embeds_mime_and_payload() {
        let audio = AudioData::new(vec![0, 1, 2], AudioFormat::Wav);
        assert_eq!(data_uri(&audio), "data:audio/wav;base64,AAEC");
    }

    #[test]
    fn byte_sizes_scale_by_1024() {
        assert_eq!(format_byte_size(0), "0 B");
        assert_eq!(format_byte_size(1023), "1023 B");
        assert_eq!(format_byte_size(1024), "1.00 KB");
        assert_eq!(format_byte_size(1536), "1.50 KB");
        assert_eq!(format_byte_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_byte_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn byte_sizes_cap_at_gigabytes() {
        assert_eq!(format_byte_size(2048 * 1024 * 1024 * 1024), "2048.00 GB");
    }
}
