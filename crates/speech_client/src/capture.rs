//! Live audio capture
//!
//! `RecordingController` drives a capture device through
//! Idle → Recording → Idle(with result). Chunks are accumulated by a pump task
//! while recording and finalized into one playable resource on stop.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SpeechError;
use crate::ports::{CaptureSource, DeviceHandle};
use crate::resources::{AudioHandle, AudioStore};
use crate::types::{AudioData, AudioFormat};

/// How long `stop` waits for the device to flush its last chunks
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// What the chunks of a capture stream contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEncoding {
    /// Pieces of an already encoded container, concatenated as-is
    Encoded(AudioFormat),
    /// Little-endian signed 16-bit PCM, wrapped in WAV on finalize
    Pcm16 {
        /// Samples per second
        sample_rate: u32,
        /// Interleaved channel count
        channels: u16,
    },
}

impl ChunkEncoding {
    /// Format of the finalized recording
    #[must_use]
    pub const fn output_format(&self) -> AudioFormat {
        match self {
            Self::Encoded(format) => *format,
            Self::Pcm16 { .. } => AudioFormat::Wav,
        }
    }

    fn finalize(self, chunks: &[Bytes]) -> Result<AudioData, SpeechError> {
        let raw: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();

        let data = match self {
            Self::Encoded(_) => raw,
            Self::Pcm16 {
                sample_rate,
                channels,
            } => pcm16_to_wav(&raw, sample_rate, channels)?,
        };

        let format = self.output_format();
        Ok(AudioData::new(data, format).with_file_name(format!("recording.{}", format.extension())))
    }
}

fn pcm16_to_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>, SpeechError> {
    let frame = 2 * usize::from(channels);
    if frame == 0 || pcm.len() % frame != 0 {
        return Err(SpeechError::Capture(format!(
            "PCM stream ended mid-frame ({} bytes, {channels} channel(s))",
            pcm.len()
        )));
    }

    let wav_spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.len()));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, wav_spec)
            .map_err(|e| SpeechError::Capture(format!("Failed to create WAV writer: {e}")))?;
        for sample in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                .map_err(|e| SpeechError::Capture(format!("Failed to write sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| SpeechError::Capture(format!("Failed to finalize WAV: {e}")))?;
    }

    Ok(cursor.into_inner())
}

/// An open capture device and the chunks it produces
pub struct CaptureStream {
    chunks: mpsc::UnboundedReceiver<Bytes>,
    encoding: ChunkEncoding,
    device: Box<dyn DeviceHandle>,
}

impl CaptureStream {
    /// Bundle a chunk receiver with the device that feeds it
    #[must_use]
    pub fn new(
        chunks: mpsc::UnboundedReceiver<Bytes>,
        encoding: ChunkEncoding,
        device: Box<dyn DeviceHandle>,
    ) -> Self {
        Self {
            chunks,
            encoding,
            device,
        }
    }
}

impl fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureStream")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
}

struct ActiveRecording {
    device: Box<dyn DeviceHandle>,
    encoding: ChunkEncoding,
    chunks: Arc<Mutex<Vec<Bytes>>>,
    pump: JoinHandle<()>,
}

enum Phase {
    Idle { finished: Option<AudioHandle> },
    Recording(ActiveRecording),
}

/// Microphone recording state machine
///
/// Owns at most one device handle at a time. The finished recording lives in
/// the shared `AudioStore` until it is cleared or replaced.
pub struct RecordingController {
    source: Arc<dyn CaptureSource>,
    store: AudioStore,
    phase: Phase,
}

impl fmt::Debug for RecordingController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingController")
            .field("state", &self.state())
            .field("recording", &self.recording())
            .finish_non_exhaustive()
    }
}

impl RecordingController {
    /// Create an idle controller
    #[must_use]
    pub fn new(source: Arc<dyn CaptureSource>, store: AudioStore) -> Self {
        Self {
            source,
            store,
            phase: Phase::Idle { finished: None },
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> CaptureState {
        match self.phase {
            Phase::Idle { .. } => CaptureState::Idle,
            Phase::Recording(_) => CaptureState::Recording,
        }
    }

    /// Handle of the last finished recording, if any
    #[must_use]
    pub fn recording(&self) -> Option<&AudioHandle> {
        match &self.phase {
            Phase::Idle { finished } => finished.as_ref(),
            Phase::Recording(_) => None,
        }
    }

    /// Chunks accumulated so far in the active recording
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        match &self.phase {
            Phase::Recording(active) => active.chunks.lock().len(),
            Phase::Idle { .. } => 0,
        }
    }

    /// Acquire the device and start accumulating chunks
    ///
    /// A no-op while already recording.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::PermissionDenied` or `SpeechError::Capture` if the
    /// device cannot be acquired; the controller stays idle.
    pub async fn start(&mut self) -> Result<(), SpeechError> {
        if matches!(self.phase, Phase::Recording(_)) {
            debug!("Start ignored, already recording");
            return Ok(());
        }

        let stream = self.source.acquire().await.map_err(|e| {
            warn!(error = %e, "Failed to acquire capture device");
            e
        })?;

        let CaptureStream {
            chunks: mut receiver,
            encoding,
            device,
        } = stream;

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&chunks);
        let pump = tokio::spawn(async move {
            while let Some(chunk) = receiver.recv().await {
                sink.lock().push(chunk);
            }
        });

        info!(?encoding, "Recording started");

        // Starting over discards the previous finished recording
        let previous = match std::mem::replace(
            &mut self.phase,
            Phase::Recording(ActiveRecording {
                device,
                encoding,
                chunks,
                pump,
            }),
        ) {
            Phase::Idle { finished } => finished,
            Phase::Recording(_) => None,
        };
        if let Some(handle) = previous {
            self.store.revoke(&handle);
        }

        Ok(())
    }

    /// Release the device and finalize the accumulated chunks
    ///
    /// Returns `Ok(None)` when nothing is recording.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Capture` if the chunks cannot be assembled; the
    /// device is released and the controller is idle either way.
    pub async fn stop(&mut self) -> Result<Option<AudioHandle>, SpeechError> {
        let active = match std::mem::replace(&mut self.phase, Phase::Idle { finished: None }) {
            Phase::Recording(active) => active,
            idle @ Phase::Idle { .. } => {
                self.phase = idle;
                debug!("Stop ignored, not recording");
                return Ok(None);
            },
        };

        let ActiveRecording {
            device,
            encoding,
            chunks,
            mut pump,
        } = active;

        // Releasing may block until the device thread has shut down
        if tokio::task::spawn_blocking(move || device.release())
            .await
            .is_err()
        {
            warn!("Capture device release panicked");
        }

        if tokio::time::timeout(DRAIN_TIMEOUT, &mut pump).await.is_err() {
            warn!("Capture device did not close its stream, dropping late chunks");
            pump.abort();
        }

        let collected = std::mem::take(&mut *chunks.lock());
        let audio = encoding.finalize(&collected)?;

        info!(
            chunks = collected.len(),
            size = audio.size_bytes(),
            "Recording stopped"
        );

        let handle = self.store.create(audio);
        self.phase = Phase::Idle {
            finished: Some(handle.clone()),
        };
        Ok(Some(handle))
    }

    /// Discard the finished recording and return to the pre-recording state
    ///
    /// Returns `true` if a recording was discarded.
    pub fn clear(&mut self) -> bool {
        match &mut self.phase {
            Phase::Idle { finished } => finished
                .take()
                .is_some_and(|handle| self.store.revoke(&handle)),
            Phase::Recording(_) => false,
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let Phase::Recording(active) =
            std::mem::replace(&mut self.phase, Phase::Idle { finished: None })
        {
            active.device.release();
            active.pump.abort();
            debug!("Capture device released on drop");
        }
    }
}
