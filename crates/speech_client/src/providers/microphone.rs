//! Microphone capture through cpal
//!
//! cpal streams are not `Send`, so each acquired device lives on its own
//! thread. The thread reports the negotiated format, then parks until the
//! handle is released; dropping the stream closes the chunk channel.

use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use bytes::Bytes;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SampleFormat, SampleRate, Stream, StreamConfig};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::capture::{CaptureStream, ChunkEncoding};
use crate::error::SpeechError;
use crate::ports::{CaptureSource, DeviceHandle};

/// Preferred sample rate for speech
pub const SAMPLE_RATE: u32 = 16000;

/// Default input device of the default host
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    sample_rate: u32,
}

impl Default for CpalMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalMicrophone {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
        }
    }

    /// Prefer a different capture rate when the device supports it
    #[must_use]
    pub const fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

#[async_trait]
impl CaptureSource for CpalMicrophone {
    async fn acquire(&self) -> Result<CaptureStream, SpeechError> {
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let target = self.sample_rate;

        let thread = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || run_device(target, chunk_tx, ready_tx, &stop_rx))
            .map_err(|e| SpeechError::Capture(format!("Failed to spawn capture thread: {e}")))?;

        let encoding = ready_rx
            .await
            .map_err(|_| SpeechError::Capture("Capture thread exited early".to_string()))??;

        Ok(CaptureStream::new(
            chunk_rx,
            encoding,
            Box::new(CpalHandle {
                stop: stop_tx,
                thread,
            }),
        ))
    }
}

struct CpalHandle {
    stop: std_mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl DeviceHandle for CpalHandle {
    fn release(self: Box<Self>) {
        let Self { stop, thread } = *self;
        let _ = stop.send(());
        if thread.join().is_err() {
            warn!("Capture thread panicked");
        }
        debug!("Microphone released");
    }
}

fn run_device(
    target: u32,
    chunks: mpsc::UnboundedSender<Bytes>,
    ready: oneshot::Sender<Result<ChunkEncoding, SpeechError>>,
    stop: &std_mpsc::Receiver<()>,
) {
    let stream = match open_stream(target, chunks) {
        Ok((stream, encoding)) => {
            let _ = ready.send(Ok(encoding));
            stream
        },
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        },
    };

    // Returns on release, or when the handle is dropped without one
    let _ = stop.recv();
    drop(stream);
}

fn open_stream(
    target: u32,
    chunks: mpsc::UnboundedSender<Bytes>,
) -> Result<(Stream, ChunkEncoding), SpeechError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| SpeechError::Capture("No input device available".to_string()))?;

    let config = select_config(&device, target)?;

    debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = config.sample_rate.0,
        channels = config.channels,
        "Opening microphone"
    );

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = chunks.send(f32_to_pcm16(data));
            },
            |err| {
                warn!(error = %err, "Audio capture stream error");
            },
            None,
        )
        .map_err(|e| match e {
            BuildStreamError::DeviceNotAvailable => {
                SpeechError::PermissionDenied("Input device is not available".to_string())
            },
            other => SpeechError::Capture(other.to_string()),
        })?;

    stream
        .play()
        .map_err(|e| SpeechError::Capture(e.to_string()))?;

    Ok((
        stream,
        ChunkEncoding::Pcm16 {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        },
    ))
}

fn select_config(device: &cpal::Device, target: u32) -> Result<StreamConfig, SpeechError> {
    let preferred = device
        .supported_input_configs()
        .map_err(|e| SpeechError::Capture(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| {
            c.min_sample_rate() <= SampleRate(target) && c.max_sample_rate() >= SampleRate(target)
        })
        .min_by_key(cpal::SupportedStreamConfigRange::channels);

    if let Some(range) = preferred {
        return Ok(range.with_sample_rate(SampleRate(target)).config());
    }

    let fallback = device
        .default_input_config()
        .map_err(|e| SpeechError::Capture(e.to_string()))?;
    if fallback.sample_format() != SampleFormat::F32 {
        return Err(SpeechError::Capture(format!(
            "Unsupported sample format: {:?}",
            fallback.sample_format()
        )));
    }
    Ok(fallback.config())
}

/// Convert f32 samples in [-1.0, 1.0] to little-endian i16 PCM
fn f32_to_pcm16(samples: &[f32]) -> Bytes {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    Bytes::from(out)
}
