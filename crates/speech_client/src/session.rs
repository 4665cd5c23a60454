//! Pipeline sessions
//!
//! Each pipeline shows one result at a time. A session owns that slot and a
//! request generation counter: every submission takes the next generation and
//! only the response of the latest generation may write to the slot.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::SpeechError;
use crate::ports::{SpeechToText, TextToSpeech};
use crate::resources::{AudioHandle, AudioStore};
use crate::types::{AudioData, AudioSource, SynthesisOptions, Transcription, TranscriptionOptions};

/// Content of a result slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotValue<T> {
    /// Nothing to show
    Empty,
    /// Successful result
    Ready(T),
    /// User-facing error message
    Failed(String),
}

impl<T> SlotValue<T> {
    /// The successful result, if any
    pub const fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// The error message, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// In-flight marker for one submission
struct Ticket<'a> {
    generation: u64,
    in_flight: &'a AtomicUsize,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct ResultSlot<T> {
    generation: AtomicU64,
    in_flight: AtomicUsize,
    value: Mutex<SlotValue<T>>,
}

impl<T: Clone> ResultSlot<T> {
    fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            value: Mutex::new(SlotValue::Empty),
        }
    }

    /// Take the next generation and empty the slot; returns the old value
    ///
    /// The request counts as in flight until the returned ticket is dropped,
    /// including when the submitting future is cancelled.
    fn begin(&self) -> (Ticket<'_>, SlotValue<T>) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let mut value = self.value.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let ticket = Ticket {
            generation,
            in_flight: &self.in_flight,
        };
        (ticket, std::mem::replace(&mut *value, SlotValue::Empty))
    }

    /// Write `produce()` into the slot if `ticket` is still the latest
    ///
    /// Returns the stored value and the displaced one, or `None` when stale.
    fn settle(
        &self,
        ticket: Ticket<'_>,
        produce: impl FnOnce() -> SlotValue<T>,
    ) -> Option<(SlotValue<T>, SlotValue<T>)> {
        let mut value = self.value.lock();
        let generation = ticket.generation;
        drop(ticket);
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        let next = produce();
        let previous = std::mem::replace(&mut *value, next.clone());
        Some((next, previous))
    }

    fn clear(&self) -> SlotValue<T> {
        let mut value = self.value.lock();
        // Responses still in flight must not repopulate a cleared slot
        self.generation.fetch_add(1, Ordering::SeqCst);
        std::mem::replace(&mut *value, SlotValue::Empty)
    }

    fn snapshot(&self) -> SlotValue<T> {
        self.value.lock().clone()
    }

    fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }
}

fn failure<T>(err: &SpeechError, pipeline: &str) -> SlotValue<T> {
    if !err.is_validation() {
        warn!(pipeline, error = %err, status = ?err.status(), "Speech request failed");
    }
    SlotValue::Failed(err.user_message())
}

/// Text → playable audio, one result at a time
pub struct SynthesisSession {
    synthesizer: Arc<dyn TextToSpeech>,
    store: AudioStore,
    options: SynthesisOptions,
    slot: ResultSlot<AudioHandle>,
}

impl fmt::Debug for SynthesisSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisSession")
            .field("model", &self.synthesizer.model_name())
            .field("options", &self.options)
            .field("result", &self.slot.snapshot())
            .finish_non_exhaustive()
    }
}

impl SynthesisSession {
    /// Create a session publishing audio into `store`
    #[must_use]
    pub fn new(
        synthesizer: Arc<dyn TextToSpeech>,
        store: AudioStore,
        options: SynthesisOptions,
    ) -> Self {
        Self {
            synthesizer,
            store,
            options,
            slot: ResultSlot::new(),
        }
    }

    /// Tuning used for every submission
    #[must_use]
    pub const fn options(&self) -> &SynthesisOptions {
        &self.options
    }

    /// Replace the tuning for later submissions
    pub fn set_options(&mut self, options: SynthesisOptions) {
        self.options = options;
    }

    /// Synthesize `text` and publish the audio
    ///
    /// Returns the new slot value, or `None` when a later submission (or a
    /// `clear`) superseded this one before its response arrived.
    pub async fn submit(&self, text: &str) -> Option<SlotValue<AudioHandle>> {
        let (ticket, previous) = self.slot.begin();
        let generation = ticket.generation;
        self.release(previous);

        let text = text.trim();
        let result = if text.is_empty() {
            Err(SpeechError::Validation(
                "Please enter some text first".to_string(),
            ))
        } else {
            self.synthesizer.synthesize(text, &self.options).await
        };

        // Only the latest response gets a resource allocated
        let settled = self.slot.settle(ticket, || match result {
            Ok(audio) => {
                let size = audio.size_bytes();
                let handle = self.store.create(audio);
                debug!(handle = %handle, size, "Synthesized audio published");
                SlotValue::Ready(handle)
            },
            Err(e) => failure(&e, "synthesis"),
        });

        match settled {
            Some((stored, previous)) => {
                self.release(previous);
                Some(stored)
            },
            None => {
                debug!(generation, "Discarding stale synthesis response");
                None
            },
        }
    }

    fn release(&self, value: SlotValue<AudioHandle>) {
        if let SlotValue::Ready(handle) = value {
            self.store.revoke(&handle);
        }
    }

    /// Current result
    #[must_use]
    pub fn result(&self) -> SlotValue<AudioHandle> {
        self.slot.snapshot()
    }

    /// Audio behind the current result, if any
    #[must_use]
    pub fn audio(&self) -> Option<Arc<AudioData>> {
        self.slot
            .snapshot()
            .ready()
            .and_then(|handle| self.store.get(handle))
    }

    /// Whether a submission is awaiting its response
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    /// Empty the slot, revoking any published audio
    pub fn clear(&self) {
        let previous = self.slot.clear();
        self.release(previous);
    }
}

impl Drop for SynthesisSession {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Audio → text, one result at a time
pub struct TranscriptionSession {
    transcriber: Arc<dyn SpeechToText>,
    store: AudioStore,
    options: TranscriptionOptions,
    slot: ResultSlot<Transcription>,
}

impl fmt::Debug for TranscriptionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionSession")
            .field("model", &self.transcriber.model_name())
            .field("options", &self.options)
            .field("result", &self.slot.snapshot())
            .finish_non_exhaustive()
    }
}

impl TranscriptionSession {
    /// Create a session resolving recordings through `store`
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn SpeechToText>,
        store: AudioStore,
        options: TranscriptionOptions,
    ) -> Self {
        Self {
            transcriber,
            store,
            options,
            slot: ResultSlot::new(),
        }
    }

    /// Parameters used for every submission
    #[must_use]
    pub const fn options(&self) -> &TranscriptionOptions {
        &self.options
    }

    /// Replace the parameters for later submissions
    pub fn set_options(&mut self, options: TranscriptionOptions) {
        self.options = options;
    }

    fn resolve(&self, source: Option<AudioSource>) -> Result<AudioData, SpeechError> {
        match source {
            None => Err(SpeechError::Validation(
                "Please upload an audio file or record audio first".to_string(),
            )),
            Some(AudioSource::Upload(audio)) => Ok(audio),
            Some(AudioSource::Recording(handle)) => {
                let audio = self.store.get(&handle).ok_or_else(|| {
                    SpeechError::Validation("Recording is no longer available".to_string())
                })?;
                let audio = AudioData::clone(&audio);
                let name = audio.filename("recording");
                Ok(audio.with_file_name(name))
            },
        }
    }

    /// Transcribe the given source and publish the text
    ///
    /// Returns the new slot value, or `None` when superseded.
    pub async fn submit(&self, source: Option<AudioSource>) -> Option<SlotValue<Transcription>> {
        let (ticket, _) = self.slot.begin();
        let generation = ticket.generation;

        let result = match self.resolve(source) {
            Ok(audio) => self.transcriber.transcribe(audio, &self.options).await,
            Err(e) => Err(e),
        };

        let settled = self.slot.settle(ticket, || match result {
            Ok(transcription) => SlotValue::Ready(transcription),
            Err(e) => failure(&e, "transcription"),
        });

        match settled {
            Some((stored, _)) => Some(stored),
            None => {
                debug!(generation, "Discarding stale transcription response");
                None
            },
        }
    }

    /// Current result
    #[must_use]
    pub fn result(&self) -> SlotValue<Transcription> {
        self.slot.snapshot()
    }

    /// Whether a submission is awaiting its response
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    /// Empty the slot
    pub fn clear(&self) {
        self.slot.clear();
    }
}
