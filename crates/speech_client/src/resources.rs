//! Playable audio resources
//!
//! Decoded or recorded audio is registered in an `AudioStore` and addressed
//! by an opaque `blob:` handle until it is revoked.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::types::AudioData;

/// Locally addressable handle to in-memory audio
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioHandle(String);

impl AudioHandle {
    fn generate() -> Self {
        Self(format!("blob:{}", Uuid::new_v4()))
    }

    /// The handle as a URI string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of playable audio resources
///
/// Cloning yields another view of the same registry.
#[derive(Debug, Clone, Default)]
pub struct AudioStore {
    entries: Arc<RwLock<HashMap<AudioHandle, Arc<AudioData>>>>,
}

impl AudioStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register audio and return a fresh handle for it
    pub fn create(&self, audio: AudioData) -> AudioHandle {
        let handle = AudioHandle::generate();
        debug!(handle = %handle, size = audio.size_bytes(), "Audio resource created");
        self.entries.write().insert(handle.clone(), Arc::new(audio));
        handle
    }

    /// Look up the audio behind a handle
    #[must_use]
    pub fn get(&self, handle: &AudioHandle) -> Option<Arc<AudioData>> {
        self.entries.read().get(handle).cloned()
    }

    /// Release a handle; returns `false` if it was already gone
    pub fn revoke(&self, handle: &AudioHandle) -> bool {
        let removed = self.entries.write().remove(handle).is_some();
        if removed {
            debug!(handle = %handle, "Audio resource revoked");
        }
        removed
    }

    /// Number of live resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if no resources are live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
