//! Speech adapters

pub mod sarvam;

#[cfg(feature = "microphone")]
pub mod microphone;
