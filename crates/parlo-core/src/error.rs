//! Error types for the recognition subsystem.
//!
//! The acquisition chain distinguishes non-fatal errors (absorbed locally,
//! next source is tried) from fatal ones (surfaced to the lifecycle state
//! machine and reported through the status sink).

use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::EngineState;

/// Errors produced by model acquisition, engine setup and audio capture.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Model store read or write failed. Non-fatal: treated as a cache miss.
    #[error("model cache error: {0}")]
    Cache(String),

    /// The primary mirror did not deliver the asset within the time budget.
    #[error("mirror download timed out after {0:?}")]
    NetworkTimeout(Duration),

    /// The primary mirror responded with an error or the transport failed.
    #[error("mirror download failed: {0}")]
    Network(String),

    /// The last acquisition source failed. No further sources exist.
    #[error("fallback model source failed: {0}")]
    FallbackSource(String),

    /// The recognition engine could not be created from the model asset.
    #[error("engine initialization failed: {0}")]
    EngineInit(String),

    /// The audio input device could not be acquired or started.
    #[error("audio device unavailable: {0}")]
    DeviceAccess(String),

    /// Capture was requested before the subsystem reached `Ready`.
    #[error("engine not ready (state: {0})")]
    NotReady(EngineState),

    /// Capture was requested while a recognition session is already active.
    #[error("a recognition session is already active")]
    AlreadyListening,
}

impl SpeechError {
    /// Whether this error terminates the whole subsystem (lifecycle `Error`)
    /// as opposed to being absorbed by a fallback step or a retryable start.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SpeechError::FallbackSource(_) | SpeechError::EngineInit(_)
        )
    }
}
