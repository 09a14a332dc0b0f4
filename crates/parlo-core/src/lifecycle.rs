//! Engine lifecycle state machine.
//!
//! Tracks readiness of the whole subsystem and gates microphone capture.
//! `Ready` and `Error` are terminal: recovery from `Error` requires an
//! external restart of the whole acquisition sequence.

use std::fmt;

use serde::Serialize;

use crate::error::SpeechError;
use crate::verbose;

/// Lifecycle state of the recognition subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Uninitialized,
    Loading,
    Ready,
    Error,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Loading => "loading",
            EngineState::Ready => "ready",
            EngineState::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Category reported to the status sink alongside each message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Loading,
    Ready,
    Error,
}

/// Callback consumed by the surrounding UI on every lifecycle transition.
pub type StatusSink = Box<dyn Fn(&str, StatusKind) + Send>;

/// Explicit lifecycle state, passed to the components that gate on it
/// instead of living in ambient process-wide flags.
pub struct Lifecycle {
    state: EngineState,
    sink: Option<StatusSink>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self { state: EngineState::Uninitialized, sink: None }
    }

    pub fn with_sink(sink: StatusSink) -> Self {
        Self { state: EngineState::Uninitialized, sink: Some(sink) }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// `Uninitialized -> Loading`. Emits a loading status.
    pub fn begin_loading(&mut self, message: &str) {
        if self.state != EngineState::Uninitialized {
            verbose!("ignoring loading transition from {}", self.state);
            return;
        }
        self.state = EngineState::Loading;
        self.emit(message, StatusKind::Loading);
    }

    /// Progress note while loading; emitted without a state change.
    pub fn loading_progress(&self, message: &str) {
        if self.state == EngineState::Loading {
            self.emit(message, StatusKind::Loading);
        }
    }

    /// `Loading -> Ready`. Emits a ready status.
    pub fn mark_ready(&mut self, message: &str) {
        if self.state != EngineState::Loading {
            verbose!("ignoring ready transition from {}", self.state);
            return;
        }
        self.state = EngineState::Ready;
        self.emit(message, StatusKind::Ready);
    }

    /// `Loading -> Error`. Terminal; emits an error status with the
    /// diagnostic message.
    pub fn mark_error(&mut self, message: &str) {
        if self.state != EngineState::Loading {
            verbose!("ignoring error transition from {}", self.state);
            return;
        }
        self.state = EngineState::Error;
        self.emit(message, StatusKind::Error);
    }

    /// Gate for capture start: anything but `Ready` is rejected.
    pub fn require_ready(&self) -> Result<(), SpeechError> {
        if self.state == EngineState::Ready {
            Ok(())
        } else {
            Err(SpeechError::NotReady(self.state))
        }
    }

    fn emit(&self, message: &str, kind: StatusKind) {
        verbose!("status [{kind:?}]: {message}");
        if let Some(sink) = &self.sink {
            sink(message, kind);
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
