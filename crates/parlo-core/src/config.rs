//! Subsystem configuration.
//!
//! The tuning values (mirror time budget, capture frame size, match
//! threshold) are deliberately configurable: their optimal settings depend
//! on the recognition engine's hypothesis granularity and the mirror's
//! bandwidth, so nothing here is hard-coded at the call sites.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::acquire::AssetSource;

/// Time budget for the primary mirror before the fallback source is tried.
pub const DEFAULT_MIRROR_TIMEOUT_SECS: u64 = 15;

/// Capture sample rate expected by the recognition engine.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Samples per capture frame handed to the engine.
pub const DEFAULT_FRAME_SIZE: u32 = 4096;

/// Minimum similarity score (0-100) for a tier-1 match.
pub const DEFAULT_MATCH_THRESHOLD: u8 = 80;

/// Configuration for the speech-practice recognition subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Primary mirror URL for the packaged model. Also the canonical model
    /// store key: a cached asset is looked up under this identifier.
    pub primary_url: String,

    /// Bundled/local model archive used when the mirror is unreachable.
    pub fallback_path: PathBuf,

    /// Time budget for the mirror download before it is cancelled.
    pub mirror_timeout: Duration,

    /// Audio sample rate for capture and recognition (Hz).
    pub sample_rate: u32,

    /// Capture frame size in samples.
    pub frame_size: u32,

    /// Tier-1 similarity threshold in percent.
    pub match_threshold: u8,
}

impl SpeechConfig {
    /// Create a configuration with default tuning for the given model sources.
    pub fn new(primary_url: impl Into<String>, fallback_path: impl Into<PathBuf>) -> Self {
        Self {
            primary_url: primary_url.into(),
            fallback_path: fallback_path.into(),
            mirror_timeout: Duration::from_secs(DEFAULT_MIRROR_TIMEOUT_SECS),
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    /// Set the mirror time budget.
    pub fn with_mirror_timeout(mut self, timeout: Duration) -> Self {
        self.mirror_timeout = timeout;
        self
    }

    /// Set the capture sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the capture frame size.
    pub fn with_frame_size(mut self, frame_size: u32) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Set the tier-1 match threshold.
    pub fn with_match_threshold(mut self, threshold: u8) -> Self {
        self.match_threshold = threshold.min(100);
        self
    }

    /// The ordered acquisition chain: primary mirror (time-bounded), then
    /// the local fallback archive. The model store is consulted before any
    /// of these sources.
    pub fn sources(&self) -> Vec<AssetSource> {
        vec![
            AssetSource::Mirror {
                url: self.primary_url.clone(),
                timeout: self.mirror_timeout,
            },
            AssetSource::LocalFile {
                path: self.fallback_path.clone(),
            },
        ]
    }
}
