pub mod acquire;
pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod matcher;
pub mod practice;
pub mod store;
pub mod verbose;

pub use acquire::{AssetSource, acquire_model};
pub use capture::{
    AudioDeviceInfo, AudioInput, CpalInput, FrameSink, InputStream, RecognitionSession,
    ResultCallback, list_input_devices,
};
pub use config::{
    DEFAULT_FRAME_SIZE, DEFAULT_MATCH_THRESHOLD, DEFAULT_MIRROR_TIMEOUT_SECS,
    DEFAULT_SAMPLE_RATE, SpeechConfig,
};
pub use engine::{EngineAdapter, EngineFactory, HypothesisStream, SpeechEngine};
#[cfg(feature = "vosk-engine")]
pub use engine::vosk::VoskFactory;
pub use error::SpeechError;
pub use lifecycle::{EngineState, Lifecycle, StatusKind, StatusSink};
pub use matcher::{MatchResult, TargetSet, match_hypothesis};
pub use practice::PracticeEngine;
pub use store::{DiskModelStore, ModelAsset, ModelStore};
pub use verbose::set_verbose;
