//! Practice session orchestration.
//!
//! Wires the acquisition manager, engine adapter, lifecycle state machine,
//! matcher and capture pipeline into one entry point for the surrounding
//! UI: initialize once, swap target sentences per exercise, start and stop
//! microphone sessions.

use std::sync::{Arc, Mutex};

use crate::acquire::acquire_model;
use crate::capture::{AudioInput, CpalInput, RecognitionSession, ResultCallback};
use crate::config::SpeechConfig;
use crate::engine::{EngineAdapter, EngineFactory};
use crate::error::SpeechError;
use crate::lifecycle::{EngineState, Lifecycle, StatusSink};
use crate::matcher::TargetSet;
use crate::store::ModelStore;

/// The speech-practice recognition subsystem.
pub struct PracticeEngine {
    config: SpeechConfig,
    lifecycle: Lifecycle,
    adapter: Option<Arc<Mutex<EngineAdapter>>>,
    targets: Arc<Mutex<TargetSet>>,
    input: Box<dyn AudioInput>,
    session: Option<RecognitionSession>,
}

impl PracticeEngine {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::new(),
            adapter: None,
            targets: Arc::new(Mutex::new(TargetSet::default())),
            input: Box::new(CpalInput),
            session: None,
        }
    }

    /// Like [`PracticeEngine::new`], with a status sink that receives a
    /// human-readable message on every lifecycle transition.
    pub fn with_status_sink(config: SpeechConfig, sink: StatusSink) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::with_sink(sink),
            adapter: None,
            targets: Arc::new(Mutex::new(TargetSet::default())),
            input: Box::new(CpalInput),
            session: None,
        }
    }

    /// Replace the audio input used for capture sessions. The default is
    /// the system microphone via [`CpalInput`].
    pub fn with_audio_input(mut self, input: Box<dyn AudioInput>) -> Self {
        self.input = input;
        self
    }

    pub fn state(&self) -> EngineState {
        self.lifecycle.state()
    }

    pub fn is_listening(&self) -> bool {
        self.session.as_ref().is_some_and(RecognitionSession::is_listening)
    }

    /// Snapshot of the active target sentences.
    pub fn targets(&self) -> TargetSet {
        self.targets.lock().unwrap().clone()
    }

    /// Replace the target set wholesale for a new exercise. Applies to all
    /// hypotheses finalized after the call, including in a running session.
    pub fn set_targets<I, S>(&mut self, sentences: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        *self.targets.lock().unwrap() = TargetSet::new(sentences);
    }

    /// Acquire the model and create the engine: `Loading` on entry, `Ready`
    /// on success, `Error` (terminal) on any failure. Call once; a failed
    /// engine must be rebuilt from scratch to retry.
    pub async fn init<S: ModelStore>(
        &mut self,
        store: &S,
        factory: &dyn EngineFactory,
    ) -> Result<(), SpeechError> {
        if self.lifecycle.state() != EngineState::Uninitialized {
            return Err(SpeechError::EngineInit(format!(
                "init called in state {}",
                self.lifecycle.state()
            )));
        }

        self.lifecycle.begin_loading("Initializing engine...");

        let result = self.try_init(store, factory).await;
        match result {
            Ok(adapter) => {
                self.adapter = Some(Arc::new(Mutex::new(adapter)));
                self.lifecycle.mark_ready("Engine ready");
                Ok(())
            }
            Err(err) => {
                self.lifecycle.mark_error(&format!("Engine failed: {err}"));
                Err(err)
            }
        }
    }

    async fn try_init<S: ModelStore>(
        &self,
        store: &S,
        factory: &dyn EngineFactory,
    ) -> Result<EngineAdapter, SpeechError> {
        self.lifecycle.loading_progress("Loading model...");
        let sources = self.config.sources();
        let asset = acquire_model(store, &self.config.primary_url, &sources).await?;

        self.lifecycle.loading_progress("Creating recognizer...");
        EngineAdapter::initialize(factory, &asset, self.config.sample_rate)
    }

    /// Begin a recognition session on the default microphone.
    ///
    /// Rejected with `NotReady` before `init` succeeds and with
    /// `AlreadyListening` while a session exists. A `DeviceAccess` failure
    /// leaves the subsystem `Ready` so the caller may simply retry.
    pub fn start(&mut self, on_result: ResultCallback) -> Result<(), SpeechError> {
        self.lifecycle.require_ready()?;
        if self.session.is_some() {
            return Err(SpeechError::AlreadyListening);
        }
        let adapter = self
            .adapter
            .as_ref()
            .ok_or(SpeechError::NotReady(EngineState::Uninitialized))?;

        let session = RecognitionSession::start(
            self.input.as_ref(),
            Arc::clone(adapter),
            Arc::clone(&self.targets),
            self.config.match_threshold,
            self.config.sample_rate,
            self.config.frame_size,
            on_result,
        )?;
        self.session = Some(session);
        Ok(())
    }

    /// End the active session, releasing the device and audio resources.
    /// Returns after the last finalized hypothesis has been delivered.
    /// Idempotent: without a session this is a no-op.
    pub async fn stop(&mut self) {
        if let (Some(session), Some(adapter)) = (self.session.take(), self.adapter.as_ref()) {
            session.stop(adapter).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FrameSink, InputStream};
    use crate::engine::SpeechEngine;
    use crate::lifecycle::StatusKind;
    use crate::matcher::MatchResult;
    use crate::store::{DiskModelStore, ModelAsset};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullEngine;

    impl SpeechEngine for NullEngine {
        fn accept_frame(&mut self, _frame: &[i16]) -> Option<String> {
            None
        }
        fn finalize(&mut self) -> Option<String> {
            None
        }
    }

    struct NullFactory;

    impl EngineFactory for NullFactory {
        fn create(
            &self,
            _asset: &ModelAsset,
            _sample_rate: u32,
        ) -> Result<Box<dyn SpeechEngine>, SpeechError> {
            Ok(Box::new(NullEngine))
        }
    }

    struct FailingFactory;

    impl EngineFactory for FailingFactory {
        fn create(
            &self,
            _asset: &ModelAsset,
            _sample_rate: u32,
        ) -> Result<Box<dyn SpeechEngine>, SpeechError> {
            Err(SpeechError::EngineInit("model decoding failed".into()))
        }
    }

    /// Input whose device can never be opened.
    struct NoDeviceInput;

    impl AudioInput for NoDeviceInput {
        fn open(
            &self,
            _sample_rate: u32,
            _frame_size: u32,
            _sink: FrameSink,
        ) -> Result<Box<dyn InputStream>, SpeechError> {
            Err(SpeechError::DeviceAccess("microphone is busy".into()))
        }
    }

    /// Input that opens successfully but delivers no audio; counts pauses.
    struct SilentInput {
        pauses: Arc<AtomicUsize>,
    }

    impl SilentInput {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let pauses = Arc::new(AtomicUsize::new(0));
            (Self { pauses: Arc::clone(&pauses) }, pauses)
        }
    }

    struct SilentStream {
        pauses: Arc<AtomicUsize>,
    }

    impl AudioInput for SilentInput {
        fn open(
            &self,
            _sample_rate: u32,
            _frame_size: u32,
            _sink: FrameSink,
        ) -> Result<Box<dyn InputStream>, SpeechError> {
            Ok(Box::new(SilentStream { pauses: Arc::clone(&self.pauses) }))
        }
    }

    impl InputStream for SilentStream {
        fn pause(&mut self) -> Result<(), SpeechError> {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Engine with a pending utterance that only surfaces on finalize.
    struct PendingEngine(Option<String>);

    impl SpeechEngine for PendingEngine {
        fn accept_frame(&mut self, _frame: &[i16]) -> Option<String> {
            None
        }
        fn finalize(&mut self) -> Option<String> {
            self.0.take()
        }
    }

    struct PendingFactory(String);

    impl EngineFactory for PendingFactory {
        fn create(
            &self,
            _asset: &ModelAsset,
            _sample_rate: u32,
        ) -> Result<Box<dyn SpeechEngine>, SpeechError> {
            Ok(Box::new(PendingEngine(Some(self.0.clone()))))
        }
    }

    /// Config whose mirror cannot resolve and whose fallback is a real file,
    /// so init succeeds without network.
    fn offline_config(dir: &std::path::Path) -> SpeechConfig {
        let fallback = dir.join("model.tar.gz");
        let mut file = std::fs::File::create(&fallback).unwrap();
        file.write_all(b"model-bytes").unwrap();
        SpeechConfig::new("https://mirror.invalid/model.tar.gz", fallback)
            .with_mirror_timeout(Duration::from_millis(500))
    }

    fn broken_config(dir: &std::path::Path) -> SpeechConfig {
        SpeechConfig::new(
            "https://mirror.invalid/model.tar.gz",
            dir.join("does-not-exist.tar.gz"),
        )
        .with_mirror_timeout(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_init_reaches_ready_via_fallback_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskModelStore::new(dir.path().join("store"));
        let mut engine = PracticeEngine::new(offline_config(dir.path()));

        engine.init(&store, &NullFactory).await.unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[tokio::test]
    async fn test_exhausted_sources_reach_error_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskModelStore::new(dir.path().join("store"));
        let (mut engine, log) = engine_with_sink(broken_config(dir.path()));

        let err = engine.init(&store, &NullFactory).await.unwrap_err();
        assert!(matches!(err, SpeechError::FallbackSource(_)));
        assert_eq!(engine.state(), EngineState::Error);

        let log = log.lock().unwrap();
        assert_eq!(log.first().unwrap().1, StatusKind::Loading);
        assert_eq!(log.last().unwrap().1, StatusKind::Error);
    }

    #[tokio::test]
    async fn test_engine_creation_failure_reaches_error_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskModelStore::new(dir.path().join("store"));
        let mut engine = PracticeEngine::new(offline_config(dir.path()));

        let err = engine.init(&store, &FailingFactory).await.unwrap_err();
        assert!(matches!(err, SpeechError::EngineInit(_)));
        assert_eq!(engine.state(), EngineState::Error);
    }

    #[tokio::test]
    async fn test_start_before_ready_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = PracticeEngine::new(offline_config(dir.path()));

        // rejected by the lifecycle gate, before any device is touched
        let err = engine.start(Box::new(|_, _| {})).unwrap_err();
        assert!(matches!(err, SpeechError::NotReady(EngineState::Uninitialized)));
        assert!(!engine.is_listening());
    }

    #[tokio::test]
    async fn test_start_after_error_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskModelStore::new(dir.path().join("store"));
        let mut engine = PracticeEngine::new(broken_config(dir.path()));
        let _ = engine.init(&store, &NullFactory).await;

        let err = engine.start(Box::new(|_, _| {})).unwrap_err();
        assert!(matches!(err, SpeechError::NotReady(EngineState::Error)));
    }

    #[tokio::test]
    async fn test_stop_without_session_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = PracticeEngine::new(offline_config(dir.path()));
        engine.stop().await;
        engine.stop().await;
        assert!(!engine.is_listening());
    }

    #[tokio::test]
    async fn test_device_failure_keeps_state_ready() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskModelStore::new(dir.path().join("store"));
        let mut engine = PracticeEngine::new(offline_config(dir.path()))
            .with_audio_input(Box::new(NoDeviceInput));
        engine.init(&store, &NullFactory).await.unwrap();

        let err = engine.start(Box::new(|_, _| {})).unwrap_err();
        assert!(matches!(err, SpeechError::DeviceAccess(_)));
        assert!(!err.is_fatal());
        assert_eq!(engine.state(), EngineState::Ready);
        assert!(!engine.is_listening());

        // a retry is admitted, not rejected as already listening
        let err = engine.start(Box::new(|_, _| {})).unwrap_err();
        assert!(matches!(err, SpeechError::DeviceAccess(_)));
    }

    #[tokio::test]
    async fn test_start_while_listening_returns_already_listening() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskModelStore::new(dir.path().join("store"));
        let (input, _pauses) = SilentInput::new();
        let mut engine =
            PracticeEngine::new(offline_config(dir.path())).with_audio_input(Box::new(input));
        engine.init(&store, &NullFactory).await.unwrap();

        engine.start(Box::new(|_, _| {})).unwrap();
        assert!(engine.is_listening());

        let err = engine.start(Box::new(|_, _| {})).unwrap_err();
        assert!(matches!(err, SpeechError::AlreadyListening));
        assert!(engine.is_listening());

        // after stop the session slot is free again
        engine.stop().await;
        engine.start(Box::new(|_, _| {})).unwrap();
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_stop_releases_the_input_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskModelStore::new(dir.path().join("store"));
        let (input, pauses) = SilentInput::new();
        let mut engine =
            PracticeEngine::new(offline_config(dir.path())).with_audio_input(Box::new(input));
        engine.init(&store, &NullFactory).await.unwrap();

        engine.start(Box::new(|_, _| {})).unwrap();
        engine.stop().await;
        engine.stop().await;
        assert_eq!(pauses.load(Ordering::SeqCst), 1);
        assert!(!engine.is_listening());
    }

    #[tokio::test]
    async fn test_stop_delivers_the_flushed_hypothesis() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskModelStore::new(dir.path().join("store"));
        let (input, _pauses) = SilentInput::new();
        let mut engine =
            PracticeEngine::new(offline_config(dir.path())).with_audio_input(Box::new(input));
        engine
            .init(&store, &PendingFactory("see you later".into()))
            .await
            .unwrap();
        engine.set_targets(["see you later"]);

        let delivered: Arc<Mutex<Vec<(String, MatchResult)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        engine
            .start(Box::new(move |text, result| {
                sink.lock().unwrap().push((text.to_string(), result));
            }))
            .unwrap();

        // no audio arrives; the utterance only surfaces on finalize
        engine.stop().await;

        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, "see you later");
        assert!(delivered[0].1.matched);
        assert_eq!(delivered[0].1.score, 100);
    }

    #[tokio::test]
    async fn test_init_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskModelStore::new(dir.path().join("store"));
        let mut engine = PracticeEngine::new(offline_config(dir.path()));
        engine.init(&store, &NullFactory).await.unwrap();

        let err = engine.init(&store, &NullFactory).await.unwrap_err();
        assert!(matches!(err, SpeechError::EngineInit(_)));
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[tokio::test]
    async fn test_set_targets_replaces_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = PracticeEngine::new(offline_config(dir.path()));

        engine.set_targets(["Hello", "Good Morning"]);
        let targets: Vec<String> = engine.targets().iter().map(str::to_string).collect();
        assert_eq!(targets, vec!["hello", "good morning"]);

        engine.set_targets(["See You Later"]);
        let targets: Vec<String> = engine.targets().iter().map(str::to_string).collect();
        assert_eq!(targets, vec!["see you later"]);
    }

    fn engine_with_sink(
        config: SpeechConfig,
    ) -> (
        PracticeEngine,
        Arc<Mutex<Vec<(String, StatusKind)>>>,
    ) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&log);
        let engine = PracticeEngine::with_status_sink(
            config,
            Box::new(move |msg, kind| {
                sink_log.lock().unwrap().push((msg.to_string(), kind));
            }),
        );
        (engine, log)
    }
}
