//! Audio capture pipeline.
//!
//! Owns the microphone-to-engine connection: a live input stream pushes
//! fixed-size frames into the engine adapter from the audio callback, and a
//! consumer task turns finalized hypotheses into match results for the
//! caller. At most one session is active at a time; it is held as an
//! `Option` by the orchestrator, never as ambient process state.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, StreamConfig};
use tokio::task::JoinHandle;

use crate::engine::EngineAdapter;
use crate::error::SpeechError;
use crate::matcher::{MatchResult, TargetSet, match_hypothesis};
use crate::verbose;

/// Callback consumed by the surrounding UI, invoked once per finalized
/// hypothesis with the recognized text and its match decision.
pub type ResultCallback = Box<dyn Fn(&str, MatchResult) + Send + 'static>;

/// Receives converted mono PCM frames from a live input stream. Runs on the
/// audio callback path: must not block or suspend.
pub type FrameSink = Box<dyn FnMut(&[i16]) + Send + 'static>;

/// Opens audio input streams.
///
/// [`CpalInput`] is the production implementation over the system
/// microphone; substituting another implementation lets session handling
/// run against scripted audio, or no audio at all.
pub trait AudioInput {
    fn open(
        &self,
        sample_rate: u32,
        frame_size: u32,
        sink: FrameSink,
    ) -> Result<Box<dyn InputStream>, SpeechError>;
}

/// A live audio input. Dropping it releases the device.
pub trait InputStream {
    /// Stop delivering frames.
    fn pause(&mut self) -> Result<(), SpeechError>;
}

/// Default microphone input: the system's default cpal input device, mono,
/// fixed-size buffers, samples converted to i16 for the engine. Echo
/// cancellation and noise suppression are left to the platform capture
/// path; cpal exposes no knobs for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalInput;

impl AudioInput for CpalInput {
    fn open(
        &self,
        sample_rate: u32,
        frame_size: u32,
        mut sink: FrameSink,
    ) -> Result<Box<dyn InputStream>, SpeechError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| SpeechError::DeviceAccess("no input device available".into()))?;

        let config = StreamConfig {
            channels: 1,
            sample_rate,
            buffer_size: BufferSize::Fixed(frame_size),
        };

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // synchronous and prompt: convert, hand off, return
                    let frame: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();
                    sink(&frame);
                },
                |err| {
                    verbose!("audio stream error (non-fatal): {err}");
                },
                None,
            )
            .map_err(|e| SpeechError::DeviceAccess(e.to_string()))?;

        stream
            .play()
            .map_err(|e| SpeechError::DeviceAccess(e.to_string()))?;

        Ok(Box::new(CpalStream { stream }))
    }
}

struct CpalStream {
    stream: cpal::Stream,
}

impl InputStream for CpalStream {
    fn pause(&mut self) -> Result<(), SpeechError> {
        self.stream
            .pause()
            .map_err(|e| SpeechError::DeviceAccess(e.to_string()))
    }
}

/// An audio input device visible to the capture pipeline.
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// List all available audio input devices on the system.
pub fn list_input_devices() -> Result<Vec<AudioDeviceInfo>, SpeechError> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.description().ok())
        .map(|d| d.to_string());

    let mut devices = Vec::new();
    let inputs = host
        .input_devices()
        .map_err(|e| SpeechError::DeviceAccess(e.to_string()))?;
    for device in inputs {
        if let Ok(desc) = device.description() {
            let name = desc.to_string();
            devices.push(AudioDeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
            });
        }
    }

    if devices.is_empty() {
        return Err(SpeechError::DeviceAccess("no audio input devices found".into()));
    }
    Ok(devices)
}

/// One active microphone-to-engine connection.
///
/// Created by `start`, destroyed by `stop`.
pub struct RecognitionSession {
    input: Box<dyn InputStream>,
    consumer: JoinHandle<()>,
    listening: bool,
}

impl RecognitionSession {
    /// Open the audio input (mono, `sample_rate` Hz, fixed
    /// `frame_size`-sample buffers) and begin streaming into the adapter.
    ///
    /// Must run inside a tokio runtime: the hypothesis consumer is a
    /// spawned task. Input failures surface as `DeviceAccess` and leave no
    /// resources behind; the subscription only opens once the input is
    /// live.
    pub(crate) fn start(
        input: &dyn AudioInput,
        adapter: Arc<Mutex<EngineAdapter>>,
        targets: Arc<Mutex<TargetSet>>,
        threshold: u8,
        sample_rate: u32,
        frame_size: u32,
        on_result: ResultCallback,
    ) -> Result<Self, SpeechError> {
        let callback_adapter = Arc::clone(&adapter);
        let input = input.open(
            sample_rate,
            frame_size,
            Box::new(move |frame| {
                if let Ok(mut adapter) = callback_adapter.lock() {
                    adapter.push_frame(frame);
                }
            }),
        )?;

        let hypotheses = adapter.lock().unwrap().subscribe();
        let consumer = spawn_consumer(hypotheses, targets, threshold, on_result);

        Ok(Self { input, consumer, listening: true })
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Release the input and the processing resources, then wait for the
    /// consumer to drain. Partial failures are logged, never propagated;
    /// the listening flag clears unconditionally.
    pub(crate) async fn stop(mut self, adapter: &Arc<Mutex<EngineAdapter>>) {
        self.listening = false;

        if let Err(err) = self.input.pause() {
            verbose!("pausing input stream failed: {err}");
        }
        drop(self.input);

        match adapter.lock() {
            Ok(mut adapter) => {
                adapter.flush();
                adapter.unsubscribe();
            }
            Err(_) => verbose!("engine adapter poisoned during stop"),
        }

        // the subscription just closed: the consumer delivers any buffered
        // hypotheses, including the flushed one, then exits
        if let Err(err) = self.consumer.await {
            verbose!("hypothesis consumer ended abnormally: {err}");
        }
    }
}

/// Fan finalized hypotheses out to the matcher and the caller callback, in
/// finalization order.
pub(crate) fn spawn_consumer(
    mut hypotheses: crate::engine::HypothesisStream,
    targets: Arc<Mutex<TargetSet>>,
    threshold: u8,
    on_result: ResultCallback,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(text) = hypotheses.next().await {
            let result = {
                let targets = targets.lock().unwrap();
                match_hypothesis(&text, &targets, threshold)
            };
            on_result(&text, result);
        }
    })
}
