//! Recognition engine adapter.
//!
//! A translation boundary between raw audio frames and text hypotheses. The
//! adapter owns the engine instance created from the model asset, feeds it
//! frames synchronously (audio callbacks never suspend) and forwards every
//! finalized hypothesis into a channel. No matching happens here.

#[cfg(feature = "vosk-engine")]
pub mod vosk;

use tokio::sync::mpsc;

use crate::error::SpeechError;
use crate::store::ModelAsset;

/// A streaming speech-recognition engine.
///
/// Implementations consume mono PCM frames at the sample rate they were
/// created with and emit a finalized hypothesis whenever they close a
/// speech segment. Interim partials are not surfaced.
pub trait SpeechEngine: Send {
    /// Feed one frame. Returns a finalized hypothesis if this frame
    /// completed a segment. Must not block beyond the engine's own decode.
    fn accept_frame(&mut self, frame: &[i16]) -> Option<String>;

    /// Flush any buffered audio into a last hypothesis at session end.
    fn finalize(&mut self) -> Option<String>;
}

/// Creates engine instances from an acquired model asset.
pub trait EngineFactory {
    fn create(
        &self,
        asset: &ModelAsset,
        sample_rate: u32,
    ) -> Result<Box<dyn SpeechEngine>, SpeechError>;
}

/// Ordered sequence of finalized hypotheses from one subscription.
pub struct HypothesisStream {
    rx: mpsc::UnboundedReceiver<String>,
}

impl HypothesisStream {
    /// Next finalized hypothesis, or `None` once the subscription closed.
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Owns the initialized engine and fans finalized hypotheses out to the
/// single active subscription.
pub struct EngineAdapter {
    engine: Box<dyn SpeechEngine>,
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl EngineAdapter {
    /// Create the engine from the model asset at the given sample rate.
    pub fn initialize(
        factory: &dyn EngineFactory,
        asset: &ModelAsset,
        sample_rate: u32,
    ) -> Result<Self, SpeechError> {
        let engine = factory.create(asset, sample_rate)?;
        Ok(Self { engine, tx: None })
    }

    /// Open the subscription. A new subscription replaces any previous one,
    /// closing its stream.
    pub fn subscribe(&mut self) -> HypothesisStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        HypothesisStream { rx }
    }

    /// Close the subscription; the stream drains and then ends.
    pub fn unsubscribe(&mut self) {
        self.tx = None;
    }

    /// Feed one frame into the engine, forwarding a finalized hypothesis to
    /// the subscriber. Called from the audio callback: synchronous, no
    /// suspension, returns promptly.
    pub fn push_frame(&mut self, frame: &[i16]) {
        if let Some(text) = self.engine.accept_frame(frame) {
            self.forward(text);
        }
    }

    /// Flush the engine's buffered audio into a final hypothesis.
    pub fn flush(&mut self) {
        if let Some(text) = self.engine.finalize() {
            self.forward(text);
        }
    }

    fn forward(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        if let Some(tx) = &self.tx {
            // the subscriber hanging up is not an engine problem
            let _ = tx.send(text);
        }
    }
}
