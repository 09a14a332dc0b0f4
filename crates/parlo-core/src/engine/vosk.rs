//! Bundled Vosk recognition engine.
//!
//! Creates a Kaldi recognizer from the packaged model archive (gzip'd tar).
//! The archive is unpacked next to the model store; word-level metadata is
//! enabled so hypotheses carry timing information for future use.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use vosk::{DecodingState, Model, Recognizer};

use super::{EngineFactory, SpeechEngine};
use crate::error::SpeechError;
use crate::store::ModelAsset;
use crate::verbose;

/// Factory for [`VoskEngine`] instances.
#[derive(Debug, Clone)]
pub struct VoskFactory {
    unpack_dir: PathBuf,
}

impl VoskFactory {
    /// `unpack_dir` is where the model archive gets extracted. It is wiped
    /// and repopulated on every engine creation.
    pub fn new(unpack_dir: impl Into<PathBuf>) -> Self {
        Self { unpack_dir: unpack_dir.into() }
    }

    /// Default unpack location: `<data_local_dir>/parlo/engine`.
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parlo")
            .join("engine")
    }
}

impl EngineFactory for VoskFactory {
    fn create(
        &self,
        asset: &ModelAsset,
        sample_rate: u32,
    ) -> Result<Box<dyn SpeechEngine>, SpeechError> {
        // Kaldi prints copious init chatter otherwise
        vosk::set_log_level(vosk::LogLevel::Error);

        let model_dir = unpack_archive(asset, &self.unpack_dir)?;
        verbose!("loading vosk model from {}", model_dir.display());

        let model = Model::new(model_dir.to_string_lossy()).ok_or_else(|| {
            SpeechError::EngineInit(format!("failed to load model from {}", model_dir.display()))
        })?;

        let mut recognizer = Recognizer::new(&model, sample_rate as f32).ok_or_else(|| {
            SpeechError::EngineInit(format!("failed to create recognizer at {sample_rate} Hz"))
        })?;
        recognizer.set_words(true);

        Ok(Box::new(VoskEngine { recognizer, _model: model }))
    }
}

/// Streaming recognizer over a loaded Vosk model.
pub struct VoskEngine {
    recognizer: Recognizer,
    _model: Model,
}

impl SpeechEngine for VoskEngine {
    fn accept_frame(&mut self, frame: &[i16]) -> Option<String> {
        match self.recognizer.accept_waveform(frame) {
            Ok(DecodingState::Finalized) => self
                .recognizer
                .result()
                .single()
                .map(|r| r.text.to_string())
                .filter(|text| !text.is_empty()),
            Ok(_) => None,
            Err(err) => {
                verbose!("recognizer rejected frame: {err:?}");
                None
            }
        }
    }

    fn finalize(&mut self) -> Option<String> {
        self.recognizer
            .final_result()
            .single()
            .map(|r| r.text.to_string())
            .filter(|text| !text.is_empty())
    }
}

/// Extract the gzip'd tar model archive into `dir` and return the model
/// root inside it (archives usually wrap the model in one top-level
/// directory).
fn unpack_archive(asset: &ModelAsset, dir: &Path) -> Result<PathBuf, SpeechError> {
    let init_err =
        |what: &str, e: std::io::Error| SpeechError::EngineInit(format!("{what}: {e}"));

    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| init_err("clear unpack dir", e))?;
    }
    fs::create_dir_all(dir).map_err(|e| init_err("create unpack dir", e))?;

    let mut archive = Archive::new(GzDecoder::new(Cursor::new(asset.as_bytes())));
    archive
        .unpack(dir)
        .map_err(|e| init_err("unpack model archive", e))?;

    locate_model_root(dir)
}

fn looks_like_model_root(dir: &Path) -> bool {
    dir.join("am").is_dir() || dir.join("conf").is_dir() || dir.join("final.mdl").is_file()
}

fn locate_model_root(dir: &Path) -> Result<PathBuf, SpeechError> {
    if looks_like_model_root(dir) {
        return Ok(dir.to_path_buf());
    }

    let entries = fs::read_dir(dir)
        .map_err(|e| SpeechError::EngineInit(format!("scan unpack dir: {e}")))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && looks_like_model_root(&path) {
            return Ok(path);
        }
    }

    Err(SpeechError::EngineInit(
        "model archive did not contain a recognizable model directory".into(),
    ))
}
