//! Persistent model store.
//!
//! A small key-value cache for downloaded model assets, keyed by the source
//! identifier (the mirror URL). Writes are idempotent overwrites; at most
//! one entry exists per key.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::error::SpeechError;

/// An opaque, immutable binary model asset (the packaged model archive).
#[derive(Clone, PartialEq, Eq)]
pub struct ModelAsset(Vec<u8>);

impl ModelAsset {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ModelAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAsset").field("len", &self.0.len()).finish()
    }
}

/// Key-value storage for model assets.
///
/// `get` errors are non-fatal by contract: the acquisition manager treats
/// them as cache misses. `put` errors are reported but callers persist
/// best-effort only.
pub trait ModelStore {
    fn get(&self, key: &str) -> Result<Option<ModelAsset>, SpeechError>;
    fn put(&self, key: &str, asset: &ModelAsset) -> Result<(), SpeechError>;
}

/// Filesystem-backed model store.
///
/// Each key maps to one file under the store root. Writes go through a
/// temporary file and an atomic rename so a crashed download never leaves a
/// truncated entry behind.
#[derive(Debug, Clone)]
pub struct DiskModelStore {
    root: PathBuf,
}

impl DiskModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default store location: `<data_local_dir>/parlo/models`.
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parlo")
            .join("models")
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_key(key))
    }
}

/// Turn a URL-like key into a safe file name.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

impl ModelStore for DiskModelStore {
    fn get(&self, key: &str) -> Result<Option<ModelAsset>, SpeechError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .map_err(|e| SpeechError::Cache(format!("read {}: {e}", path.display())))?;
        Ok(Some(ModelAsset::new(bytes)))
    }

    fn put(&self, key: &str, asset: &ModelAsset) -> Result<(), SpeechError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| SpeechError::Cache(format!("create {}: {e}", self.root.display())))?;

        let name = sanitize_key(key);
        let dest = self.root.join(&name);
        // appended, not substituted for the last extension: keys that only
        // differ there must not share a temp path
        let tmp = self.root.join(format!("{name}.download"));

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(asset.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &dest)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            SpeechError::Cache(format!("write {}: {e}", dest.display()))
        })
    }
}
