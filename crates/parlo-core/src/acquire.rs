//! Model acquisition.
//!
//! Resolves a usable model asset through an ordered chain: the model store
//! first (zero network I/O when previously cached), then each configured
//! source in turn. Failures of all but the last source are absorbed; the
//! last source is the deterministic offline fallback, so its failure is
//! fatal. Successful fetches are persisted back to the store best-effort.

use std::path::PathBuf;
use std::time::Duration;

use futures_util::StreamExt;

use crate::error::SpeechError;
use crate::http::get_http_client;
use crate::store::{ModelAsset, ModelStore};
use crate::verbose;

/// One step of the acquisition chain.
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// Remote mirror, cancelled when the time budget elapses.
    Mirror { url: String, timeout: Duration },
    /// Bundled/local archive with no time bound.
    LocalFile { path: PathBuf },
}

impl AssetSource {
    /// Human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            AssetSource::Mirror { url, .. } => format!("mirror {url}"),
            AssetSource::LocalFile { path } => format!("local file {}", path.display()),
        }
    }

    async fn fetch(&self) -> Result<ModelAsset, SpeechError> {
        match self {
            AssetSource::Mirror { url, timeout } => fetch_mirror(url, *timeout).await,
            AssetSource::LocalFile { path } => tokio::fs::read(path)
                .await
                .map(ModelAsset::new)
                .map_err(|e| SpeechError::FallbackSource(format!("{}: {e}", path.display()))),
        }
    }
}

/// Download from the mirror under a time budget.
///
/// The whole transfer (request and body) runs inside `tokio::time::timeout`;
/// on expiry the future is dropped, which aborts the connection and releases
/// any partially transferred data.
async fn fetch_mirror(url: &str, budget: Duration) -> Result<ModelAsset, SpeechError> {
    let download = async {
        let response = get_http_client()
            .get(url)
            .send()
            .await
            .map_err(|e| SpeechError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Network(format!("{url}: HTTP {status}")));
        }

        let mut stream = response.bytes_stream();
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SpeechError::Network(e.to_string()))?;
            bytes.extend_from_slice(&chunk);
        }
        Ok(ModelAsset::new(bytes))
    };

    match tokio::time::timeout(budget, download).await {
        Ok(result) => result,
        Err(_) => Err(SpeechError::NetworkTimeout(budget)),
    }
}

/// Acquire the model asset.
///
/// Order: store lookup under `cache_key` (store errors are logged and
/// treated as a miss), then each source in `sources`. The first success is
/// persisted under `cache_key` (persistence failure is logged, not
/// propagated) and returned. If every source fails, the last source's error
/// surfaces to the caller.
pub async fn acquire_model<S: ModelStore>(
    store: &S,
    cache_key: &str,
    sources: &[AssetSource],
) -> Result<ModelAsset, SpeechError> {
    match store.get(cache_key) {
        Ok(Some(asset)) => {
            verbose!("model loaded from store ({} bytes)", asset.len());
            return Ok(asset);
        }
        Ok(None) => {}
        Err(err) => verbose!("model store lookup failed, treating as miss: {err}"),
    }

    let mut last_err = None;
    for source in sources {
        verbose!("fetching model from {}", source.describe());
        match source.fetch().await {
            Ok(asset) => {
                verbose!("model fetched from {} ({} bytes)", source.describe(), asset.len());
                if let Err(err) = store.put(cache_key, &asset) {
                    verbose!("model store save failed: {err}");
                }
                return Ok(asset);
            }
            Err(err) => {
                verbose!("{} failed: {err}", source.describe());
                last_err = Some(err);
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| SpeechError::FallbackSource("no acquisition sources configured".into())))
}
