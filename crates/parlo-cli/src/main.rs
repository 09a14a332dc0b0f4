//! parlo command line interface.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use parlo_core::set_verbose;

/// Default mirror for the packaged practice model.
const DEFAULT_MODEL_URL: &str =
    "https://github.com/vpietri-stack/speechtest3/raw/main/model.tar.gz";

#[derive(Parser)]
#[command(
    name = "parlo",
    version,
    about = "Practice speaking sentences with offline speech recognition"
)]
struct Cli {
    /// Print verbose diagnostics
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a practice session against the microphone
    Practice {
        /// Target sentence to practice (repeat for alternatives)
        #[arg(long = "target", value_name = "SENTENCE", required = true)]
        targets: Vec<String>,

        /// Mirror URL for the packaged model (also the cache key)
        #[arg(long, default_value = DEFAULT_MODEL_URL)]
        model_url: String,

        /// Bundled model archive used when the mirror is unreachable
        #[arg(long, value_name = "PATH", default_value = "model.tar.gz")]
        fallback: PathBuf,

        /// Similarity threshold in percent for a match
        #[arg(long, default_value_t = parlo_core::DEFAULT_MATCH_THRESHOLD)]
        threshold: u8,
    },

    /// List audio input devices
    Devices,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    set_verbose(cli.verbose);

    match cli.command {
        Command::Practice { targets, model_url, fallback, threshold } => {
            practice(targets, model_url, fallback, threshold).await
        }
        Command::Devices => devices(),
    }
}

fn devices() -> Result<()> {
    for device in parlo_core::list_input_devices()? {
        let marker = if device.is_default { " (default)" } else { "" };
        println!("{}{marker}", device.name);
    }
    Ok(())
}

#[cfg(feature = "vosk-engine")]
async fn practice(
    targets: Vec<String>,
    model_url: String,
    fallback: PathBuf,
    threshold: u8,
) -> Result<()> {
    use parlo_core::{
        DiskModelStore, PracticeEngine, SpeechConfig, StatusKind, VoskFactory,
    };

    let config = SpeechConfig::new(model_url, fallback).with_match_threshold(threshold);
    let mut engine = PracticeEngine::with_status_sink(
        config,
        Box::new(|message, kind| {
            let label = match kind {
                StatusKind::Loading => "loading",
                StatusKind::Ready => "ready",
                StatusKind::Error => "error",
            };
            eprintln!("[{label}] {message}");
        }),
    );

    let store = DiskModelStore::new(DiskModelStore::default_dir());
    let factory = VoskFactory::new(VoskFactory::default_dir());
    engine.init(&store, &factory).await?;
    engine.set_targets(targets);

    engine.start(Box::new(|text, result| {
        if result.matched {
            let target = result.target.as_deref().unwrap_or_default();
            println!("  \"{text}\"  ->  matched \"{target}\" ({}%)", result.score);
        } else if let Some(target) = result.target.as_deref() {
            println!(
                "  \"{text}\"  ->  no match (best \"{target}\" at {}%)",
                result.score
            );
        } else {
            println!("  \"{text}\"  ->  no match");
        }
    }))?;

    println!("Listening. Speak one of the target sentences; press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    // waits for the final flushed hypothesis to reach the callback
    engine.stop().await;
    println!("Stopped.");
    Ok(())
}

#[cfg(not(feature = "vosk-engine"))]
async fn practice(
    _targets: Vec<String>,
    _model_url: String,
    _fallback: PathBuf,
    _threshold: u8,
) -> Result<()> {
    anyhow::bail!("this build has no recognition engine; rebuild with `--features vosk-engine`")
}
