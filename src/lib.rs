pub mod audio;
mod cli;
pub mod composer;
pub mod error;
pub mod inference;
pub mod models;
pub mod playback;
pub mod sensing;
pub mod settings;
pub mod utils;

use anyhow::{Context, Result};
use clap::Parser;

pub use audio::CueEngineHandle;
pub use composer::{Composition, FormComposer};
pub use error::{MediaError, ValidationError};
pub use playback::{PlaybackHandle, PlaybackOutcome, Sequencer};
pub use sensing::{CaptureController, CaptureSnapshot, CaptureStatus};
pub use settings::{MediaSettings, SettingsStore};

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = cli::Cli::parse();
    log::info!("signaid starting up...");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?
        .block_on(cli::dispatch(cli))
}
