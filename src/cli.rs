use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::audio::CueEngineHandle;
use crate::composer::{compose, FormComposer};
use crate::inference::{HttpInferenceClient, InferenceClient};
use crate::models::{MealTiming, PillCount, PillType, Selection, TimeOfDay};
use crate::playback::{save_snapshot, FfmpegClipSource, FrameBufferSurface, Sequencer, SurfaceSize, VideoFrame};
use crate::sensing::{encode_jpeg, CaptureController, CaptureSnapshot, StillImageCamera};
use crate::settings::{MediaSettings, SettingsStore, SoundSettings};

#[derive(Parser)]
#[command(name = "signaid")]
#[command(about = "Sign-language aid: medication clips and live sign recognition", long_about = None)]
pub struct Cli {
    /// Settings file; defaults are used when it is missing or unreadable
    #[arg(long, env = "SIGNAID_SETTINGS", default_value = "signaid-settings.json")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the clip sequence for a medication form, optionally playing it
    Compose(ComposeArgs),
    /// Send one image to the inference service
    Predict {
        image: PathBuf,
    },
    /// Run the capture loop against a still image
    Capture {
        image: PathBuf,
        #[arg(long, default_value_t = 5)]
        ticks: u32,
    },
    /// Show inference service health and its label vocabulary
    Health,
    /// Switch inference audio cues on or off; flips the saved setting when no
    /// flag is given
    Sound {
        #[arg(long, conflicts_with = "off")]
        on: bool,
        #[arg(long)]
        off: bool,
    },
}

#[derive(Args)]
struct ComposeArgs {
    #[arg(long = "time")]
    times: Vec<TimeOfDay>,
    #[arg(long)]
    pill_type: Option<PillType>,
    #[arg(long)]
    pill_count: Option<PillCount>,
    #[arg(long)]
    meal: Option<MealTiming>,
    /// Decode the clips with ffmpeg onto an in-memory surface
    #[arg(long)]
    play: bool,
    /// Write the final surface to a PNG (needs --play)
    #[arg(long, requires = "play")]
    snapshot: Option<PathBuf>,
    /// Play the composed sequence again this many times (needs --play)
    #[arg(long, requires = "play", default_value_t = 0)]
    replay: u32,
}

impl ComposeArgs {
    fn selection(&self) -> Selection {
        let mut selection = Selection::new();
        selection.times.extend(self.times.iter().copied());
        selection.pill_type = self.pill_type;
        selection.pill_count = self.pill_count;
        selection.meal_timing = self.meal;
        selection
    }
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let store = SettingsStore::new(cli.settings.clone())?;
    let settings = store.snapshot();

    match cli.command {
        Commands::Compose(args) => compose_command(&settings, args).await,
        Commands::Predict { image } => predict_command(&settings, &image).await,
        Commands::Capture { image, ticks } => capture_command(&settings, &image, ticks).await,
        Commands::Health => health_command(&settings).await,
        Commands::Sound { on, off } => sound_command(&store, on, off),
    }
}

async fn compose_command(settings: &MediaSettings, args: ComposeArgs) -> Result<()> {
    let selection = args.selection();
    let library = settings.playback.library();

    if !args.play {
        let composition = compose(&selection, &library)?;
        println!("{}", composition.summary);
        for clip in composition.sequence.iter() {
            println!("  {:<10} {}", clip.key(), clip.address());
        }
        return Ok(());
    }

    let size = SurfaceSize::new(settings.playback.surface_width, settings.playback.surface_height);
    let sequencer = Arc::new(Sequencer::new(
        Box::new(FrameBufferSurface::new(size)),
        Arc::new(FfmpegClipSource::new()),
        settings.playback.frame_period(),
    ));
    let composer = FormComposer::new(library, Arc::clone(&sequencer));

    let (composition, handle) = composer.submit(&selection)?;
    println!("{}", composition.summary);
    let outcome = handle.finished().await;
    println!("{outcome:?}");

    for round in 1..=args.replay {
        let outcome = composer.replay().finished().await;
        println!("replay {round}: {outcome:?}");
    }

    if let Some(path) = args.snapshot {
        sequencer
            .with_surface(|surface| save_snapshot(surface, &path))
            .await?;
        println!("surface written to {}", path.display());
    }
    Ok(())
}

async fn predict_command(settings: &MediaSettings, image_path: &Path) -> Result<()> {
    let image = image::open(image_path)
        .with_context(|| format!("Failed to read image {}", image_path.display()))?
        .to_rgb8();
    let frame = VideoFrame::from_image(0, &image);
    let jpeg = encode_jpeg(&frame, settings.capture.jpeg_quality)?;

    let client = HttpInferenceClient::new(settings.inference.clone())?;
    let response = client.predict_frame(jpeg).await?;
    match response.into_result(0) {
        Some(result) => {
            println!("{} ({})", result.label, result.confidence_display());
            for (label, probability) in &result.probabilities {
                println!("  {label:<16} {:.1}%", probability * 100.0);
            }
            if let Some(cue) = &result.audio {
                println!("  audio cue: {} bytes", cue.bytes().len());
            }
        }
        None => println!("reply had no label/confidence pair"),
    }
    Ok(())
}

async fn capture_command(settings: &MediaSettings, image_path: &Path, ticks: u32) -> Result<()> {
    let camera = Arc::new(StillImageCamera::open(image_path)?);
    let client = Arc::new(HttpInferenceClient::new(settings.inference.clone())?);
    let cues = Arc::new(CueEngineHandle::new(!settings.sound.enabled)?);
    let controller = CaptureController::new(camera, client, Arc::clone(&cues), settings.capture.clone());

    let mut updates = controller.subscribe();
    if !controller.toggle_camera().await? {
        anyhow::bail!("camera was already on");
    }
    controller.start_recording().await?;

    // Half a tick of slack lets the last cycle's reply arrive.
    let interval = settings.capture.tick_interval();
    let deadline = tokio::time::sleep(interval * ticks + interval / 2);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                print_snapshot(&snapshot)?;
            }
        }
    }

    controller.disable_camera().await;
    cues.shutdown();
    Ok(())
}

fn print_snapshot(snapshot: &CaptureSnapshot) -> Result<()> {
    println!("{}", serde_json::to_string(snapshot)?);
    Ok(())
}

async fn health_command(settings: &MediaSettings) -> Result<()> {
    let client = HttpInferenceClient::new(settings.inference.clone())?;
    let health = client.health().await?;
    println!("status: {} (model loaded: {})", health.status, health.model_loaded);

    match client.actions().await {
        Ok(actions) => println!("labels: {}", actions.join(", ")),
        Err(err) => log::warn!("label vocabulary unavailable: {err}"),
    }
    Ok(())
}

fn sound_command(store: &SettingsStore, on: bool, off: bool) -> Result<()> {
    let enabled = match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => !store.sound().enabled,
    };
    store.update_sound(SoundSettings { enabled })?;
    println!("sound {}", if enabled { "on" } else { "off" });
    Ok(())
}
