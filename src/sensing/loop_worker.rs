use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::audio::CueEngineHandle;
use crate::inference::InferenceClient;

use super::camera::StreamHandle;
use super::encode::encode_jpeg;
use super::publisher::{Applied, Publisher};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_debug, log_info, log_warn};

/// Everything one recording session needs.
pub struct RecordingContext {
    pub stream: StreamHandle,
    pub inference: Arc<dyn InferenceClient>,
    pub publisher: Arc<Publisher>,
    pub cues: Arc<CueEngineHandle>,
    pub jpeg_quality: u8,
    pub generation: u64,
}

/// Fires every `tick_interval` (first tick one interval after start) and runs
/// at most one snapshot/encode/predict cycle at a time. A tick that finds the
/// previous cycle still running does nothing.
pub async fn capture_loop(
    ctx: RecordingContext,
    tick_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + tick_interval, tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctx = Arc::new(ctx);
    let slot = Arc::new(Semaphore::new(1));
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("capture loop for session {} shutting down after {} ticks", ctx.generation, tick);
                break;
            }
            _ = ticker.tick() => {
                tick += 1;

                if !ctx.stream.is_live() {
                    log_debug!("tick {tick}: camera stream not live, skipping");
                    continue;
                }

                let permit = match Arc::clone(&slot).try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        log_debug!("tick {tick}: previous request still in flight, skipping");
                        continue;
                    }
                };

                let ctx = Arc::clone(&ctx);
                let cancel_token = cancel_token.clone();
                tokio::spawn(async move {
                    let _in_flight = InFlight::new(&ctx, permit);
                    run_cycle(&ctx, tick, &cancel_token).await;
                });
            }
        }
    }
}

/// Holds the overlap slot for one cycle and clears the processing flag on the
/// way out, whichever path the cycle leaves by.
struct InFlight {
    publisher: Arc<Publisher>,
    generation: u64,
    _permit: OwnedSemaphorePermit,
}

impl InFlight {
    fn new(ctx: &RecordingContext, permit: OwnedSemaphorePermit) -> Self {
        ctx.publisher.set_processing(ctx.generation, true);
        Self {
            publisher: Arc::clone(&ctx.publisher),
            generation: ctx.generation,
            _permit: permit,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.publisher.set_processing(self.generation, false);
    }
}

async fn run_cycle(ctx: &RecordingContext, tick: u64, cancel_token: &CancellationToken) {
    let cycle_start = Instant::now();

    let frame = match ctx.stream.snapshot() {
        Ok(frame) => frame,
        Err(err) => {
            ctx.publisher.apply_error(ctx.generation, err.to_string());
            return;
        }
    };
    let (width, height) = (frame.width, frame.height);

    let quality = ctx.jpeg_quality;
    let jpeg = match tokio::task::spawn_blocking(move || encode_jpeg(&frame, quality)).await {
        Ok(Ok(jpeg)) => jpeg,
        Ok(Err(err)) => {
            ctx.publisher.apply_error(ctx.generation, err.to_string());
            return;
        }
        Err(err) => {
            ctx.publisher
                .apply_error(ctx.generation, format!("frame encoder worker join failed: {err}"));
            return;
        }
    };
    log_debug!("tick {tick}: encoded {width}x{height} frame as {} byte JPEG", jpeg.len());

    let reply = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => {
            log_debug!("tick {tick}: session torn down, abandoning request");
            return;
        }
        reply = ctx.inference.predict_frame(jpeg) => reply,
    };

    let response = match reply {
        Ok(response) => response,
        Err(err) => {
            ctx.publisher.apply_error(ctx.generation, err.to_string());
            return;
        }
    };

    // Queued under the generation lock: no cue after teardown returns.
    let applied = ctx.publisher.apply_response(ctx.generation, response, |result| {
        if let Some(cue) = result.audio.clone() {
            if let Err(err) = ctx.cues.play(cue) {
                log_warn!("tick {tick}: {err}");
            }
        }
    });

    match applied {
        Applied::Published(result) => {
            log_info!(
                "tick {tick}: {} ({}) in {}ms",
                result.label,
                result.confidence_display(),
                cycle_start.elapsed().as_millis()
            );
        }
        Applied::Incomplete => {
            log_warn!("tick {tick}: reply missing label or confidence, keeping previous result");
        }
        Applied::Stale => {}
    }
}
