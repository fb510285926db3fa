use async_trait::async_trait;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use log::{debug, warn};
use tokio::sync::mpsc;

use crate::error::MediaError;
use crate::models::ClipReference;

use super::clip_source::{ClipSource, ClipStream};
use super::surface::VideoFrame;

/// Frames decoded ahead of the frame clock.
const FRAME_BACKLOG: usize = 4;

/// Decodes clips with an `ffmpeg` child process at the clip's native rate.
///
/// Requires an `ffmpeg` binary on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegClipSource;

impl FfmpegClipSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClipSource for FfmpegClipSource {
    async fn open(&self, clip: &ClipReference) -> Result<Box<dyn ClipStream>, MediaError> {
        let (tx, mut rx) = mpsc::channel(FRAME_BACKLOG);
        let key = clip.key().to_string();
        let address = clip.address().to_string();

        tokio::task::spawn_blocking(move || decode_clip(&key, &address, tx));

        // The clip is ready to play once its first frame is decoded.
        match rx.recv().await {
            Some(Ok(first)) => Ok(Box::new(FfmpegClipStream {
                pending: Some(first),
                frames: rx,
            })),
            Some(Err(err)) => Err(err),
            None => Err(MediaError::clip(clip.key(), "decoder exited before the first frame")),
        }
    }
}

struct FfmpegClipStream {
    pending: Option<VideoFrame>,
    frames: mpsc::Receiver<Result<VideoFrame, MediaError>>,
}

#[async_trait]
impl ClipStream for FfmpegClipStream {
    async fn next_frame(&mut self) -> Result<Option<VideoFrame>, MediaError> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        self.frames.recv().await.transpose()
    }
}

fn decode_clip(key: &str, address: &str, tx: mpsc::Sender<Result<VideoFrame, MediaError>>) {
    let mut child = match FfmpegCommand::new()
        .arg("-re")
        .input(address)
        .rawvideo()
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            let _ = tx.blocking_send(Err(MediaError::clip(key, format!("ffmpeg spawn failed: {err}"))));
            return;
        }
    };

    let events = match child.iter() {
        Ok(events) => events,
        Err(err) => {
            let _ = child.kill();
            let _ = tx.blocking_send(Err(MediaError::clip(key, err)));
            return;
        }
    };

    let mut decoded: u64 = 0;
    let mut last_error: Option<String> = None;

    for event in events {
        match event {
            FfmpegEvent::OutputFrame(frame) => {
                let frame = VideoFrame::new(decoded, frame.width, frame.height, frame.data);
                decoded += 1;
                if tx.blocking_send(Ok(frame)).is_err() {
                    debug!("clip {key} receiver dropped after {decoded} frames; stopping decoder");
                    let _ = child.kill();
                    break;
                }
            }
            FfmpegEvent::Error(message)
            | FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, message) => {
                last_error = Some(message);
            }
            _ => {}
        }
    }

    if let Err(err) = child.wait() {
        warn!("ffmpeg for clip {key} did not exit cleanly: {err}");
    }

    if decoded == 0 {
        let reason = last_error.unwrap_or_else(|| format!("no frames decoded from {address}"));
        let _ = tx.blocking_send(Err(MediaError::clip(key, reason)));
    } else if let Some(message) = last_error {
        debug!("clip {key} decoded {decoded} frames with ffmpeg errors: {message}");
    }
}
