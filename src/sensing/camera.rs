use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::error::MediaError;
use crate::playback::VideoFrame;
use crate::settings::{CaptureSettings, FacingMode};

/// What the capture loop asks the camera for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
}

impl From<&CaptureSettings> for CaptureConstraints {
    fn from(settings: &CaptureSettings) -> Self {
        Self {
            ideal_width: settings.ideal_width,
            ideal_height: settings.ideal_height,
            facing: settings.facing,
        }
    }
}

/// Camera device access.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Requests a stream; fails with [`MediaError::Acquisition`] when access is
    /// denied or no device matches.
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaError>;
}

/// A live camera stream.
pub trait MediaStream: Send {
    /// Frame currently shown by the stream, at its native resolution.
    fn current_frame(&self) -> Result<VideoFrame, MediaError>;

    /// True while at least one track is still running.
    fn is_live(&self) -> bool;

    /// Stops every track. The stream cannot be restarted.
    fn stop_tracks(&mut self);
}

/// Exclusive handle on the stream of one capture session.
#[derive(Clone)]
pub struct StreamHandle(Arc<Mutex<Box<dyn MediaStream>>>);

impl StreamHandle {
    pub fn new(stream: Box<dyn MediaStream>) -> Self {
        Self(Arc::new(Mutex::new(stream)))
    }

    pub fn snapshot(&self) -> Result<VideoFrame, MediaError> {
        let stream = self.lock();
        if !stream.is_live() {
            return Err(MediaError::StreamEnded);
        }
        stream.current_frame()
    }

    pub fn is_live(&self) -> bool {
        self.lock().is_live()
    }

    pub fn release(&self) {
        self.lock().stop_tracks();
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn MediaStream>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Camera that shows one still image, for headless runs.
pub struct StillImageCamera {
    frame: VideoFrame,
}

impl StillImageCamera {
    pub fn new(frame: VideoFrame) -> Self {
        Self { frame }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("Failed to read image {}", path.display()))?
            .to_rgb8();
        Ok(Self::new(VideoFrame::from_image(0, &image)))
    }
}

#[async_trait]
impl Camera for StillImageCamera {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaError> {
        log::debug!(
            "still camera ignores constraints {}x{} ({:?}); serving {}x{}",
            constraints.ideal_width,
            constraints.ideal_height,
            constraints.facing,
            self.frame.width,
            self.frame.height
        );
        Ok(Box::new(StillImageStream {
            frame: self.frame.clone(),
            live: true,
        }))
    }
}

struct StillImageStream {
    frame: VideoFrame,
    live: bool,
}

impl MediaStream for StillImageStream {
    fn current_frame(&self) -> Result<VideoFrame, MediaError> {
        Ok(self.frame.clone())
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn stop_tracks(&mut self) {
        self.live = false;
    }
}
