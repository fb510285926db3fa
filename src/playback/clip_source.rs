use async_trait::async_trait;

use crate::error::MediaError;
use crate::models::ClipReference;

use super::surface::VideoFrame;

/// Loads clips from the clip library.
#[async_trait]
pub trait ClipSource: Send + Sync {
    /// Begins loading `clip` and resolves once it is ready to play.
    async fn open(&self, clip: &ClipReference) -> Result<Box<dyn ClipStream>, MediaError>;
}

/// A loaded clip. Dropping the stream stops decoding.
#[async_trait]
pub trait ClipStream: Send {
    /// Starts playback.
    async fn play(&mut self) -> Result<(), MediaError> {
        Ok(())
    }

    /// Next decoded frame, or `Ok(None)` once the clip has ended.
    ///
    /// Must be cancel-safe: the sequencer races it against the frame clock.
    async fn next_frame(&mut self) -> Result<Option<VideoFrame>, MediaError>;
}
