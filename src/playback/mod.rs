pub mod clip_source;
pub mod clock;
pub mod ffmpeg;
pub mod sequencer;
pub mod surface;

pub use clip_source::{ClipSource, ClipStream};
pub use clock::{FrameClock, FrameClockFactory, IntervalFrameClock};
pub use ffmpeg::FfmpegClipSource;
pub use sequencer::{PlaybackHandle, PlaybackOutcome, Sequencer};
pub use surface::{save_snapshot, DrawingSurface, FrameBufferSurface, SurfaceSize, VideoFrame};
