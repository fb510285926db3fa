#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use signaid::audio::{CueEngineHandle, CueOutput};
use signaid::error::MediaError;
use signaid::inference::InferenceClient;
use signaid::models::{AudioCue, ClipReference, InferenceResponse};
use signaid::playback::{
    ClipSource, ClipStream, DrawingSurface, FrameClock, FrameClockFactory, SurfaceSize, VideoFrame,
};
use signaid::sensing::{Camera, CaptureConstraints, MediaStream};

// ---------------------------------------------------------------- playback

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Clear,
    Draw { key: String, frame: u64 },
}

/// Surface that records every call.
#[derive(Clone, Default)]
pub struct TraceSurface {
    events: Arc<Mutex<Vec<SurfaceEvent>>>,
}

impl TraceSurface {
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Keys of drawn clips with consecutive repeats collapsed.
    pub fn drawn_keys(&self) -> Vec<String> {
        drawn_keys(&self.events())
    }
}

pub fn drawn_keys(events: &[SurfaceEvent]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for event in events {
        if let SurfaceEvent::Draw { key, .. } = event {
            if keys.last() != Some(key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

impl DrawingSurface for TraceSurface {
    fn size(&self) -> SurfaceSize {
        SurfaceSize::new(800, 500)
    }

    fn clear(&mut self) {
        self.events.lock().unwrap().push(SurfaceEvent::Clear);
    }

    fn draw_frame(&mut self, source: &ClipReference, frame: &VideoFrame) {
        self.events.lock().unwrap().push(SurfaceEvent::Draw {
            key: source.key().to_string(),
            frame: frame.index,
        });
    }
}

/// Frame clock that never fires, leaving only the end-of-clip draw.
pub struct SilentClock;

impl SilentClock {
    pub fn factory() -> FrameClockFactory {
        Arc::new(|| Box::new(SilentClock) as Box<dyn FrameClock>)
    }
}

#[async_trait]
impl FrameClock for SilentClock {
    async fn tick(&mut self) {
        std::future::pending::<()>().await;
    }
}

/// Clip source producing a few solid frames per clip at a fixed pace.
pub struct FakeClipSource {
    frames_per_clip: u64,
    frame_delay: Duration,
    broken: HashSet<String>,
    opened: Arc<Mutex<Vec<String>>>,
    open_streams: Arc<AtomicUsize>,
    max_open_streams: Arc<AtomicUsize>,
}

impl FakeClipSource {
    pub fn new(frames_per_clip: u64, frame_delay: Duration) -> Self {
        Self {
            frames_per_clip,
            frame_delay,
            broken: HashSet::new(),
            opened: Arc::default(),
            open_streams: Arc::default(),
            max_open_streams: Arc::default(),
        }
    }

    /// Clips with this key fail to load.
    pub fn with_broken(mut self, key: &str) -> Self {
        self.broken.insert(key.to_string());
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn max_open_streams(&self) -> usize {
        self.max_open_streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClipSource for FakeClipSource {
    async fn open(&self, clip: &ClipReference) -> Result<Box<dyn ClipStream>, MediaError> {
        self.opened.lock().unwrap().push(clip.key().to_string());
        if self.broken.contains(clip.key()) {
            return Err(MediaError::clip(clip.key(), "no such file"));
        }

        let open = self.open_streams.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open_streams.fetch_max(open, Ordering::SeqCst);

        Ok(Box::new(FakeClipStream {
            remaining: self.frames_per_clip,
            next_index: 0,
            frame_delay: self.frame_delay,
            deadline: None,
            open_streams: Arc::clone(&self.open_streams),
        }))
    }
}

struct FakeClipStream {
    remaining: u64,
    next_index: u64,
    frame_delay: Duration,
    // Kept across calls so a dropped `next_frame` future does not restart the wait.
    deadline: Option<Instant>,
    open_streams: Arc<AtomicUsize>,
}

#[async_trait]
impl ClipStream for FakeClipStream {
    async fn next_frame(&mut self) -> Result<Option<VideoFrame>, MediaError> {
        let deadline = *self
            .deadline
            .get_or_insert_with(|| Instant::now() + self.frame_delay);
        tokio::time::sleep_until(deadline).await;
        self.deadline = None;

        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(VideoFrame::filled(index, 4, 3, [10, 20, 30])))
    }
}

impl Drop for FakeClipStream {
    fn drop(&mut self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------- capture

/// Camera whose streams expose their track state to the test.
pub struct FakeCamera {
    deny: bool,
    delay: Duration,
    tracks: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
    frame_failures: Arc<AtomicUsize>,
}

impl FakeCamera {
    pub fn granting() -> Self {
        Self {
            deny: false,
            delay: Duration::ZERO,
            tracks: Arc::default(),
            frame_failures: Arc::default(),
        }
    }

    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::granting()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::granting()
        }
    }

    /// The next `n` frame reads fail as if the track had ended mid-read.
    pub fn fail_next_frames(&self, n: usize) {
        self.frame_failures.store(n, Ordering::SeqCst);
    }

    pub fn tracks_issued(&self) -> usize {
        self.tracks.lock().unwrap().len()
    }

    pub fn live_tracks(&self) -> usize {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .filter(|track| track.load(Ordering::SeqCst))
            .count()
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn acquire(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.deny {
            return Err(MediaError::Acquisition("permission denied".into()));
        }
        let track = Arc::new(AtomicBool::new(true));
        self.tracks.lock().unwrap().push(Arc::clone(&track));
        Ok(Box::new(FakeStream {
            track,
            frame_failures: Arc::clone(&self.frame_failures),
        }))
    }
}

struct FakeStream {
    track: Arc<AtomicBool>,
    frame_failures: Arc<AtomicUsize>,
}

impl MediaStream for FakeStream {
    fn current_frame(&self) -> Result<VideoFrame, MediaError> {
        let failing = self
            .frame_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(MediaError::StreamEnded);
        }
        Ok(VideoFrame::filled(0, 16, 12, [90, 90, 90]))
    }

    fn is_live(&self) -> bool {
        self.track.load(Ordering::SeqCst)
    }

    fn stop_tracks(&mut self) {
        self.track.store(false, Ordering::SeqCst);
    }
}

pub fn reply(label: &str, confidence: Option<f32>, audio: Option<&[u8]>) -> InferenceResponse {
    InferenceResponse {
        label: Some(label.to_string()),
        confidence,
        audio: audio.map(|bytes| bytes.to_vec()),
        ..Default::default()
    }
}

/// Inference endpoint with scripted replies and an optional gate that holds
/// every request until released. A scripted `Err` is returned as a failed
/// request with that message.
pub struct FakeInference {
    calls: AtomicUsize,
    replies: Mutex<VecDeque<Result<InferenceResponse, String>>>,
    gate: Option<Semaphore>,
}

impl FakeInference {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            replies: Mutex::new(VecDeque::new()),
            gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn with_replies(self, replies: Vec<InferenceResponse>) -> Self {
        self.with_script(replies.into_iter().map(Ok).collect())
    }

    pub fn with_script(self, script: Vec<Result<InferenceResponse, String>>) -> Self {
        *self.replies.lock().unwrap() = script.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Lets `n` held requests complete.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }
}

#[async_trait]
impl InferenceClient for FakeInference {
    async fn predict_frame(&self, jpeg: Vec<u8>) -> Result<InferenceResponse, MediaError> {
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "frame should be JPEG");
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|err| MediaError::Inference(err.to_string()))?
                .forget();
        }

        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(MediaError::Inference(message)),
            None => Ok(reply_default()),
        }
    }
}

fn reply_default() -> InferenceResponse {
    reply("hello", Some(0.9), Some(b"ID3"))
}

/// Cue output that records the ids it was asked to start.
pub struct RecordingCueOutput {
    started: Arc<Mutex<Vec<u64>>>,
    playing: bool,
}

impl CueOutput for RecordingCueOutput {
    fn start(&mut self, cue: &AudioCue) -> Result<(), MediaError> {
        self.started.lock().unwrap().push(cue.id());
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

pub fn recording_cues(muted: bool) -> (Arc<CueEngineHandle>, Arc<Mutex<Vec<u64>>>) {
    let started = Arc::new(Mutex::new(Vec::new()));
    let output = RecordingCueOutput {
        started: Arc::clone(&started),
        playing: false,
    };
    let engine = CueEngineHandle::with_output(muted, move || Box::new(output)).unwrap();
    (Arc::new(engine), started)
}
