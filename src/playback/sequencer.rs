use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::MediaError;
use crate::models::{ClipReference, ClipSequence};

use super::clip_source::ClipSource;
use super::clock::{FrameClock, FrameClockFactory, IntervalFrameClock};
use super::surface::DrawingSurface;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// How a playback session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed { played: usize, skipped: usize },
    Superseded,
    Failed(String),
}

/// Completion signal returned by [`Sequencer::play`].
#[derive(Debug)]
pub struct PlaybackHandle {
    session_id: Option<Uuid>,
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Resolved(PlaybackOutcome),
    Running(JoinHandle<PlaybackOutcome>),
}

impl PlaybackHandle {
    fn resolved(outcome: PlaybackOutcome) -> Self {
        Self {
            session_id: None,
            state: HandleState::Resolved(outcome),
        }
    }

    /// Id of the session, `None` when the call was a no-op.
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub async fn finished(self) -> PlaybackOutcome {
        match self.state {
            HandleState::Resolved(outcome) => outcome,
            HandleState::Running(task) => task
                .await
                .unwrap_or_else(|err| PlaybackOutcome::Failed(format!("playback task failed: {err}"))),
        }
    }
}

/// One run of the sequencer over a clip sequence.
struct PlaybackSession {
    id: Uuid,
    sequence: ClipSequence,
    index: usize,
    cancel: CancellationToken,
}

impl PlaybackSession {
    fn new(sequence: ClipSequence) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            index: 0,
            cancel: CancellationToken::new(),
        }
    }

    fn next_clip(&mut self) -> Option<ClipReference> {
        let clip = self.sequence.iter().nth(self.index).cloned();
        self.index += 1;
        clip
    }
}

struct ActiveSession {
    id: Uuid,
    cancel: CancellationToken,
}

enum ClipOutcome {
    Ended,
    Skipped(MediaError),
    Cancelled,
}

/// Plays clip sequences onto a single drawing surface, one session at a time.
///
/// Each session holds the surface lease for its whole lifetime, so a session
/// that supersedes another only starts drawing after the previous one has let
/// go of the surface.
pub struct Sequencer {
    surface: Arc<Mutex<Box<dyn DrawingSurface>>>,
    source: Arc<dyn ClipSource>,
    clock: FrameClockFactory,
    active: Arc<StdMutex<Option<ActiveSession>>>,
    last_sequence: StdMutex<Option<ClipSequence>>,
}

impl Sequencer {
    pub fn new(
        surface: Box<dyn DrawingSurface>,
        source: Arc<dyn ClipSource>,
        frame_period: Duration,
    ) -> Self {
        Self {
            surface: Arc::new(Mutex::new(surface)),
            source,
            clock: IntervalFrameClock::factory(frame_period),
            active: Arc::new(StdMutex::new(None)),
            last_sequence: StdMutex::new(None),
        }
    }

    pub fn with_frame_clock(mut self, clock: FrameClockFactory) -> Self {
        self.clock = clock;
        self
    }

    /// Starts a new session over `sequence`, superseding any active one.
    ///
    /// An empty sequence is a no-op: the active session keeps running and the
    /// returned handle is already resolved.
    pub fn play(&self, sequence: ClipSequence) -> PlaybackHandle {
        if sequence.is_empty() {
            log_debug!("play called with an empty sequence; nothing to do");
            return PlaybackHandle::resolved(PlaybackOutcome::Completed {
                played: 0,
                skipped: 0,
            });
        }

        let session = PlaybackSession::new(sequence.clone());
        let session_id = session.id;

        {
            let mut active = lock(&self.active);
            if let Some(previous) = active.replace(ActiveSession {
                id: session.id,
                cancel: session.cancel.clone(),
            }) {
                log_info!("session {} superseded by {}", previous.id, session.id);
                previous.cancel.cancel();
            }
            *lock(&self.last_sequence) = Some(sequence);
        }

        log_info!(
            "session {} starting with clips [{}]",
            session.id,
            session.sequence.keys().join(", ")
        );

        let task = tokio::spawn(run_session(
            session,
            Arc::clone(&self.surface),
            Arc::clone(&self.source),
            (self.clock)(),
            Arc::clone(&self.active),
        ));

        PlaybackHandle {
            session_id: Some(session_id),
            state: HandleState::Running(task),
        }
    }

    /// Plays the most recently played sequence again.
    pub fn replay(&self) -> PlaybackHandle {
        let last = lock(&self.last_sequence).clone();
        match last {
            Some(sequence) => self.play(sequence),
            None => {
                log_debug!("replay requested before anything was played");
                PlaybackHandle::resolved(PlaybackOutcome::Completed {
                    played: 0,
                    skipped: 0,
                })
            }
        }
    }

    /// Cancels the active session, if any.
    pub fn stop(&self) {
        if let Some(active) = lock(&self.active).take() {
            log_info!("session {} stopped", active.id);
            active.cancel.cancel();
        }
    }

    pub fn active_session(&self) -> Option<Uuid> {
        lock(&self.active).as_ref().map(|active| active.id)
    }

    pub fn last_sequence(&self) -> Option<ClipSequence> {
        lock(&self.last_sequence).clone()
    }

    /// Waits for the surface to be free and reads from it.
    pub async fn with_surface<R>(&self, f: impl FnOnce(&dyn DrawingSurface) -> R) -> R {
        let guard = self.surface.lock().await;
        f(&**guard)
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_session(
    mut session: PlaybackSession,
    surface: Arc<Mutex<Box<dyn DrawingSurface>>>,
    source: Arc<dyn ClipSource>,
    mut clock: Box<dyn FrameClock>,
    active: Arc<StdMutex<Option<ActiveSession>>>,
) -> PlaybackOutcome {
    let outcome = drive_session(&mut session, surface, source.as_ref(), clock.as_mut()).await;

    let mut active = lock(&active);
    if active.as_ref().map(|current| current.id) == Some(session.id) {
        *active = None;
    }
    drop(active);

    match &outcome {
        PlaybackOutcome::Completed { played, skipped } => log_info!(
            "session {} finished: {} played, {} skipped",
            session.id,
            played,
            skipped
        ),
        PlaybackOutcome::Superseded => log_debug!("session {} released the surface", session.id),
        PlaybackOutcome::Failed(reason) => log_warn!("session {} failed: {}", session.id, reason),
    }
    outcome
}

async fn drive_session(
    session: &mut PlaybackSession,
    surface: Arc<Mutex<Box<dyn DrawingSurface>>>,
    source: &dyn ClipSource,
    clock: &mut dyn FrameClock,
) -> PlaybackOutcome {
    let cancel = session.cancel.clone();

    let mut lease: OwnedMutexGuard<Box<dyn DrawingSurface>> = tokio::select! {
        biased;
        _ = cancel.cancelled() => return PlaybackOutcome::Superseded,
        guard = surface.lock_owned() => guard,
    };
    // A session spawned earlier may win the lease after it was superseded.
    if cancel.is_cancelled() {
        return PlaybackOutcome::Superseded;
    }
    lease.clear();

    let mut played = 0;
    let mut skipped = 0;

    while let Some(clip) = session.next_clip() {
        log_debug!("session {} clip {} -> {}", session.id, clip.key(), clip.address());
        match play_clip(&clip, &mut **lease, source, &mut *clock, &cancel).await {
            ClipOutcome::Ended => played += 1,
            ClipOutcome::Skipped(err) => {
                log_warn!("skipping clip {}: {}", clip.key(), err);
                skipped += 1;
            }
            ClipOutcome::Cancelled => return PlaybackOutcome::Superseded,
        }
    }

    PlaybackOutcome::Completed { played, skipped }
}

async fn play_clip(
    clip: &ClipReference,
    surface: &mut dyn DrawingSurface,
    source: &dyn ClipSource,
    clock: &mut dyn FrameClock,
    cancel: &CancellationToken,
) -> ClipOutcome {
    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return ClipOutcome::Cancelled,
        opened = source.open(clip) => match opened {
            Ok(stream) => stream,
            Err(err) => return ClipOutcome::Skipped(err),
        },
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return ClipOutcome::Cancelled,
        started = stream.play() => {
            if let Err(err) = started {
                return ClipOutcome::Skipped(err);
            }
        }
    }

    let mut current = None;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return ClipOutcome::Cancelled,
            _ = clock.tick() => {
                if let Some(frame) = current.as_ref() {
                    if cancel.is_cancelled() {
                        return ClipOutcome::Cancelled;
                    }
                    surface.draw_frame(clip, frame);
                }
            }
            next = stream.next_frame() => match next {
                Ok(Some(frame)) => current = Some(frame),
                Ok(None) => {
                    // The clock may not have fired since the last decoded frame.
                    if let Some(frame) = current.as_ref() {
                        if cancel.is_cancelled() {
                            return ClipOutcome::Cancelled;
                        }
                        surface.draw_frame(clip, frame);
                    }
                    return ClipOutcome::Ended;
                }
                Err(err) => return ClipOutcome::Skipped(err),
            },
        }
    }
}
