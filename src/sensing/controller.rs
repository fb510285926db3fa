use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audio::CueEngineHandle;
use crate::error::MediaError;
use crate::inference::InferenceClient;
use crate::settings::CaptureSettings;

use super::camera::{Camera, CaptureConstraints, StreamHandle};
use super::loop_worker::{capture_loop, RecordingContext};
use super::publisher::{CaptureSnapshot, CaptureStatus, Publisher};

struct CameraSession {
    id: Uuid,
    stream: StreamHandle,
    recorder: Option<Recorder>,
}

struct Recorder {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

struct CaptureState {
    status: CaptureStatus,
    // Bumped whenever the camera is switched on or off, so an acquisition
    // that resolves late can tell it was abandoned.
    attempt: u64,
    session: Option<CameraSession>,
}

/// Camera, recording loop and sound switch behind one state machine:
///
/// `Idle -> CameraAcquiring -> CameraActive <-> Recording`, and any state with
/// the camera on goes to `Stopped` when it is switched off.
pub struct CaptureController {
    camera: Arc<dyn Camera>,
    inference: Arc<dyn InferenceClient>,
    cues: Arc<CueEngineHandle>,
    settings: CaptureSettings,
    publisher: Arc<Publisher>,
    state: Mutex<CaptureState>,
}

impl CaptureController {
    pub fn new(
        camera: Arc<dyn Camera>,
        inference: Arc<dyn InferenceClient>,
        cues: Arc<CueEngineHandle>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            camera,
            inference,
            cues,
            settings,
            publisher: Arc::new(Publisher::new()),
            state: Mutex::new(CaptureState {
                status: CaptureStatus::Idle,
                attempt: 0,
                session: None,
            }),
        }
    }

    pub async fn status(&self) -> CaptureStatus {
        self.state.lock().await.status
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        self.publisher.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureSnapshot> {
        self.publisher.subscribe()
    }

    /// Requests the camera. Returns once the stream is showing or the request
    /// failed; a failure sends the controller back to `Idle`.
    pub async fn enable_camera(&self) -> Result<(), MediaError> {
        let attempt = {
            let mut state = self.state.lock().await;
            match state.status {
                CaptureStatus::Idle | CaptureStatus::Stopped => {}
                _ => return Ok(()),
            }
            state.attempt += 1;
            self.transition(&mut state, CaptureStatus::CameraAcquiring);
            state.attempt
        };

        let constraints = CaptureConstraints::from(&self.settings);
        let acquired = self.camera.acquire(&constraints).await;

        let mut state = self.state.lock().await;
        if state.attempt != attempt {
            info!("camera switched off while acquiring; releasing the late stream");
            if let Ok(mut stream) = acquired {
                stream.stop_tracks();
            }
            return Ok(());
        }

        match acquired {
            Ok(stream) => {
                let session = CameraSession {
                    id: Uuid::new_v4(),
                    stream: StreamHandle::new(stream),
                    recorder: None,
                };
                info!("camera session {} started", session.id);
                state.session = Some(session);
                self.publisher.clear_error();
                self.transition(&mut state, CaptureStatus::CameraActive);
                Ok(())
            }
            Err(err) => {
                let err = match err {
                    MediaError::Acquisition(_) => err,
                    other => MediaError::Acquisition(other.to_string()),
                };
                error!("{err}");
                self.publisher.set_error(err.to_string());
                self.transition(&mut state, CaptureStatus::Idle);
                Err(err)
            }
        }
    }

    /// Stops recording, then every camera track. Nothing from the old session
    /// is published after this returns.
    pub async fn disable_camera(&self) {
        let mut state = self.state.lock().await;
        if state.status == CaptureStatus::Idle {
            return;
        }

        state.attempt += 1;
        if let Some(mut session) = state.session.take() {
            if let Some(recorder) = session.recorder.take() {
                self.stop_recorder(recorder).await;
            }
            session.stream.release();
            info!("camera session {} stopped", session.id);
        }
        self.transition(&mut state, CaptureStatus::Stopped);
    }

    /// Returns whether the camera is on afterwards.
    pub async fn toggle_camera(&self) -> Result<bool, MediaError> {
        match self.status().await {
            CaptureStatus::Idle | CaptureStatus::Stopped => {
                self.enable_camera().await?;
                Ok(true)
            }
            _ => {
                self.disable_camera().await;
                Ok(false)
            }
        }
    }

    /// Starts the tick loop. Only valid while the camera is showing.
    pub async fn start_recording(&self) -> Result<(), MediaError> {
        let mut state = self.state.lock().await;
        match state.status {
            CaptureStatus::CameraActive => {}
            CaptureStatus::Recording => return Ok(()),
            other => {
                return Err(MediaError::InvalidTransition {
                    action: "start recording",
                    status: other.as_str(),
                })
            }
        }

        let Some(session) = state.session.as_mut() else {
            return Err(MediaError::InvalidTransition {
                action: "start recording",
                status: CaptureStatus::Idle.as_str(),
            });
        };

        let generation = self.publisher.begin_generation();
        let ctx = RecordingContext {
            stream: session.stream.clone(),
            inference: Arc::clone(&self.inference),
            publisher: Arc::clone(&self.publisher),
            cues: Arc::clone(&self.cues),
            jpeg_quality: self.settings.jpeg_quality,
            generation,
        };
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(capture_loop(
            ctx,
            self.settings.tick_interval(),
            cancel_token.clone(),
        ));
        session.recorder = Some(Recorder {
            handle,
            cancel_token,
        });

        info!(
            "recording started on camera session {} every {}ms",
            session.id, self.settings.tick_interval_ms
        );
        self.transition(&mut state, CaptureStatus::Recording);
        Ok(())
    }

    /// Stops the tick loop and keeps the camera on. No-op unless recording.
    pub async fn stop_recording(&self) {
        let mut state = self.state.lock().await;
        if state.status != CaptureStatus::Recording {
            return;
        }

        let recorder = state
            .session
            .as_mut()
            .and_then(|session| session.recorder.take());
        if let Some(recorder) = recorder {
            self.stop_recorder(recorder).await;
        }
        self.transition(&mut state, CaptureStatus::CameraActive);
    }

    /// Returns whether recording is on afterwards.
    pub async fn toggle_recording(&self) -> Result<bool, MediaError> {
        if self.status().await == CaptureStatus::Recording {
            self.stop_recording().await;
            Ok(false)
        } else {
            self.start_recording().await?;
            Ok(true)
        }
    }

    /// Flips the sound switch; returns whether sound is on afterwards.
    pub fn toggle_sound(&self) -> Result<bool, MediaError> {
        Ok(!self.cues.toggle_muted()?)
    }

    pub fn sound_enabled(&self) -> bool {
        !self.cues.is_muted()
    }

    async fn stop_recorder(&self, recorder: Recorder) {
        recorder.cancel_token.cancel();
        self.publisher.end_generation();
        if let Err(err) = recorder.handle.await {
            warn!("capture loop task failed to join: {err}");
        }
    }

    fn transition(&self, state: &mut CaptureState, status: CaptureStatus) {
        state.status = status;
        self.publisher.set_status(status);
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(mut session) = state.session.take() {
            if let Some(recorder) = session.recorder.take() {
                recorder.cancel_token.cancel();
                recorder.handle.abort();
            }
            self.publisher.end_generation();
            session.stream.release();
        }
    }
}
