use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use serde::Serialize;
use tokio::sync::watch;

use crate::models::{InferenceResponse, PredictionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureStatus {
    Idle,
    CameraAcquiring,
    CameraActive,
    Recording,
    Stopped,
}

impl CaptureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureStatus::Idle => "idle",
            CaptureStatus::CameraAcquiring => "acquiring the camera",
            CaptureStatus::CameraActive => "showing the camera",
            CaptureStatus::Recording => "recording",
            CaptureStatus::Stopped => "stopped",
        }
    }
}

/// What an observer of the capture loop sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    pub status: CaptureStatus,
    pub prediction: Option<PredictionResult>,
    /// A request is in flight.
    pub processing: bool,
    pub last_error: Option<String>,
}

impl Default for CaptureSnapshot {
    fn default() -> Self {
        Self {
            status: CaptureStatus::Idle,
            prediction: None,
            processing: false,
            last_error: None,
        }
    }
}

/// How a reply was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Replaced the published prediction.
    Published(PredictionResult),
    /// Label or confidence missing; previous prediction kept.
    Incomplete,
    /// The recording session that asked for it is gone.
    Stale,
}

/// Publishes capture state and discards results from torn-down sessions.
///
/// Every recording session works under a generation number. Teardown bumps
/// the generation while holding the same lock writers check it under, so no
/// write from an older session can land after teardown returns.
pub struct Publisher {
    tx: watch::Sender<CaptureSnapshot>,
    generation: Mutex<u64>,
    next_cue: AtomicU64,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(CaptureSnapshot::default());
        Self {
            tx,
            generation: Mutex::new(0),
            next_cue: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        self.tx.borrow().clone()
    }

    /// Starts a new session and returns its generation.
    pub fn begin_generation(&self) -> u64 {
        let mut generation = self.lock_generation();
        *generation += 1;
        *generation
    }

    /// Invalidates the current session. Clears the in-flight flag.
    pub fn end_generation(&self) {
        let mut generation = self.lock_generation();
        *generation += 1;
        self.tx.send_if_modified(|snapshot| {
            std::mem::replace(&mut snapshot.processing, false)
        });
    }

    pub fn set_status(&self, status: CaptureStatus) {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.status == status {
                return false;
            }
            snapshot.status = status;
            true
        });
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|snapshot| snapshot.last_error = Some(message));
    }

    pub fn clear_error(&self) {
        self.tx
            .send_if_modified(|snapshot| snapshot.last_error.take().is_some());
    }

    pub fn set_processing(&self, generation: u64, processing: bool) {
        let current = self.lock_generation();
        if *current != generation {
            return;
        }
        self.tx.send_if_modified(|snapshot| {
            std::mem::replace(&mut snapshot.processing, processing) != processing
        });
    }

    /// Publishes `response` if it belongs to the current session and is
    /// complete.
    ///
    /// `on_published` runs before the generation lock is released, so a
    /// teardown racing with this call either happens first and suppresses it
    /// or waits until it has returned. It must not block.
    pub fn apply_response<F>(&self, generation: u64, response: InferenceResponse, on_published: F) -> Applied
    where
        F: FnOnce(&PredictionResult),
    {
        let current = self.lock_generation();
        if *current != generation {
            debug!("discarding reply from session {generation} (now {})", *current);
            return Applied::Stale;
        }

        let cue_id = self.next_cue.fetch_add(1, Ordering::Relaxed);
        let Some(result) = response.into_result(cue_id) else {
            return Applied::Incomplete;
        };

        self.tx.send_modify(|snapshot| {
            snapshot.prediction = Some(result.clone());
            snapshot.last_error = None;
        });
        on_published(&result);
        Applied::Published(result)
    }

    /// Records a failed cycle. The published prediction is left alone.
    pub fn apply_error(&self, generation: u64, message: impl Into<String>) {
        let current = self.lock_generation();
        if *current != generation {
            return;
        }
        let message = message.into();
        warn!("capture cycle failed: {message}");
        self.tx.send_modify(|snapshot| snapshot.last_error = Some(message));
    }

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(label: &str, confidence: Option<f32>) -> InferenceResponse {
        InferenceResponse {
            label: Some(label.into()),
            confidence,
            ..Default::default()
        }
    }

    #[test]
    fn incomplete_reply_keeps_previous_prediction() {
        let publisher = Publisher::new();
        let generation = publisher.begin_generation();

        assert!(matches!(
            publisher.apply_response(generation, reply("water", Some(0.9)), |_| {}),
            Applied::Published(_)
        ));
        assert_eq!(
            publisher.apply_response(generation, reply("food", None), |_| {}),
            Applied::Incomplete
        );

        let prediction = publisher.snapshot().prediction.unwrap();
        assert_eq!(prediction.label, "water");
    }

    #[test]
    fn late_reply_after_teardown_is_discarded() {
        let publisher = Publisher::new();
        let generation = publisher.begin_generation();
        publisher.set_processing(generation, true);
        publisher.end_generation();

        let mut announced = false;
        assert_eq!(
            publisher.apply_response(generation, reply("pain", Some(0.7)), |_| announced = true),
            Applied::Stale
        );
        assert!(!announced);
        publisher.apply_error(generation, "timed out");

        let snapshot = publisher.snapshot();
        assert!(snapshot.prediction.is_none());
        assert!(snapshot.last_error.is_none());
        assert!(!snapshot.processing);
    }

    #[test]
    fn teardown_waits_for_publish_callback() {
        use std::sync::mpsc;
        use std::sync::Arc;
        use std::thread;

        let publisher = Arc::new(Publisher::new());
        let generation = publisher.begin_generation();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel::<()>();

        let worker = thread::spawn({
            let publisher = Arc::clone(&publisher);
            move || {
                publisher.apply_response(generation, reply("water", Some(0.9)), |result| {
                    entered_tx.send(result.label.clone()).unwrap();
                    resume_rx.recv().unwrap();
                })
            }
        });
        assert_eq!(entered_rx.recv().unwrap(), "water");

        let (ended_tx, ended_rx) = mpsc::channel();
        let teardown = thread::spawn({
            let publisher = Arc::clone(&publisher);
            move || {
                publisher.end_generation();
                ended_tx.send(()).unwrap();
            }
        });
        assert!(ended_rx.recv_timeout(std::time::Duration::from_millis(50)).is_err());

        resume_tx.send(()).unwrap();
        assert!(matches!(worker.join().unwrap(), Applied::Published(_)));
        teardown.join().unwrap();
        ended_rx.recv().unwrap();

        let mut announced = false;
        publisher.apply_response(generation, reply("pain", Some(0.7)), |_| announced = true);
        assert!(!announced);
    }

    #[test]
    fn status_changes_reach_subscribers() {
        let publisher = Publisher::new();
        let mut rx = publisher.subscribe();
        publisher.set_status(CaptureStatus::CameraAcquiring);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, CaptureStatus::CameraAcquiring);

        publisher.set_status(CaptureStatus::CameraAcquiring);
        assert!(!rx.has_changed().unwrap());
    }
}
