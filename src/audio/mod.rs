pub mod controller;
pub mod output;

pub use controller::CueController;
pub use output::{default_output, CueOutput, NullCueOutput};

use crate::error::MediaError;
use crate::models::AudioCue;

use log::warn;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};

enum CueCommand {
    Play(AudioCue),
    SetMuted(bool),
    Shutdown,
}

type OutputFactory = Box<dyn FnOnce() -> Box<dyn CueOutput> + Send>;

/// Handle to the audio thread playing inference cues.
///
/// Output devices are frequently not `Send`, so the output is built and
/// driven on a dedicated thread; callers only send commands.
pub struct CueEngineHandle {
    tx: Sender<CueCommand>,
    is_muted: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CueEngineHandle {
    /// Starts the audio thread with [`default_output`].
    pub fn new(muted: bool) -> Result<Self, MediaError> {
        Self::with_output(muted, default_output)
    }

    pub fn with_output<F>(muted: bool, make_output: F) -> Result<Self, MediaError>
    where
        F: FnOnce() -> Box<dyn CueOutput> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<CueCommand>();
        let is_muted = Arc::new(AtomicBool::new(muted));
        let make_output: OutputFactory = Box::new(make_output);

        let thread = thread::Builder::new()
            .name("audio-cues".to_string())
            .spawn(move || {
                let mut cues = CueController::new(make_output(), muted);

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        CueCommand::Play(cue) => {
                            if let Err(err) = cues.play(&cue) {
                                warn!("{err}");
                            }
                        }
                        CueCommand::SetMuted(muted) => cues.set_muted(muted),
                        CueCommand::Shutdown => {
                            cues.stop();
                            break;
                        }
                    }
                }
            })
            .map_err(|e| MediaError::Audio(format!("Failed to spawn audio thread: {}", e)))?;

        Ok(Self {
            tx,
            is_muted,
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn play(&self, cue: AudioCue) -> Result<(), MediaError> {
        // Checked here as well so muted cues are never queued behind a mute.
        if self.is_muted() {
            return Ok(());
        }
        self.send(CueCommand::Play(cue))
    }

    pub fn set_muted(&self, muted: bool) -> Result<(), MediaError> {
        self.is_muted.store(muted, Ordering::SeqCst);
        self.send(CueCommand::SetMuted(muted))
    }

    /// Flips the mute switch and returns the new state.
    pub fn toggle_muted(&self) -> Result<bool, MediaError> {
        let muted = !self.is_muted();
        self.set_muted(muted)?;
        Ok(muted)
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted.load(Ordering::SeqCst)
    }

    /// Stops the current cue and waits for the audio thread to exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(CueCommand::Shutdown);
        let thread = self
            .thread
            .lock()
            .map(|mut guard| guard.take())
            .unwrap_or(None);
        if let Some(thread) = thread {
            if thread.join().is_err() {
                warn!("audio thread panicked");
            }
        }
    }

    fn send(&self, cmd: CueCommand) -> Result<(), MediaError> {
        self.tx
            .send(cmd)
            .map_err(|_| MediaError::Audio("audio thread is not running".into()))
    }
}

impl Drop for CueEngineHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(CueCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SharedOutput(Arc<Mutex<Vec<u64>>>, bool);

    impl CueOutput for SharedOutput {
        fn start(&mut self, cue: &AudioCue) -> Result<(), MediaError> {
            self.0.lock().unwrap().push(cue.id());
            self.1 = true;
            Ok(())
        }

        fn stop(&mut self) {
            self.1 = false;
        }

        fn is_playing(&self) -> bool {
            self.1
        }
    }

    #[test]
    fn muted_engine_never_starts_cues() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let output = SharedOutput(started.clone(), false);
        let engine = CueEngineHandle::with_output(false, move || Box::new(output)).unwrap();

        engine.play(AudioCue::new(1, vec![0])).unwrap();
        assert!(engine.toggle_muted().unwrap());
        engine.play(AudioCue::new(2, vec![0])).unwrap();
        assert!(!engine.toggle_muted().unwrap());
        engine.play(AudioCue::new(3, vec![0])).unwrap();
        engine.shutdown();

        assert_eq!(*started.lock().unwrap(), vec![1, 3]);
    }
}
