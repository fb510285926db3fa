use log::debug;

use crate::error::MediaError;
use crate::models::AudioCue;

use super::output::CueOutput;

/// Keeps at most one cue audible and honours the mute switch.
pub struct CueController<O: CueOutput + ?Sized> {
    muted: bool,
    current: Option<u64>,
    output: Box<O>,
}

impl<O: CueOutput + ?Sized> CueController<O> {
    pub fn new(output: Box<O>, muted: bool) -> Self {
        Self {
            muted,
            current: None,
            output,
        }
    }

    /// Replaces whatever is playing with `cue`. Returns `false` when muted.
    pub fn play(&mut self, cue: &AudioCue) -> Result<bool, MediaError> {
        if self.muted {
            debug!("cue {} dropped while muted", cue.id());
            return Ok(false);
        }

        self.stop();
        self.output.start(cue)?;
        self.current = Some(cue.id());
        Ok(true)
    }

    pub fn stop(&mut self) {
        if let Some(previous) = self.current.take() {
            debug!("stopping cue {previous}");
        }
        self.output.stop();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if muted {
            self.stop();
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Id of the cue still audible, if any.
    pub fn current(&self) -> Option<u64> {
        self.current.filter(|_| self.output.is_playing())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Start(u64),
        Stop,
    }

    #[derive(Default)]
    struct RecordingOutput {
        events: Arc<Mutex<Vec<Event>>>,
        playing: bool,
    }

    impl CueOutput for RecordingOutput {
        fn start(&mut self, cue: &AudioCue) -> Result<(), MediaError> {
            self.events.lock().unwrap().push(Event::Start(cue.id()));
            self.playing = true;
            Ok(())
        }

        fn stop(&mut self) {
            if self.playing {
                self.events.lock().unwrap().push(Event::Stop);
            }
            self.playing = false;
        }

        fn is_playing(&self) -> bool {
            self.playing
        }
    }

    fn controller(muted: bool) -> (CueController<RecordingOutput>, Arc<Mutex<Vec<Event>>>) {
        let output = RecordingOutput::default();
        let events = output.events.clone();
        (CueController::new(Box::new(output), muted), events)
    }

    #[test]
    fn new_cue_replaces_playing_cue() {
        let (mut cues, events) = controller(false);
        assert!(cues.play(&AudioCue::new(1, vec![1])).unwrap());
        assert!(cues.play(&AudioCue::new(2, vec![2])).unwrap());

        assert_eq!(
            *events.lock().unwrap(),
            vec![Event::Start(1), Event::Stop, Event::Start(2)]
        );
        assert_eq!(cues.current(), Some(2));
    }

    #[test]
    fn muting_stops_current_and_blocks_new_cues() {
        let (mut cues, events) = controller(false);
        cues.play(&AudioCue::new(1, vec![1])).unwrap();
        cues.set_muted(true);
        assert_eq!(cues.current(), None);
        assert!(!cues.play(&AudioCue::new(2, vec![2])).unwrap());

        assert_eq!(*events.lock().unwrap(), vec![Event::Start(1), Event::Stop]);

        cues.set_muted(false);
        assert!(cues.play(&AudioCue::new(3, vec![3])).unwrap());
        assert_eq!(cues.current(), Some(3));
    }
}
