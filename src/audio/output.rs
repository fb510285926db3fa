use log::info;

use crate::error::MediaError;
use crate::models::AudioCue;

/// Device that renders decoded audio cues. Lives on the audio thread.
pub trait CueOutput {
    /// Decodes and starts `cue`.
    fn start(&mut self, cue: &AudioCue) -> Result<(), MediaError>;

    /// Stops the current cue and releases its decoded resources.
    fn stop(&mut self);

    fn is_playing(&self) -> bool;
}

/// Output used when no speaker is available; cues are only logged.
#[derive(Debug, Default)]
pub struct NullCueOutput {
    playing: bool,
}

impl CueOutput for NullCueOutput {
    fn start(&mut self, cue: &AudioCue) -> Result<(), MediaError> {
        info!("audio cue {} ({} bytes) has no output device", cue.id(), cue.bytes().len());
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

#[cfg(feature = "speaker")]
pub use speaker::RodioCueOutput;

#[cfg(feature = "speaker")]
mod speaker {
    use std::io::Cursor;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

    use super::CueOutput;
    use crate::error::MediaError;
    use crate::models::AudioCue;

    /// Plays cues on the default output device.
    pub struct RodioCueOutput {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sink: Option<Sink>,
    }

    impl RodioCueOutput {
        pub fn try_default() -> Result<Self, MediaError> {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| MediaError::Audio(format!("Failed to create audio output stream: {}", e)))?;
            Ok(Self {
                _stream: stream,
                handle,
                sink: None,
            })
        }
    }

    impl CueOutput for RodioCueOutput {
        fn start(&mut self, cue: &AudioCue) -> Result<(), MediaError> {
            let source = Decoder::new(Cursor::new(cue.bytes().to_vec()))
                .map_err(|e| MediaError::Audio(format!("Failed to decode cue {}: {}", cue.id(), e)))?;
            let sink = Sink::try_new(&self.handle)
                .map_err(|e| MediaError::Audio(format!("Failed to create audio sink: {}", e)))?;
            sink.append(source);
            self.sink = Some(sink);
            Ok(())
        }

        fn stop(&mut self) {
            if let Some(sink) = self.sink.take() {
                sink.stop();
            }
        }

        fn is_playing(&self) -> bool {
            self.sink.as_ref().map(|sink| !sink.empty()).unwrap_or(false)
        }
    }
}

/// Speaker output when the `speaker` feature is enabled and a device opens,
/// otherwise [`NullCueOutput`].
pub fn default_output() -> Box<dyn CueOutput> {
    #[cfg(feature = "speaker")]
    {
        match RodioCueOutput::try_default() {
            Ok(output) => return Box::new(output),
            Err(err) => log::warn!("{err}; audio cues will not be audible"),
        }
    }

    Box::new(NullCueOutput::default())
}
