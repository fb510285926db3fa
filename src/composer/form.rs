use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::error::ValidationError;
use crate::models::{ClipKey, ClipLibrary, ClipSequence, Selection, ValidSelection};
use crate::playback::{PlaybackHandle, Sequencer};

/// Clip sequence and confirmation sentence built from one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub sequence: ClipSequence,
    pub summary: String,
}

/// Ordered clip keys for a validated selection.
///
/// The order is fixed by the clip library: count, pill, `medicine`, meal
/// timing, `meal`, then the times of day in canonical order.
pub fn clip_keys(selection: &ValidSelection) -> Vec<ClipKey> {
    let mut keys = vec![
        ClipKey::Count(selection.pill_count),
        ClipKey::Pill(selection.pill_type),
        ClipKey::Medicine,
        ClipKey::MealTiming(selection.meal_timing),
        ClipKey::Meal,
    ];
    keys.extend(selection.times.iter().copied().map(ClipKey::Time));
    keys
}

/// Sentence shown next to the playback, e.g.
/// `Take two half pill, before meal in morning, night.`
pub fn summary(selection: &ValidSelection) -> String {
    let times: Vec<&str> = selection.times.iter().map(|time| time.as_str()).collect();
    format!(
        "Take {} {} pill, {} meal in {}.",
        selection.pill_count.as_str(),
        selection.pill_type.as_str(),
        selection.meal_timing.as_str().replace('_', " "),
        times.join(", ")
    )
}

pub fn compose(selection: &Selection, library: &ClipLibrary) -> Result<Composition, ValidationError> {
    let valid = selection.validate()?;
    let sequence = clip_keys(&valid)
        .into_iter()
        .map(|key| library.resolve(key))
        .collect::<Vec<_>>();

    Ok(Composition {
        sequence: ClipSequence::new(sequence),
        summary: summary(&valid),
    })
}

/// Turns form submissions into sequencer sessions.
pub struct FormComposer {
    library: ClipLibrary,
    sequencer: Arc<Sequencer>,
    last_summary: Mutex<Option<String>>,
}

impl FormComposer {
    pub fn new(library: ClipLibrary, sequencer: Arc<Sequencer>) -> Self {
        Self {
            library,
            sequencer,
            last_summary: Mutex::new(None),
        }
    }

    /// Validates `selection` and starts playing its clips.
    ///
    /// A rejected selection leaves the sequencer untouched.
    pub fn submit(
        &self,
        selection: &Selection,
    ) -> Result<(Composition, PlaybackHandle), ValidationError> {
        let composition = compose(selection, &self.library).map_err(|err| {
            warn!("selection rejected: {err}");
            err
        })?;

        info!("{}", composition.summary);
        *self
            .last_summary
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(composition.summary.clone());

        let handle = self.sequencer.play(composition.sequence.clone());
        Ok((composition, handle))
    }

    pub fn replay(&self) -> PlaybackHandle {
        self.sequencer.replay()
    }

    pub fn last_summary(&self) -> Option<String> {
        self.last_summary
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
