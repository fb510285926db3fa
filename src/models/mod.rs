pub mod clip;
pub mod prediction;
pub mod selection;

pub use clip::{ClipKey, ClipLibrary, ClipReference, ClipSequence};
pub use prediction::{AudioCue, InferenceResponse, PredictionResult};
pub use selection::{MealTiming, PillCount, PillType, Selection, SelectionField, TimeOfDay, ValidSelection};
