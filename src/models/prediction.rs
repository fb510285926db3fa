use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Encoded audio returned alongside a prediction (mp3 from the reference
/// service).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCue {
    id: u64,
    bytes: Arc<Vec<u8>>,
}

impl AudioCue {
    pub fn new(id: u64, bytes: Vec<u8>) -> Self {
        Self {
            id,
            bytes: Arc::new(bytes),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Latest label published by the capture loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub label: String,
    pub confidence: f32,
    #[serde(skip)]
    pub audio: Option<AudioCue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub probabilities: BTreeMap<String, f32>,
    pub received_at: DateTime<Utc>,
}

impl PredictionResult {
    /// Confidence as shown to the user, e.g. `87.5%`.
    pub fn confidence_display(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}

/// Decoded inference response. Either field may be absent; only a response
/// carrying both becomes a [`PredictionResult`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceResponse {
    pub label: Option<String>,
    pub confidence: Option<f32>,
    pub audio: Option<Vec<u8>>,
    pub probabilities: BTreeMap<String, f32>,
}

impl InferenceResponse {
    pub fn into_result(self, cue_id: u64) -> Option<PredictionResult> {
        let (Some(label), Some(confidence)) = (self.label, self.confidence) else {
            return None;
        };

        Some(PredictionResult {
            label,
            confidence,
            audio: self.audio.map(|bytes| AudioCue::new(cue_id, bytes)),
            probabilities: self.probabilities,
            received_at: Utc::now(),
        })
    }
}
