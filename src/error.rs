use std::fmt;

use thiserror::Error;

use crate::models::selection::SelectionField;

/// Errors raised by the playback and capture pipelines.
///
/// Only [`MediaError::Acquisition`] ends a capture session early; every other
/// variant is recoverable and handled inside the owning component.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("camera access error: {0}")]
    Acquisition(String),

    #[error("clip '{key}' failed: {reason}")]
    Clip { key: String, reason: String },

    #[error("inference request failed: {0}")]
    Inference(String),

    #[error("malformed inference response: {0}")]
    MalformedResponse(String),

    #[error("camera stream is no longer live")]
    StreamEnded,

    #[error("frame encoding failed: {0}")]
    Encode(String),

    #[error("cannot {action} while capture is {status}")]
    InvalidTransition {
        action: &'static str,
        status: &'static str,
    },

    #[error("audio cue failed: {0}")]
    Audio(String),
}

impl MediaError {
    pub fn clip(key: impl Into<String>, reason: impl fmt::Display) -> Self {
        MediaError::Clip {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// A selection was submitted with one or more required fields left empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub missing: Vec<SelectionField>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.missing.iter().map(|field| field.label()).collect();
        write!(f, "please select {}", names.join(", "))
    }
}

impl std::error::Error for ValidationError {}
