use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::error::MediaError;
use crate::models::InferenceResponse;
use crate::settings::ResponseProtocol;

#[derive(Debug, Deserialize)]
struct LabelReply {
    label: Option<String>,
    confidence: Option<f64>,
    audio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionReply {
    action: Option<String>,
    confidence: Option<f64>,
    #[serde(default)]
    all_probabilities: BTreeMap<String, f64>,
}

/// Decodes a successful reply body.
///
/// Missing fields are not an error here; invalid JSON, a confidence outside
/// `0.0..=1.0` or undecodable audio are.
pub fn parse_response(
    protocol: ResponseProtocol,
    body: &[u8],
) -> Result<InferenceResponse, MediaError> {
    match protocol {
        ResponseProtocol::Label => {
            let reply: LabelReply = serde_json::from_slice(body)
                .map_err(|err| MediaError::MalformedResponse(err.to_string()))?;
            Ok(InferenceResponse {
                label: reply.label,
                confidence: reply.confidence.map(checked_confidence).transpose()?,
                audio: reply.audio.as_deref().map(decode_audio).transpose()?.flatten(),
                probabilities: BTreeMap::new(),
            })
        }
        ResponseProtocol::Action => {
            let reply: ActionReply = serde_json::from_slice(body)
                .map_err(|err| MediaError::MalformedResponse(err.to_string()))?;
            let probabilities = reply
                .all_probabilities
                .into_iter()
                .map(|(label, p)| checked_confidence(p).map(|p| (label, p)))
                .collect::<Result<BTreeMap<_, _>, MediaError>>()?;
            Ok(InferenceResponse {
                label: reply.action,
                confidence: reply.confidence.map(checked_confidence).transpose()?,
                audio: None,
                probabilities,
            })
        }
    }
}

fn checked_confidence(value: f64) -> Result<f32, MediaError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value as f32)
    } else {
        Err(MediaError::MalformedResponse(format!(
            "confidence {value} outside 0..=1"
        )))
    }
}

fn decode_audio(encoded: &str) -> Result<Option<Vec<u8>>, MediaError> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Ok(None);
    }
    STANDARD
        .decode(encoded)
        .map(Some)
        .map_err(|err| MediaError::MalformedResponse(format!("audio is not base64: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_reply_with_audio() {
        let body = br#"{"label": "fever", "confidence": 0.91, "audio": "SUQz"}"#;
        let response = parse_response(ResponseProtocol::Label, body).unwrap();
        assert_eq!(response.label.as_deref(), Some("fever"));
        assert!((response.confidence.unwrap() - 0.91).abs() < 1e-6);
        assert_eq!(response.audio.as_deref(), Some(&b"ID3"[..]));
    }

    #[test]
    fn label_reply_missing_confidence_keeps_label() {
        let body = br#"{"label": "cold"}"#;
        let response = parse_response(ResponseProtocol::Label, body).unwrap();
        assert_eq!(response.label.as_deref(), Some("cold"));
        assert_eq!(response.confidence, None);
        assert!(response.into_result(1).is_none());
    }

    #[test]
    fn action_reply_with_null_action() {
        let body = br#"{"action": null, "confidence": 0.4,
            "all_probabilities": {"asthma": 0.4, "cold": 0.6}}"#;
        let response = parse_response(ResponseProtocol::Action, body).unwrap();
        assert_eq!(response.label, None);
        assert_eq!(response.probabilities.len(), 2);
        assert!((response.probabilities["cold"] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        for body in [
            &b"not json"[..],
            &br#"{"label": "fever", "confidence": 1.7}"#[..],
            &br#"{"label": "fever", "confidence": 0.5, "audio": "%%%"}"#[..],
        ] {
            let err = parse_response(ResponseProtocol::Label, body).unwrap_err();
            assert!(matches!(err, MediaError::MalformedResponse(_)), "{err}");
        }
    }
}
