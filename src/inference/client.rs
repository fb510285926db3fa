use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MediaError;
use crate::models::InferenceResponse;
use crate::settings::{InferenceSettings, ResponseProtocol};

use super::protocol::parse_response;

/// The remote sign-recognition endpoint.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Submits one JPEG frame and returns the decoded reply.
    async fn predict_frame(&self, jpeg: Vec<u8>) -> Result<InferenceResponse, MediaError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
}

#[derive(Debug, Deserialize)]
struct ActionsReply {
    actions: Vec<String>,
}

/// JSON body of the action-model endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionRequest<'a> {
    frame: String,
    prev_sequence: &'a [Value],
}

/// The keypoint window the action model hands back until it holds a full one.
#[derive(Debug, Default, Deserialize)]
struct SequenceEcho {
    #[serde(default)]
    sequence: Option<Vec<Value>>,
}

pub struct HttpInferenceClient {
    http: reqwest::Client,
    settings: InferenceSettings,
    // Echoed back as `prevSequence` on the next action request.
    sequence: Mutex<Vec<Value>>,
}

impl HttpInferenceClient {
    pub fn new(settings: InferenceSettings) -> Result<Self, MediaError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|err| MediaError::Inference(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            settings,
            sequence: Mutex::new(Vec::new()),
        })
    }

    /// Length of the keypoint window carried between action requests.
    pub fn carried_sequence_len(&self) -> usize {
        self.lock_sequence().len()
    }

    fn lock_sequence(&self) -> MutexGuard<'_, Vec<Value>> {
        self.sequence
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn multipart_request(&self, url: &str, jpeg: Vec<u8>) -> Result<reqwest::RequestBuilder, MediaError> {
        let part = Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .map_err(|err| MediaError::Inference(err.to_string()))?;
        Ok(self.http.post(url).multipart(Form::new().part("frame", part)))
    }

    fn action_request(&self, url: &str, jpeg: &[u8]) -> reqwest::RequestBuilder {
        let sequence = self.lock_sequence();
        let body = ActionRequest {
            frame: STANDARD.encode(jpeg),
            prev_sequence: &sequence,
        };
        self.http.post(url).json(&body)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    /// `GET /api/health` on the action-model service.
    pub async fn health(&self) -> Result<HealthStatus, MediaError> {
        self.get_json("/api/health").await
    }

    /// Labels the action model can produce.
    pub async fn actions(&self) -> Result<Vec<String>, MediaError> {
        let reply: ActionsReply = self.get_json("/api/actions").await?;
        Ok(reply.actions)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, MediaError> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|err| MediaError::Inference(err.to_string()))?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| MediaError::MalformedResponse(err.to_string()))
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn predict_frame(&self, jpeg: Vec<u8>) -> Result<InferenceResponse, MediaError> {
        let size = jpeg.len();
        let url = self.url(&self.settings.predict_path);
        debug!("submitting {size} byte frame to {url}");

        let request = match self.settings.protocol {
            ResponseProtocol::Label => self.multipart_request(&url, jpeg)?,
            ResponseProtocol::Action => self.action_request(&url, &jpeg),
        };
        let response = request
            .send()
            .await
            .map_err(|err| MediaError::Inference(err.to_string()))?;
        let response = check_status(response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| MediaError::Inference(err.to_string()))?;

        let parsed = parse_response(self.settings.protocol, &body)?;
        if self.settings.protocol == ResponseProtocol::Action {
            let echo: SequenceEcho = serde_json::from_slice(&body).unwrap_or_default();
            *self.lock_sequence() = echo.sequence.unwrap_or_default();
        }
        Ok(parsed)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MediaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MediaError::Inference(format!(
        "endpoint returned {status}: {}",
        body.trim()
    )))
}
