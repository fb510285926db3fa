pub mod client;
pub mod protocol;

pub use client::{HealthStatus, HttpInferenceClient, InferenceClient};
pub use protocol::parse_response;
