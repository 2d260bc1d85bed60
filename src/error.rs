use std::time::Duration;

use thiserror::Error;

/// Failures of the telemetry channel. Never fatal: the supervisor turns every
/// one of these into a `Disconnected` state and a scheduled retry.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid telemetry endpoint '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    #[error("connection to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

/// Inbound payload that could not be turned into a typed event.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has no string `type` tag")]
    MissingType,

    #[error("malformed gaze_update: {0}")]
    InvalidTelemetry(String),
}
