//! # Error Handling
//!
//! Two families of errors live here:
//!
//! - **HTTP errors** (`AppError`): returned from the REST handlers and turned into JSON
//!   responses through actix's `ResponseError` trait.
//! - **Pipeline errors** (`FrameError`, `InferenceError`): raised while processing the
//!   frame stream. These never reach the WebSocket client; the socket actor logs them,
//!   counts them, and carries on with the next frame.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Errors returned by the HTTP API.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems (500 errors)
/// - **NotFound**: Requested resource doesn't exist (404 errors)
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors
    Internal(String),

    /// Requested resource was not found
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "not_found",
///     "message": "Session 'abc' is not active",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "not_found",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Type alias for Results that use the HTTP error type.
pub type AppResult<T> = Result<T, AppError>;

/// An inbound stream message that could not be turned into a `Frame`.
///
/// The frame is dropped and the session left untouched; the connection stays open.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Payload is not valid JSON or does not have the `{time, data}` shape
    Parse(String),

    /// `data` has the wrong number of landmark points
    LandmarkCount { expected: usize, actual: usize },

    /// Binary WebSocket payloads are not part of the protocol
    UnsupportedPayload,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Parse(msg) => write!(f, "Malformed frame: {}", msg),
            FrameError::LandmarkCount { expected, actual } => write!(
                f,
                "Malformed frame: expected {} landmarks, got {}",
                expected, actual
            ),
            FrameError::UnsupportedPayload => {
                write!(f, "Malformed frame: binary payloads are not supported")
            }
        }
    }
}

impl std::error::Error for FrameError {}

impl From<serde_json::Error> for FrameError {
    fn from(err: serde_json::Error) -> Self {
        FrameError::Parse(err.to_string())
    }
}

/// A failed call to the inference endpoint.
///
/// The decision cycle is abandoned and the session's pacing state is left as if no
/// prediction had happened, so the next eligible frame retries naturally.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// Connection refused, DNS failure, reset, ...
    Transport(String),

    /// The endpoint answered with a non-success status
    Status(u16),

    /// The endpoint did not answer within the configured timeout
    Timeout,

    /// The body could not be unwrapped to a score vector
    MalformedResponse(String),

    /// The score vector does not line up with the label vocabulary
    LabelMismatch { expected: usize, actual: usize },
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceError::Transport(msg) => write!(f, "Inference transport error: {}", msg),
            InferenceError::Status(code) => write!(f, "Inference endpoint returned HTTP {}", code),
            InferenceError::Timeout => write!(f, "Inference endpoint timed out"),
            InferenceError::MalformedResponse(msg) => {
                write!(f, "Malformed inference response: {}", msg)
            }
            InferenceError::LabelMismatch { expected, actual } => write!(
                f,
                "Inference returned {} scores for {} labels",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for InferenceError {}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout
        } else if let Some(status) = err.status() {
            InferenceError::Status(status.as_u16())
        } else if err.is_decode() {
            InferenceError::MalformedResponse(err.to_string())
        } else {
            InferenceError::Transport(err.to_string())
        }
    }
}
