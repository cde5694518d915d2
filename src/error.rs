//! Error types for the mood pipeline and its external collaborators.

use serde::Serialize;
use thiserror::Error;

pub type MoodResult<T> = Result<T, MoodError>;

/// Errors raised by the pure mood functions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MoodError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MoodError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Camera acquisition failures. Permission denial is kept distinct from a
/// missing or busy device so the UI can offer the right recovery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
}

impl CameraError {
    /// Maps a browser `DOMException` name from `getUserMedia` onto the taxonomy.
    pub fn from_dom_exception(name: &str, message: &str) -> Self {
        match name {
            "NotAllowedError" | "SecurityError" | "PermissionDeniedError" => {
                CameraError::PermissionDenied
            }
            _ if message.is_empty() => CameraError::DeviceUnavailable(name.to_string()),
            _ => CameraError::DeviceUnavailable(format!("{name}: {message}")),
        }
    }
}

pub type DetectionResult<T> = Result<T, DetectionError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectionError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("Failed to load classifier models: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Web view bridge closed before replying")]
    BridgeClosed,

    #[error("Detection already active")]
    AlreadyActive,

    #[error("Detection was stopped before it started")]
    Cancelled,
}

impl DetectionError {
    /// Model load failures need a full reload; everything else can be retried
    /// by toggling detection again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DetectionError::ModelLoad(_))
    }
}

pub type ContentResult<T> = Result<T, ContentError>;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by content provider: {0}")]
    RateLimited(String),

    #[error("Malformed content payload: {0}")]
    MalformedPayload(String),

    #[error("No content API key configured")]
    MissingCredential,
}

impl ContentError {
    /// Whether a manual re-trigger has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ContentError::Network(_) | ContentError::RateLimited(_))
    }
}

impl From<reqwest::Error> for ContentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ContentError::MalformedPayload(err.to_string())
        } else {
            ContentError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(err: serde_json::Error) -> Self {
        ContentError::MalformedPayload(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionErrorKind {
    PermissionDenied,
    DeviceUnavailable,
    ModelLoad,
    Detection,
    Network,
    RateLimited,
    MalformedPayload,
    MissingCredential,
}

/// Error surfaced to the presentation layer as plain state.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&DetectionError> for SessionError {
    fn from(err: &DetectionError) -> Self {
        let kind = match err {
            DetectionError::Camera(CameraError::PermissionDenied) => {
                SessionErrorKind::PermissionDenied
            }
            DetectionError::Camera(CameraError::DeviceUnavailable(_)) => {
                SessionErrorKind::DeviceUnavailable
            }
            DetectionError::ModelLoad(_) => SessionErrorKind::ModelLoad,
            DetectionError::Inference(_)
            | DetectionError::BridgeClosed
            | DetectionError::AlreadyActive
            | DetectionError::Cancelled => SessionErrorKind::Detection,
        };

        Self {
            kind,
            message: err.to_string(),
            retryable: !err.is_fatal(),
        }
    }
}

impl From<&ContentError> for SessionError {
    fn from(err: &ContentError) -> Self {
        let kind = match err {
            ContentError::Network(_) => SessionErrorKind::Network,
            ContentError::RateLimited(_) => SessionErrorKind::RateLimited,
            ContentError::MalformedPayload(_) => SessionErrorKind::MalformedPayload,
            ContentError::MissingCredential => SessionErrorKind::MissingCredential,
        };

        Self {
            kind,
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}
