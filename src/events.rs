//! Events pushed from the core to the presentation layer.

use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::content::{ContentItem, PlaybackTarget};
use crate::detection::camera::CameraConstraints;
use crate::detection::classifier::DetectorOptions;
use crate::error::SessionError;
use crate::mood::{CommitSource, ExpressionScore, Mood, MoodProfile};
use crate::session::state::DetectionStatus;

/// Receives every event the core emits. The desktop shell forwards them to
/// the web view; tests record them.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: UiEvent);
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UiEvent {
    MoodCommitted(MoodCommittedEvent),
    ContentUpdated(ContentUpdatedEvent),
    ContentFailed(ContentFailedEvent),
    DetectionStatus(DetectionStatusEvent),
    ExpressionsUpdated(ExpressionsUpdatedEvent),
    SessionError(SessionError),
    PlaybackChanged(PlaybackChangedEvent),
    CameraRequest(CameraRequestEvent),
    CameraRelease(CameraReleaseEvent),
    ModelsLoadRequest(ModelsLoadRequestEvent),
    DetectionRequest(DetectionRequestEvent),
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UiEvent::MoodCommitted(_) => "mood-committed",
            UiEvent::ContentUpdated(_) => "content-updated",
            UiEvent::ContentFailed(_) => "content-failed",
            UiEvent::DetectionStatus(_) => "detection-status",
            UiEvent::ExpressionsUpdated(_) => "expressions-updated",
            UiEvent::SessionError(_) => "session-error",
            UiEvent::PlaybackChanged(_) => "playback-changed",
            UiEvent::CameraRequest(_) => "camera-request",
            UiEvent::CameraRelease(_) => "camera-release",
            UiEvent::ModelsLoadRequest(_) => "models-load-request",
            UiEvent::DetectionRequest(_) => "detection-request",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodCommittedEvent {
    pub mood: Mood,
    pub profile: MoodProfile,
    pub source: CommitSource,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUpdatedEvent {
    pub mood: Mood,
    pub items: Vec<ContentItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFailedEvent {
    pub mood: Mood,
    pub error: SessionError,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStatusEvent {
    pub status: DetectionStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionsUpdatedEvent {
    pub face_detected: bool,
    pub expressions: Vec<ExpressionScore>,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackChangedEvent {
    pub target: Option<PlaybackTarget>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRequestEvent {
    pub request_id: Uuid,
    pub constraints: CameraConstraints,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraReleaseEvent {
    pub frames_served: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsLoadRequestEvent {
    pub request_id: Uuid,
    pub base_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequestEvent {
    pub request_id: Uuid,
    pub sequence: u64,
    pub options: DetectorOptions,
}

#[cfg(feature = "desktop")]
impl EventSink for tauri::AppHandle {
    fn emit(&self, event: UiEvent) {
        use tauri::Emitter;

        if let Err(err) = Emitter::emit(self, event.name(), &event) {
            log::error!("failed to emit {}: {err}", event.name());
        }
    }
}
