use serde::Serialize;

use crate::content::{ContentItem, PlaybackTarget};
use crate::error::SessionError;
use crate::mood::{CommitSource, ExpressionScore, Mood, MoodHistory, MoodProfile};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DetectionStatus {
    Inactive,
    Starting,
    Active,
    Failed,
}

/// Everything the presentation layer renders, as one snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodState {
    pub detection: DetectionStatus,
    pub session_id: Option<String>,
    pub detection_message: String,
    pub face_detected: bool,
    pub live_expressions: Vec<ExpressionScore>,
    pub selected_mood: Option<Mood>,
    pub commit_source: Option<CommitSource>,
    pub history: MoodHistory,
    pub content: Vec<ContentItem>,
    pub content_loading: bool,
    pub content_error: Option<SessionError>,
    pub session_error: Option<SessionError>,
    pub now_playing: Option<PlaybackTarget>,
}

impl MoodState {
    pub fn new() -> Self {
        Self {
            detection: DetectionStatus::Inactive,
            session_id: None,
            detection_message: String::new(),
            face_detected: false,
            live_expressions: Vec::new(),
            selected_mood: None,
            commit_source: None,
            history: MoodHistory::new(),
            content: Vec::new(),
            content_loading: false,
            content_error: None,
            session_error: None,
            now_playing: None,
        }
    }

    pub fn profile(&self) -> Option<MoodProfile> {
        self.selected_mood.map(|mood| mood.profile())
    }

    pub fn find_content(&self, id: &str) -> Option<&ContentItem> {
        self.content.iter().find(|item| item.id == id)
    }

    /// Clears the per-session detection fields after the loop has stopped.
    pub fn clear_detection(&mut self) {
        self.detection = DetectionStatus::Inactive;
        self.session_id = None;
        self.detection_message.clear();
        self.face_detected = false;
        self.live_expressions.clear();
    }
}

impl Default for MoodState {
    fn default() -> Self {
        Self::new()
    }
}
