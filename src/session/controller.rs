use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};

use crate::config::AppConfig;
use crate::content::{ContentItem, ContentProvider, PlaybackTarget};
use crate::detection::{CameraLease, DetectionController, DetectionEvent, ExpressionClassifier};
use crate::error::{ContentResult, DetectionError, DetectionResult, SessionError};
use crate::events::{
    ContentFailedEvent, ContentUpdatedEvent, DetectionStatusEvent, EventSink,
    ExpressionsUpdatedEvent, MoodCommittedEvent, PlaybackChangedEvent, UiEvent,
};
use crate::mood::{CommitSource, Mood};

use super::state::{DetectionStatus, MoodState};

const LIVE_EXPRESSION_LIMIT: usize = 6;

/// Owns the presentation-facing state and reacts to manual selections,
/// detection events and content fetch results.
#[derive(Clone)]
pub struct MoodController {
    state: Arc<Mutex<MoodState>>,
    config: AppConfig,
    content: Arc<dyn ContentProvider>,
    camera: CameraLease,
    classifier: Arc<dyn ExpressionClassifier>,
    events: Arc<dyn EventSink>,
    detection: Arc<Mutex<DetectionController>>,
    /// Held by a start attempt until it has launched or given up.
    startup: Arc<Mutex<()>>,
    dispatcher: Arc<Mutex<Option<JoinHandle<()>>>>,
    fetch_generation: Arc<AtomicU64>,
}

impl MoodController {
    pub fn new(
        config: AppConfig,
        content: Arc<dyn ContentProvider>,
        camera: CameraLease,
        classifier: Arc<dyn ExpressionClassifier>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(MoodState::new())),
            config,
            content,
            camera,
            classifier,
            events,
            detection: Arc::new(Mutex::new(DetectionController::new())),
            startup: Arc::new(Mutex::new(())),
            dispatcher: Arc::new(Mutex::new(None)),
            fetch_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn camera_in_use(&self) -> bool {
        self.camera.is_in_use()
    }

    pub async fn snapshot(&self) -> MoodState {
        self.state.lock().await.clone()
    }

    /// Manual selection. Commits immediately, without going through the
    /// detection stabilizer.
    pub async fn select_mood(&self, mood: Mood) -> MoodState {
        self.commit(mood, CommitSource::Manual).await;
        self.snapshot().await
    }

    /// Fetches content for the current mood again, e.g. after a failure.
    pub async fn refresh_content(&self) -> Result<MoodState> {
        let mood = {
            let mut state = self.state.lock().await;
            let mood = state
                .selected_mood
                .ok_or_else(|| anyhow!("no mood selected"))?;
            state.content_loading = true;
            state.content_error = None;
            mood
        };

        self.spawn_fetch(mood);
        Ok(self.snapshot().await)
    }

    pub async fn content_target(&self, content_id: &str) -> Result<PlaybackTarget> {
        let state = self.state.lock().await;
        let item = state
            .find_content(content_id)
            .cloned()
            .ok_or_else(|| anyhow!("content item {content_id} is not in the current list"))?;
        Ok(PlaybackTarget::for_item(item))
    }

    /// Opens the playback overlay for an item of the current list.
    pub async fn activate_content(&self, content_id: &str) -> Result<PlaybackTarget> {
        let target = self.content_target(content_id).await?;

        let mut state = self.state.lock().await;
        state.now_playing = Some(target.clone());
        self.events
            .emit(UiEvent::PlaybackChanged(PlaybackChangedEvent {
                target: Some(target.clone()),
            }));
        info!("playing {} ({})", target.item.title, target.item.id);
        Ok(target)
    }

    pub async fn close_playback(&self) -> MoodState {
        let mut state = self.state.lock().await;
        if state.now_playing.take().is_some() {
            self.events
                .emit(UiEvent::PlaybackChanged(PlaybackChangedEvent { target: None }));
        }
        state.clone()
    }

    pub async fn is_detecting(&self) -> bool {
        self.detection.lock().await.is_active()
    }

    /// Loads the models, opens the camera and starts the detection loop. On
    /// failure the error is also recorded in the state and emitted.
    ///
    /// The detection lock is not held while waiting on the models or the
    /// camera, so `stop_detection` can cancel a start still waiting on them.
    pub async fn start_detection(&self) -> DetectionResult<MoodState> {
        let _startup = self
            .startup
            .try_lock()
            .map_err(|_| DetectionError::AlreadyActive)?;

        let cancel_token = {
            let mut detection = self.detection.lock().await;
            let cancel_token = detection.begin()?;
            self.set_detection_status(DetectionStatus::Starting, "Loading detection models...")
                .await;
            cancel_token
        };

        let prepare =
            DetectionController::prepare(&self.camera, self.classifier.as_ref(), &self.config);
        let prepared = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => Err(DetectionError::Cancelled),
            prepared = prepare => prepared,
        };

        let mut detection = self.detection.lock().await;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let launched = prepared.and_then(|stream| {
            detection.launch(
                &cancel_token,
                stream,
                Arc::clone(&self.classifier),
                &self.config,
                events_tx,
            )
        });

        match launched {
            Ok(session_id) => {
                let snapshot = {
                    let mut state = self.state.lock().await;
                    state.detection = DetectionStatus::Active;
                    state.session_id = Some(session_id);
                    state.session_error = None;
                    state.clone()
                };

                let dispatcher = tokio::spawn(self.clone().dispatch(events_rx));
                *self.dispatcher.lock().await = Some(dispatcher);
                Ok(snapshot)
            }
            Err(DetectionError::Cancelled) => {
                info!("detection stopped while starting");
                Err(DetectionError::Cancelled)
            }
            Err(err) => {
                detection.abandon(&cancel_token);
                warn!("failed to start detection: {err}");
                let session_error = SessionError::from(&err);

                let mut state = self.state.lock().await;
                state.detection = DetectionStatus::Failed;
                state.detection_message = session_error.message.clone();
                state.session_error = Some(session_error.clone());
                self.events.emit(UiEvent::SessionError(session_error));
                self.events
                    .emit(UiEvent::DetectionStatus(DetectionStatusEvent {
                        status: DetectionStatus::Failed,
                        message: state.detection_message.clone(),
                    }));
                Err(err)
            }
        }
    }

    /// Stops a running or starting activation, waits until every event it
    /// produced has been applied and then clears the detection fields. The
    /// camera is released by the time this returns.
    pub async fn stop_detection(&self) -> Result<MoodState> {
        let handle = self.detection.lock().await.cancel();

        // A start attempt gives up as soon as it sees the cancellation.
        let _startup = self.startup.lock().await;

        if let Some(handle) = handle {
            handle.await.context("detection loop task failed to join")?;
        }
        if let Some(dispatcher) = self.dispatcher.lock().await.take() {
            dispatcher
                .await
                .context("detection event dispatcher failed to join")?;
        }

        let mut state = self.state.lock().await;
        let was_running = state.detection != DetectionStatus::Inactive;
        state.clear_detection();
        if was_running {
            self.events
                .emit(UiEvent::DetectionStatus(DetectionStatusEvent {
                    status: DetectionStatus::Inactive,
                    message: String::new(),
                }));
        }
        Ok(state.clone())
    }

    async fn set_detection_status(&self, status: DetectionStatus, message: &str) {
        let mut state = self.state.lock().await;
        state.detection = status;
        state.detection_message = message.to_string();
        self.events
            .emit(UiEvent::DetectionStatus(DetectionStatusEvent {
                status,
                message: message.to_string(),
            }));
    }

    async fn dispatch(self, mut events_rx: mpsc::UnboundedReceiver<DetectionEvent>) {
        while let Some(event) = events_rx.recv().await {
            self.handle_detection_event(event).await;
        }
        debug!("detection event dispatcher finished");
    }

    async fn handle_detection_event(&self, event: DetectionEvent) {
        match event {
            DetectionEvent::Status(message) => {
                let mut state = self.state.lock().await;
                state.detection_message = message.clone();
                self.events
                    .emit(UiEvent::DetectionStatus(DetectionStatusEvent {
                        status: state.detection,
                        message,
                    }));
            }
            DetectionEvent::Frame {
                face_detected,
                expressions,
                reading,
            } => {
                let expressions = expressions.ranked(LIVE_EXPRESSION_LIMIT);
                let confidence = reading.map(|reading| reading.confidence);

                let mut state = self.state.lock().await;
                state.face_detected = face_detected;
                state.live_expressions = expressions.clone();
                self.events
                    .emit(UiEvent::ExpressionsUpdated(ExpressionsUpdatedEvent {
                        face_detected,
                        expressions,
                        confidence,
                    }));
            }
            DetectionEvent::Committed { mood, confidence } => {
                info!("detected mood {mood} committed at {confidence:.2}");
                self.commit(mood, CommitSource::Detected).await;
            }
            DetectionEvent::TickFailed(err) => {
                debug!("detection tick failed: {err}");
                let mut state = self.state.lock().await;
                state.detection_message = "Detection error - retrying...".to_string();
                self.events
                    .emit(UiEvent::DetectionStatus(DetectionStatusEvent {
                        status: state.detection,
                        message: state.detection_message.clone(),
                    }));
            }
        }
    }

    /// Records the commit and starts a fetch. Re-committing the current mood
    /// records nothing; it only fetches again when the previous fetch failed.
    async fn commit(&self, mood: Mood, source: CommitSource) {
        {
            let mut state = self.state.lock().await;
            if state.selected_mood == Some(mood) {
                if state.content_error.is_none() {
                    debug!("{mood} is already the current mood");
                    return;
                }

                // Same mood after a failed fetch: retry the fetch only.
                state.content_loading = true;
                state.content_error = None;
                drop(state);
                self.spawn_fetch(mood);
                return;
            }

            state.selected_mood = Some(mood);
            state.commit_source = Some(source);
            state.history.record(mood, source, Utc::now());
            state.content_loading = true;
            state.content_error = None;

            self.events
                .emit(UiEvent::MoodCommitted(MoodCommittedEvent {
                    mood,
                    profile: mood.profile(),
                    source,
                }));
        }

        self.spawn_fetch(mood);
    }

    fn spawn_fetch(&self, mood: Mood) {
        let generation = self.fetch_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let controller = self.clone();

        tokio::spawn(async move {
            let query = mood.profile().query;
            let result = controller.content.search(query).await;
            controller.apply_fetch(generation, mood, result).await;
        });
    }

    async fn apply_fetch(&self, generation: u64, mood: Mood, result: ContentResult<Vec<ContentItem>>) {
        let mut state = self.state.lock().await;
        if generation != self.fetch_generation.load(Ordering::SeqCst) {
            debug!("discarding superseded fetch #{generation} for {mood}");
            return;
        }

        state.content_loading = false;
        match result {
            Ok(items) => {
                info!("fetched {} items for {mood}", items.len());
                state.content = items.clone();
                state.content_error = None;
                self.events
                    .emit(UiEvent::ContentUpdated(ContentUpdatedEvent { mood, items }));
            }
            Err(err) => {
                warn!("content fetch for {mood} failed: {err}");
                let error = SessionError::from(&err);
                state.content_error = Some(error.clone());
                self.events
                    .emit(UiEvent::ContentFailed(ContentFailedEvent { mood, error }));
            }
        }
    }
}
