//! End-to-end flows through `MoodController`.
//!
//! Camera, classifier and content provider are in-process fakes, so these
//! run on a paused clock without a web view or network.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use moodtube_lib::config::AppConfig;
use moodtube_lib::content::{ContentItem, ContentProvider};
use moodtube_lib::detection::{
    CameraConstraints, CameraLease, CameraSource, CameraStream, DetectorOptions,
    ExpressionClassifier, FaceDetection, FrameHandle,
};
use moodtube_lib::error::{
    CameraError, ContentError, ContentResult, DetectionError, DetectionResult, SessionErrorKind,
};
use moodtube_lib::events::{EventSink, UiEvent};
use moodtube_lib::mood::{CommitSource, Mood};
use moodtube_lib::session::{DetectionStatus, MoodController};

struct FakeCamera {
    fail_with: Option<CameraError>,
    /// Never answers, like a permission prompt left open.
    hang: bool,
    opened: AtomicUsize,
    released: Arc<AtomicBool>,
}

struct FakeStream {
    sequence: u64,
    released: Arc<AtomicBool>,
}

impl CameraStream for FakeStream {
    fn current_frame(&mut self) -> Option<FrameHandle> {
        self.sequence += 1;
        Some(FrameHandle {
            sequence: self.sequence,
            captured_at: Utc::now(),
            width: 640,
            height: 480,
        })
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CameraSource for FakeCamera {
    async fn open(&self, _constraints: CameraConstraints) -> Result<Box<dyn CameraStream>, CameraError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.released.store(false, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            sequence: 0,
            released: Arc::clone(&self.released),
        }))
    }
}

/// Answers detections from a queue; an empty queue means no face.
#[derive(Default)]
struct ScriptedClassifier {
    fail_load: bool,
    script: Mutex<VecDeque<FaceDetection>>,
}

impl ScriptedClassifier {
    fn push(&self, pairs: &[(&str, f32)]) {
        self.script.lock().unwrap().push_back(FaceDetection {
            score: 0.95,
            expressions: pairs
                .iter()
                .map(|(label, p)| (label.to_string(), *p))
                .collect(),
        });
    }
}

#[async_trait]
impl ExpressionClassifier for ScriptedClassifier {
    async fn load_models(&self, base_path: &Path) -> DetectionResult<()> {
        if self.fail_load {
            return Err(DetectionError::ModelLoad(format!(
                "no weights under {}",
                base_path.display()
            )));
        }
        Ok(())
    }

    async fn detect(
        &self,
        _frame: &FrameHandle,
        _options: &DetectorOptions,
    ) -> DetectionResult<Option<FaceDetection>> {
        Ok(self.script.lock().unwrap().pop_front())
    }
}

/// Per-query canned results with an optional delay.
#[derive(Default)]
struct FakeProvider {
    responses: Mutex<HashMap<String, VecDeque<ContentResult<Vec<ContentItem>>>>>,
    delays: Mutex<HashMap<String, Duration>>,
    queries: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn respond(&self, query: &str, result: ContentResult<Vec<ContentItem>>) {
        self.responses
            .lock()
            .unwrap()
            .entry(query.to_string())
            .or_default()
            .push_back(result);
    }

    fn delay(&self, query: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(query.to_string(), delay);
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentProvider for FakeProvider {
    async fn search(&self, query: &str) -> ContentResult<Vec<ContentItem>> {
        self.queries.lock().unwrap().push(query.to_string());
        let delay = self.delays.lock().unwrap().get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .responses
            .lock()
            .unwrap()
            .get_mut(query)
            .and_then(|queue| queue.pop_front());
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

struct RecordingSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }
}

struct Harness {
    controller: MoodController,
    camera: Arc<FakeCamera>,
    classifier: Arc<ScriptedClassifier>,
    provider: Arc<FakeProvider>,
    events: mpsc::UnboundedReceiver<UiEvent>,
}

fn harness_with(camera_error: Option<CameraError>, fail_load: bool) -> Harness {
    build_harness(camera_error, false, fail_load)
}

fn build_harness(camera_error: Option<CameraError>, hang: bool, fail_load: bool) -> Harness {
    let camera = Arc::new(FakeCamera {
        fail_with: camera_error,
        hang,
        opened: AtomicUsize::new(0),
        released: Arc::new(AtomicBool::new(false)),
    });
    let classifier = Arc::new(ScriptedClassifier {
        fail_load,
        ..Default::default()
    });
    let provider = Arc::new(FakeProvider::default());
    let (tx, events) = mpsc::unbounded_channel();

    let controller = MoodController::new(
        AppConfig::default(),
        provider.clone(),
        CameraLease::new(camera.clone()),
        classifier.clone(),
        Arc::new(RecordingSink { tx }),
    );

    Harness {
        controller,
        camera,
        classifier,
        provider,
        events,
    }
}

fn harness() -> Harness {
    harness_with(None, false)
}

fn item(id: &str, title: &str) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        title: title.to_string(),
        thumbnail_url: format!("https://i.ytimg.com/vi/{id}/mqdefault.jpg"),
        channel_name: "Test Channel".to_string(),
        published_at: None,
    }
}

async fn next_matching<F>(events: &mut mpsc::UnboundedReceiver<UiEvent>, mut pred: F) -> UiEvent
where
    F: FnMut(&UiEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let event = events.recv().await.expect("event sink closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn content_updated(events: &mut mpsc::UnboundedReceiver<UiEvent>, mood: Mood) -> Vec<ContentItem> {
    match next_matching(events, |e| matches!(e, UiEvent::ContentUpdated(u) if u.mood == mood)).await {
        UiEvent::ContentUpdated(updated) => updated.items,
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_detected_mood_fetches_content() {
    let mut h = harness();
    h.classifier.push(&[("happy", 0.9), ("neutral", 0.05)]);
    h.provider
        .respond("happy songs", Ok(vec![item("a1", "Sunny"), item("a2", "Upbeat")]));

    let state = h.controller.start_detection().await.unwrap();
    assert_eq!(state.detection, DetectionStatus::Active);
    assert!(state.session_id.is_some());
    assert!(h.controller.camera_in_use());

    let committed = next_matching(&mut h.events, |e| matches!(e, UiEvent::MoodCommitted(_))).await;
    match committed {
        UiEvent::MoodCommitted(event) => {
            assert_eq!(event.mood, Mood::Happy);
            assert_eq!(event.source, CommitSource::Detected);
            assert_eq!(event.profile.query, "happy songs");
        }
        _ => unreachable!(),
    }

    let items = content_updated(&mut h.events, Mood::Happy).await;
    assert_eq!(items.len(), 2);

    let state = h.controller.snapshot().await;
    assert_eq!(state.selected_mood, Some(Mood::Happy));
    assert_eq!(state.commit_source, Some(CommitSource::Detected));
    assert_eq!(state.history.len(), 1);
    assert!(!state.content_loading);
    assert_eq!(h.provider.queries(), vec!["happy songs".to_string()]);

    let state = h.controller.stop_detection().await.unwrap();
    assert_eq!(state.detection, DetectionStatus::Inactive);
    assert!(state.session_id.is_none());
    assert!(h.camera.released.load(Ordering::SeqCst));
    assert!(!h.controller.camera_in_use());
    // Content survives stopping detection.
    assert_eq!(state.content.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_manual_selection_commits_immediately() {
    let mut h = harness();
    h.provider.respond("sad songs", Ok(vec![item("s1", "Rainy day")]));

    let state = h.controller.select_mood(Mood::Sad).await;
    assert_eq!(state.selected_mood, Some(Mood::Sad));
    assert_eq!(state.commit_source, Some(CommitSource::Manual));
    assert!(state.content_loading);

    let items = content_updated(&mut h.events, Mood::Sad).await;
    assert_eq!(items[0].id, "s1");
    assert_eq!(h.camera.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reselecting_current_mood_does_not_refetch() {
    let mut h = harness();
    h.provider.respond("happy songs", Ok(vec![item("a1", "Sunny")]));

    h.controller.select_mood(Mood::Happy).await;
    content_updated(&mut h.events, Mood::Happy).await;

    let state = h.controller.select_mood(Mood::Happy).await;
    assert_eq!(state.history.len(), 1);
    assert_eq!(h.provider.queries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_keeps_previous_content() {
    let mut h = harness();
    h.provider.respond("happy songs", Ok(vec![item("a1", "Sunny")]));
    h.provider.respond(
        "sad songs",
        Err(ContentError::RateLimited("quotaExceeded".into())),
    );
    h.provider.respond("sad songs", Ok(vec![item("s1", "Rainy day")]));

    h.controller.select_mood(Mood::Happy).await;
    content_updated(&mut h.events, Mood::Happy).await;

    h.controller.select_mood(Mood::Sad).await;
    let failed = next_matching(&mut h.events, |e| matches!(e, UiEvent::ContentFailed(_))).await;
    match failed {
        UiEvent::ContentFailed(event) => {
            assert_eq!(event.mood, Mood::Sad);
            assert_eq!(event.error.kind, SessionErrorKind::RateLimited);
            assert!(event.error.retryable);
        }
        _ => unreachable!(),
    }

    let state = h.controller.snapshot().await;
    assert_eq!(state.selected_mood, Some(Mood::Sad));
    assert_eq!(state.content.len(), 1);
    assert_eq!(state.content[0].id, "a1");
    assert!(state.content_error.is_some());
    assert!(!state.content_loading);

    // Manual retry.
    let state = h.controller.refresh_content().await.unwrap();
    assert!(state.content_error.is_none());
    let items = content_updated(&mut h.events, Mood::Sad).await;
    assert_eq!(items[0].id, "s1");
}

#[tokio::test(start_paused = true)]
async fn test_retrying_failed_mood_keeps_history() {
    let mut h = harness();
    h.provider.respond("happy songs", Ok(vec![item("a1", "Sunny")]));
    h.provider.respond(
        "sad songs",
        Err(ContentError::Network("connection reset".into())),
    );
    h.provider.respond("sad songs", Ok(vec![item("s1", "Rainy day")]));

    h.controller.select_mood(Mood::Happy).await;
    content_updated(&mut h.events, Mood::Happy).await;
    h.controller.select_mood(Mood::Sad).await;
    next_matching(&mut h.events, |e| matches!(e, UiEvent::ContentFailed(_))).await;

    let state = h.controller.select_mood(Mood::Sad).await;
    assert_eq!(state.history.len(), 2);
    assert!(state.content_loading);
    assert!(state.content_error.is_none());

    let updated = next_matching(&mut h.events, |e| {
        assert!(!matches!(e, UiEvent::MoodCommitted(_)), "retry committed again");
        matches!(e, UiEvent::ContentUpdated(u) if u.mood == Mood::Sad)
    })
    .await;
    assert!(matches!(updated, UiEvent::ContentUpdated(u) if u.items[0].id == "s1"));
    assert_eq!(h.provider.queries().len(), 3);

    let history: Vec<Mood> = h
        .controller
        .snapshot()
        .await
        .history
        .entries()
        .map(|entry| entry.mood)
        .collect();
    assert_eq!(history, vec![Mood::Sad, Mood::Happy]);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_fetch_is_discarded() {
    let mut h = harness();
    h.provider.delay("happy songs", Duration::from_secs(5));
    h.provider.respond("happy songs", Ok(vec![item("a1", "Sunny")]));
    h.provider.respond("sad songs", Ok(vec![item("s1", "Rainy day")]));

    h.controller.select_mood(Mood::Happy).await;
    h.controller.select_mood(Mood::Sad).await;

    content_updated(&mut h.events, Mood::Sad).await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let state = h.controller.snapshot().await;
    assert_eq!(state.selected_mood, Some(Mood::Sad));
    assert_eq!(state.content.len(), 1);
    assert_eq!(state.content[0].id, "s1");
    while let Ok(event) = h.events.try_recv() {
        assert!(!matches!(event, UiEvent::ContentUpdated(ref u) if u.mood == Mood::Happy));
    }
}

#[tokio::test(start_paused = true)]
async fn test_model_load_failure_leaves_detection_inactive() {
    let h = harness_with(None, true);

    let err = h.controller.start_detection().await.unwrap_err();
    assert!(matches!(err, DetectionError::ModelLoad(_)));

    let state = h.controller.snapshot().await;
    assert_eq!(state.detection, DetectionStatus::Failed);
    let session_error = state.session_error.expect("session error recorded");
    assert_eq!(session_error.kind, SessionErrorKind::ModelLoad);
    assert!(!session_error.retryable);
    assert_eq!(h.camera.opened.load(Ordering::SeqCst), 0);
    assert!(!h.controller.is_detecting().await);
}

#[tokio::test(start_paused = true)]
async fn test_camera_permission_denied() {
    let mut h = harness_with(Some(CameraError::PermissionDenied), false);

    let err = h.controller.start_detection().await.unwrap_err();
    assert!(matches!(err, DetectionError::Camera(CameraError::PermissionDenied)));

    let event = next_matching(&mut h.events, |e| matches!(e, UiEvent::SessionError(_))).await;
    match event {
        UiEvent::SessionError(error) => assert_eq!(error.kind, SessionErrorKind::PermissionDenied),
        _ => unreachable!(),
    }
    assert!(!h.controller.camera_in_use());
}

#[tokio::test(start_paused = true)]
async fn test_second_activation_is_refused() {
    let h = harness();

    h.controller.start_detection().await.unwrap();
    let err = h.controller.start_detection().await.unwrap_err();
    assert!(matches!(err, DetectionError::AlreadyActive));
    assert_eq!(h.camera.opened.load(Ordering::SeqCst), 1);

    // The refused attempt does not disturb the running session.
    let state = h.controller.snapshot().await;
    assert_eq!(state.detection, DetectionStatus::Active);
    h.controller.stop_detection().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_camera_prompt_is_open() {
    let mut h = build_harness(None, true, false);

    let starting = {
        let controller = h.controller.clone();
        tokio::spawn(async move { controller.start_detection().await })
    };
    next_matching(&mut h.events, |e| {
        matches!(e, UiEvent::DetectionStatus(s) if s.status == DetectionStatus::Starting)
    })
    .await;
    tokio::task::yield_now().await;
    assert!(h.controller.camera_in_use());

    let state = tokio::time::timeout(Duration::from_secs(3), h.controller.stop_detection())
        .await
        .expect("stop returns while the camera prompt is open")
        .unwrap();
    assert_eq!(state.detection, DetectionStatus::Inactive);
    assert!(!h.controller.camera_in_use());
    assert!(!h.controller.is_detecting().await);

    let result = starting.await.unwrap();
    assert!(matches!(result, Err(DetectionError::Cancelled)));
    assert!(h.controller.snapshot().await.session_error.is_none());

    // The cancelled attempt does not block a later one.
    let retry = {
        let controller = h.controller.clone();
        tokio::spawn(async move { controller.start_detection().await })
    };
    next_matching(&mut h.events, |e| {
        matches!(e, UiEvent::DetectionStatus(s) if s.status == DetectionStatus::Starting)
    })
    .await;
    h.controller.stop_detection().await.unwrap();
    assert!(matches!(retry.await.unwrap(), Err(DetectionError::Cancelled)));
    assert!(!h.controller.camera_in_use());
}

#[tokio::test(start_paused = true)]
async fn test_reactivation_starts_from_fresh_stabilizer() {
    let mut h = harness();
    h.classifier.push(&[("happy", 0.9)]);

    h.controller.start_detection().await.unwrap();
    content_updated(&mut h.events, Mood::Happy).await;
    h.controller.stop_detection().await.unwrap();

    h.controller.select_mood(Mood::Sad).await;
    content_updated(&mut h.events, Mood::Sad).await;

    // The previous session already committed Happy; a fresh one commits it again.
    h.classifier.push(&[("happy", 0.9)]);
    h.controller.start_detection().await.unwrap();
    let event = next_matching(&mut h.events, |e| matches!(e, UiEvent::MoodCommitted(_))).await;
    match event {
        UiEvent::MoodCommitted(event) => {
            assert_eq!(event.mood, Mood::Happy);
            assert_eq!(event.source, CommitSource::Detected);
        }
        _ => unreachable!(),
    }
    h.controller.stop_detection().await.unwrap();

    let state = h.controller.snapshot().await;
    let history: Vec<Mood> = state.history.entries().map(|entry| entry.mood).collect();
    assert_eq!(history, vec![Mood::Happy, Mood::Sad, Mood::Happy]);
}

#[tokio::test(start_paused = true)]
async fn test_no_face_is_reported() {
    let mut h = harness();

    h.controller.start_detection().await.unwrap();
    let event = next_matching(&mut h.events, |e| {
        matches!(e, UiEvent::DetectionStatus(s) if s.message.starts_with("No face detected"))
    })
    .await;
    assert!(matches!(event, UiEvent::DetectionStatus(_)));

    let state = h.controller.snapshot().await;
    assert!(!state.face_detected);
    assert!(state.live_expressions.is_empty());
    assert!(state.selected_mood.is_none());
    h.controller.stop_detection().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_playback_overlay() {
    let mut h = harness();
    h.provider
        .respond("lofi chill beats", Ok(vec![item("l1", "Beats to study to")]));

    h.controller.select_mood(Mood::Relaxed).await;
    content_updated(&mut h.events, Mood::Relaxed).await;

    let target = h.controller.activate_content("l1").await.unwrap();
    assert_eq!(target.embed_url, "https://www.youtube.com/embed/l1?autoplay=1");
    assert_eq!(target.watch_url, "https://www.youtube.com/watch?v=l1");
    let event = next_matching(&mut h.events, |e| matches!(e, UiEvent::PlaybackChanged(_))).await;
    assert!(matches!(event, UiEvent::PlaybackChanged(p) if p.target.is_some()));

    assert!(h.controller.activate_content("missing").await.is_err());

    let state = h.controller.close_playback().await;
    assert!(state.now_playing.is_none());
    let event = next_matching(&mut h.events, |e| matches!(e, UiEvent::PlaybackChanged(_))).await;
    assert!(matches!(event, UiEvent::PlaybackChanged(p) if p.target.is_none()));
}
