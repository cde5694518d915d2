//! Camera and classifier backed by the web view.
//!
//! `getUserMedia` and the pretrained expression model both live in the web
//! view. The bridge turns each camera/model/inference call into a request
//! event carrying a fresh request id, then waits for the web view to answer
//! through one of the `resolve_*` methods.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::detection::camera::{CameraConstraints, CameraSource, CameraStream, FrameHandle};
use crate::detection::classifier::{DetectorOptions, ExpressionClassifier, FaceDetection};
use crate::error::{CameraError, DetectionError, DetectionResult};
use crate::events::{
    CameraReleaseEvent, CameraRequestEvent, DetectionRequestEvent, EventSink,
    ModelsLoadRequestEvent, UiEvent,
};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CameraReply {
    Granted,
    /// `name` is the browser's `DOMException` name, e.g. `NotAllowedError`.
    Failed {
        name: String,
        #[serde(default)]
        message: String,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ModelsReply {
    Loaded,
    Failed {
        #[serde(default)]
        message: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReply {
    #[serde(default)]
    pub detection: Option<FaceDetection>,
    #[serde(default)]
    pub error: Option<String>,
}

type Waiters<T> = Arc<Mutex<HashMap<Uuid, oneshot::Sender<T>>>>;

fn lock_waiters<T>(waiters: &Waiters<T>) -> std::sync::MutexGuard<'_, HashMap<Uuid, oneshot::Sender<T>>> {
    match waiters.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Outstanding requests of one kind, keyed by request id.
struct PendingRequests<T> {
    waiters: Waiters<T>,
}

impl<T> Clone for PendingRequests<T> {
    fn clone(&self) -> Self {
        Self {
            waiters: Arc::clone(&self.waiters),
        }
    }
}

impl<T> PendingRequests<T> {
    fn new() -> Self {
        Self {
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn register(&self) -> PendingReply<T> {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        lock_waiters(&self.waiters).insert(id, tx);
        PendingReply {
            id,
            rx,
            waiters: Arc::clone(&self.waiters),
        }
    }

    fn resolve(&self, id: Uuid, value: T) -> bool {
        match lock_waiters(&self.waiters).remove(&id) {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    fn len(&self) -> usize {
        lock_waiters(&self.waiters).len()
    }

    fn clear(&self) {
        lock_waiters(&self.waiters).clear();
    }
}

/// Receiving half of a request. Dropping it (e.g. on timeout) forgets the
/// request so a late reply is discarded.
struct PendingReply<T> {
    id: Uuid,
    rx: oneshot::Receiver<T>,
    waiters: Waiters<T>,
}

impl<T> PendingReply<T> {
    async fn wait(mut self) -> DetectionResult<T> {
        (&mut self.rx)
            .await
            .map_err(|_| DetectionError::BridgeClosed)
    }
}

impl<T> Drop for PendingReply<T> {
    fn drop(&mut self) {
        lock_waiters(&self.waiters).remove(&self.id);
    }
}

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct WebviewBridge {
    events: Arc<dyn EventSink>,
    request_timeout: Duration,
    cameras: PendingRequests<CameraReply>,
    models: PendingRequests<ModelsReply>,
    detections: PendingRequests<DetectionReply>,
}

impl WebviewBridge {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            events,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cameras: PendingRequests::new(),
            models: PendingRequests::new(),
            detections: PendingRequests::new(),
        }
    }

    /// Bounds how long camera and model requests wait for an answer.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn resolve_camera(&self, request_id: Uuid, reply: CameraReply) -> bool {
        self.log_unmatched("camera", request_id, self.cameras.resolve(request_id, reply))
    }

    pub fn resolve_models(&self, request_id: Uuid, reply: ModelsReply) -> bool {
        self.log_unmatched("models", request_id, self.models.resolve(request_id, reply))
    }

    pub fn resolve_detection(&self, request_id: Uuid, reply: DetectionReply) -> bool {
        self.log_unmatched(
            "detection",
            request_id,
            self.detections.resolve(request_id, reply),
        )
    }

    pub fn pending_count(&self) -> usize {
        self.cameras.len() + self.models.len() + self.detections.len()
    }

    /// Fails every outstanding request with `BridgeClosed`, e.g. when the
    /// web view reloads.
    pub fn close(&self) {
        self.cameras.clear();
        self.models.clear();
        self.detections.clear();
    }

    fn log_unmatched(&self, kind: &str, request_id: Uuid, matched: bool) -> bool {
        if !matched {
            log::debug!("dropping late or unknown {kind} reply {request_id}");
        }
        matched
    }
}

#[async_trait]
impl CameraSource for WebviewBridge {
    async fn open(
        &self,
        constraints: CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        let pending = self.cameras.register();
        self.events.emit(UiEvent::CameraRequest(CameraRequestEvent {
            request_id: pending.id,
            constraints,
        }));

        match tokio::time::timeout(self.request_timeout, pending.wait()).await {
            Ok(Ok(CameraReply::Granted)) => Ok(Box::new(WebviewStream {
                events: Arc::clone(&self.events),
                constraints,
                sequence: 0,
            })),
            Ok(Ok(CameraReply::Failed { name, message })) => {
                Err(CameraError::from_dom_exception(&name, &message))
            }
            Ok(Err(_)) => Err(CameraError::DeviceUnavailable(
                "web view closed before answering the camera request".into(),
            )),
            Err(_) => Err(CameraError::DeviceUnavailable(format!(
                "no answer to the camera request within {}s",
                self.request_timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl ExpressionClassifier for WebviewBridge {
    async fn load_models(&self, base_path: &Path) -> DetectionResult<()> {
        let pending = self.models.register();
        self.events.emit(UiEvent::ModelsLoadRequest(ModelsLoadRequestEvent {
            request_id: pending.id,
            base_path: base_path.to_path_buf(),
        }));

        let reply = tokio::time::timeout(self.request_timeout, pending.wait())
            .await
            .map_err(|_| {
                DetectionError::ModelLoad(format!(
                    "models not loaded within {}s",
                    self.request_timeout.as_secs()
                ))
            })??;

        match reply {
            ModelsReply::Loaded => Ok(()),
            ModelsReply::Failed { message } => Err(DetectionError::ModelLoad(message)),
        }
    }

    async fn detect(
        &self,
        frame: &FrameHandle,
        options: &DetectorOptions,
    ) -> DetectionResult<Option<FaceDetection>> {
        let pending = self.detections.register();
        self.events.emit(UiEvent::DetectionRequest(DetectionRequestEvent {
            request_id: pending.id,
            sequence: frame.sequence,
            options: *options,
        }));

        let reply = pending.wait().await?;
        match reply.error {
            Some(message) => Err(DetectionError::Inference(message)),
            None => Ok(reply.detection),
        }
    }
}

/// The web view's `<video>` element. Frames are numbered as they are handed
/// to the classifier.
struct WebviewStream {
    events: Arc<dyn EventSink>,
    constraints: CameraConstraints,
    sequence: u64,
}

impl CameraStream for WebviewStream {
    fn current_frame(&mut self) -> Option<FrameHandle> {
        self.sequence += 1;
        Some(FrameHandle {
            sequence: self.sequence,
            captured_at: Utc::now(),
            width: self.constraints.width,
            height: self.constraints.height,
        })
    }
}

impl Drop for WebviewStream {
    fn drop(&mut self) {
        self.events.emit(UiEvent::CameraRelease(CameraReleaseEvent {
            frames_served: self.sequence,
        }));
    }
}
