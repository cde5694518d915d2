use log::info;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{DetectionError, DetectionResult};
use crate::mood::MoodStabilizer;

use super::camera::{CameraConstraints, CameraLease, LeasedStream};
use super::classifier::ExpressionClassifier;
use super::loop_worker::{detection_loop, DetectionEvent, DetectionSession};

/// Owns the detection loop of the current activation, if any.
///
/// Starting happens in three steps so that no lock has to be held while the
/// web view answers: [`begin`](Self::begin) claims the activation and hands
/// out its cancel token, [`prepare`](Self::prepare) loads the models and
/// opens the camera, and [`launch`](Self::launch) spawns the loop unless the
/// activation was cancelled meanwhile.
pub struct DetectionController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    session_id: Option<String>,
}

impl DetectionController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            session_id: None,
        }
    }

    /// True once the loop is running.
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// True from `begin` until `cancel` or a failed start.
    pub fn is_claimed(&self) -> bool {
        self.cancel_token.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn begin(&mut self) -> DetectionResult<CancellationToken> {
        if self.cancel_token.is_some() {
            return Err(DetectionError::AlreadyActive);
        }

        let cancel_token = CancellationToken::new();
        self.cancel_token = Some(cancel_token.clone());
        Ok(cancel_token)
    }

    /// Loads the models and opens the camera. Dropping the returned future
    /// part way releases whatever it had claimed.
    pub async fn prepare(
        camera: &CameraLease,
        classifier: &dyn ExpressionClassifier,
        config: &AppConfig,
    ) -> DetectionResult<LeasedStream> {
        let detection = &config.detection;
        classifier.load_models(&detection.model_base_path).await?;

        let constraints =
            CameraConstraints::user_facing(detection.camera_width, detection.camera_height);
        Ok(camera.acquire(constraints).await?)
    }

    /// Spawns the loop for an activation claimed with `begin`. Fails with
    /// `Cancelled`, dropping the stream, if the activation was cancelled.
    pub fn launch(
        &mut self,
        cancel_token: &CancellationToken,
        stream: LeasedStream,
        classifier: Arc<dyn ExpressionClassifier>,
        config: &AppConfig,
        events: UnboundedSender<DetectionEvent>,
    ) -> DetectionResult<String> {
        if cancel_token.is_cancelled() || self.cancel_token.is_none() {
            return Err(DetectionError::Cancelled);
        }
        if self.handle.is_some() {
            return Err(DetectionError::AlreadyActive);
        }

        let session_id = Uuid::new_v4().to_string();
        let session = DetectionSession {
            session_id: session_id.clone(),
            stream,
            classifier,
            stabilizer: MoodStabilizer::new(config.stabilizer),
            config: config.detection.clone(),
        };

        let handle = tokio::spawn(detection_loop(session, events, cancel_token.clone()));

        info!("detection session {session_id} started");
        self.handle = Some(handle);
        self.session_id = Some(session_id.clone());
        Ok(session_id)
    }

    /// Releases the claim of an activation that failed to start. A cancelled
    /// activation has already been released by `cancel`.
    pub fn abandon(&mut self, cancel_token: &CancellationToken) {
        if !cancel_token.is_cancelled() && self.handle.is_none() {
            self.cancel_token = None;
        }
    }

    /// Cancels a starting or running activation. Returns the loop task, which
    /// the caller joins to be sure the camera is released.
    pub fn cancel(&mut self) -> Option<JoinHandle<()>> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(session_id) = self.session_id.take() {
            info!("detection session {session_id} stopping");
        }
        self.handle.take()
    }
}

impl Default for DetectionController {
    fn default() -> Self {
        Self::new()
    }
}
