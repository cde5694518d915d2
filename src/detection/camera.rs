use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::error::CameraError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    User,
    Environment,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
}

impl CameraConstraints {
    pub fn user_facing(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            facing_mode: FacingMode::User,
        }
    }
}

/// Reference to the frame currently shown by the camera stream. The pixels
/// stay with whoever owns the video buffer; the classifier is handed this.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FrameHandle {
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
}

/// Host media-capture facility.
#[async_trait]
pub trait CameraSource: Send + Sync {
    async fn open(&self, constraints: CameraConstraints)
        -> Result<Box<dyn CameraStream>, CameraError>;
}

/// An open camera stream. Dropping it releases the device.
pub trait CameraStream: Send {
    /// Latest frame, or `None` while the video is not ready yet.
    fn current_frame(&mut self) -> Option<FrameHandle>;
}

/// Hands out at most one open stream at a time.
#[derive(Clone)]
pub struct CameraLease {
    source: Arc<dyn CameraSource>,
    in_use: Arc<AtomicBool>,
}

impl CameraLease {
    pub fn new(source: Arc<dyn CameraSource>) -> Self {
        Self {
            source,
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }

    pub async fn acquire(&self, constraints: CameraConstraints) -> Result<LeasedStream, CameraError> {
        if self
            .in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CameraError::DeviceUnavailable(
                "camera already in use by another session".into(),
            ));
        }

        // Claimed from here on; the claim clears itself if `open` fails or
        // this future is dropped.
        let claim = LeaseClaim {
            in_use: Arc::clone(&self.in_use),
        };

        let stream = self.source.open(constraints).await?;
        log::info!(
            "camera opened at {}x{}",
            constraints.width,
            constraints.height
        );

        Ok(LeasedStream {
            stream,
            _claim: claim,
        })
    }
}

struct LeaseClaim {
    in_use: Arc<AtomicBool>,
}

impl Drop for LeaseClaim {
    fn drop(&mut self) {
        self.in_use.store(false, Ordering::SeqCst);
    }
}

/// Stream obtained through a [`CameraLease`]. The device is released before
/// the lease is returned.
pub struct LeasedStream {
    stream: Box<dyn CameraStream>,
    _claim: LeaseClaim,
}

impl LeasedStream {
    pub fn current_frame(&mut self) -> Option<FrameHandle> {
        self.stream.current_frame()
    }
}
