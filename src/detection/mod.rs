pub mod bridge;
pub mod camera;
pub mod classifier;
pub mod controller;
pub mod loop_worker;

#[cfg(feature = "desktop")]
pub mod commands;

pub use bridge::{CameraReply, DetectionReply, ModelsReply, WebviewBridge};
pub use camera::{CameraConstraints, CameraLease, CameraSource, CameraStream, FrameHandle};
pub use classifier::{DetectorOptions, ExpressionClassifier, FaceDetection};
pub use controller::DetectionController;
pub use loop_worker::DetectionEvent;
