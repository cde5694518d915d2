use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::config::DetectionConfig;
use crate::detection::camera::FrameHandle;
use crate::error::DetectionResult;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectorOptions {
    pub input_size: u32,
    pub score_threshold: f32,
}

impl From<&DetectionConfig> for DetectorOptions {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            input_size: config.input_size,
            score_threshold: config.score_threshold,
        }
    }
}

/// One detected face with the classifier's raw expression probabilities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaceDetection {
    #[serde(default)]
    pub score: f32,
    pub expressions: HashMap<String, f32>,
}

/// Pretrained face + expression model.
#[async_trait]
pub trait ExpressionClassifier: Send + Sync {
    /// Loads model weights once per detection session.
    async fn load_models(&self, base_path: &Path) -> DetectionResult<()>;

    /// Classifies the given frame. `Ok(None)` means no face was found.
    async fn detect(
        &self,
        frame: &FrameHandle,
        options: &DetectorOptions,
    ) -> DetectionResult<Option<FaceDetection>>;
}
