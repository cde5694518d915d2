use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::mood::StabilizerConfig;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";

/// Everything a mood session needs, passed in at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub content: ContentConfig,
    pub detection: DetectionConfig,
    pub stabilizer: StabilizerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentConfig {
    pub endpoint: String,
    /// Search API credential; empty means content fetches fail fast.
    pub api_key: String,
    pub max_results: u32,
    pub timeout_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            api_key: String::new(),
            max_results: 12,
            timeout_secs: 10,
        }
    }
}

impl ContentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionConfig {
    pub tick_interval_ms: u64,
    pub inference_timeout_ms: u64,
    /// How long to wait for the web view to answer a camera or model request,
    /// including the time a permission prompt stays open.
    pub request_timeout_ms: u64,
    /// Where the web view loads classifier weights from.
    pub model_base_path: PathBuf,
    pub input_size: u32,
    pub score_threshold: f32,
    pub camera_width: u32,
    pub camera_height: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            inference_timeout_ms: 2_000,
            request_timeout_ms: 30_000,
            model_base_path: PathBuf::from("/models"),
            input_size: 416,
            score_threshold: 0.5,
            camera_width: 640,
            camera_height: 480,
        }
    }
}

impl DetectionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl AppConfig {
    /// Applies `YOUTUBE_API_KEY` and `MOODTUBE_TICK_MS` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("YOUTUBE_API_KEY") {
            if !key.trim().is_empty() {
                self.content.api_key = key.trim().to_string();
            }
        }

        if let Some(tick_ms) = std::env::var("MOODTUBE_TICK_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
        {
            self.detection.tick_interval_ms = tick_ms;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.stabilizer.validate()?;

        if self.detection.tick_interval_ms == 0 {
            bail!("tickIntervalMs must be greater than zero");
        }
        if self.detection.inference_timeout_ms == 0 {
            bail!("inferenceTimeoutMs must be greater than zero");
        }
        if self.detection.request_timeout_ms == 0 {
            bail!("requestTimeoutMs must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.detection.score_threshold) {
            bail!("scoreThreshold must be within [0, 1]");
        }
        if self.content.max_results == 0 || self.content.max_results > 50 {
            bail!("maxResults must be between 1 and 50");
        }
        if self.content.endpoint.trim().is_empty() {
            bail!("content endpoint must not be empty");
        }

        Ok(())
    }
}

/// True when `MOODTUBE_DEBUG` asks for verbose logging.
pub fn debug_mode() -> bool {
    std::env::var("MOODTUBE_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.content.max_results, 12);
        assert_eq!(config.detection.tick_interval(), Duration::from_millis(500));
        assert_eq!(config.detection.camera_width, 640);
        assert_eq!(config.detection.camera_height, 480);
        assert_eq!(config.detection.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{"content": {"apiKey": "abc"}, "stabilizer": {"minConfidence": 0.4}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.content.api_key, "abc");
        assert_eq!(config.content.max_results, 12);
        assert_eq!(config.stabilizer.min_confidence, 0.4);
        assert_eq!(config.stabilizer.gradual_streak, 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.content.max_results = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.detection.tick_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.stabilizer.immediate_confidence = 1.5;
        assert!(config.validate().is_err());
    }
}
