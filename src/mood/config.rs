use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Tunable thresholds for the mood stabilizer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StabilizerConfig {
    /// Samples at or below this confidence are ignored entirely
    pub min_confidence: f32,

    /// Confidence above which a short streak commits immediately
    pub immediate_confidence: f32,

    /// Streak length required for an immediate commit
    pub immediate_streak: u32,

    /// Streak length required for a gradual commit
    pub gradual_streak: u32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            immediate_confidence: 0.75,
            immediate_streak: 1,
            gradual_streak: 3,
        }
    }
}

impl StabilizerConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("minConfidence", self.min_confidence),
            ("immediateConfidence", self.immediate_confidence),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                bail!("{name} must be within [0, 1], got {value}");
            }
        }

        if self.immediate_confidence < self.min_confidence {
            bail!(
                "immediateConfidence ({}) must not be below minConfidence ({})",
                self.immediate_confidence,
                self.min_confidence
            );
        }

        if self.immediate_streak == 0 || self.gradual_streak == 0 {
            bail!("streak thresholds must be at least 1");
        }

        Ok(())
    }
}
