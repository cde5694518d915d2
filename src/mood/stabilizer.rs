use serde::Serialize;

use crate::mood::config::StabilizerConfig;
use crate::mood::types::{Mood, MoodSample};

/// Observable phase of the stabilizer.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "phase")]
pub enum StabilizerPhase {
    NoCandidate,
    Accumulating { candidate: Mood, streak: u32 },
    Committed { mood: Mood },
}

/// Debounces per-frame mood samples into committed moods.
///
/// A mood is committed when a streak of agreeing samples either contains a
/// high-confidence sample (immediate path) or grows long enough (gradual
/// path). Low-confidence samples neither extend nor break a streak, and a
/// mood that is already committed is never emitted again.
#[derive(Debug, Clone)]
pub struct MoodStabilizer {
    config: StabilizerConfig,
    last_committed: Option<Mood>,
    candidate: Option<Mood>,
    streak: u32,
}

impl MoodStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            last_committed: None,
            candidate: None,
            streak: 0,
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    pub fn last_committed(&self) -> Option<Mood> {
        self.last_committed
    }

    pub fn candidate(&self) -> Option<Mood> {
        self.candidate
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn phase(&self) -> StabilizerPhase {
        match (self.candidate, self.last_committed) {
            (Some(candidate), committed)
                if self.streak > 0 && committed != Some(candidate) =>
            {
                StabilizerPhase::Accumulating {
                    candidate,
                    streak: self.streak,
                }
            }
            (_, Some(mood)) => StabilizerPhase::Committed { mood },
            _ => StabilizerPhase::NoCandidate,
        }
    }

    /// Feeds one sample; returns the mood if this sample commits a new one.
    pub fn update(&mut self, sample: MoodSample) -> Option<Mood> {
        if !sample.confidence.is_finite() {
            log::warn!(
                "ignoring malformed mood sample ({} with confidence {})",
                sample.mood,
                sample.confidence
            );
            return None;
        }

        if sample.confidence <= self.config.min_confidence {
            log::debug!(
                "ignoring low-confidence sample {} ({:.2})",
                sample.mood,
                sample.confidence
            );
            return None;
        }

        if self.candidate == Some(sample.mood) {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.candidate = Some(sample.mood);
            self.streak = 1;
        }

        let immediate = self.streak >= self.config.immediate_streak
            && sample.confidence > self.config.immediate_confidence;
        let gradual = self.streak >= self.config.gradual_streak;
        if !(immediate || gradual) {
            return None;
        }

        if self.last_committed == Some(sample.mood) {
            return None;
        }

        self.last_committed = Some(sample.mood);
        self.streak = 0;
        log::info!(
            "committed mood {} ({} path, confidence {:.2})",
            sample.mood,
            if immediate { "immediate" } else { "gradual" },
            sample.confidence
        );
        Some(sample.mood)
    }

    /// Forgets all history, including the committed mood.
    pub fn reset(&mut self) {
        self.last_committed = None;
        self.candidate = None;
        self.streak = 0;
    }
}
