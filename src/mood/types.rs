use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{MoodError, MoodResult};

/// The closed set of moods the app offers content for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Mood {
    Happy,
    Sad,
    Motivated,
    Relaxed,
}

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Happy, Mood::Sad, Mood::Motivated, Mood::Relaxed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Sad => "Sad",
            Mood::Motivated => "Motivated",
            Mood::Relaxed => "Relaxed",
        }
    }

    pub fn profile(&self) -> MoodProfile {
        match self {
            Mood::Happy => MoodProfile {
                mood: *self,
                label: "Happy 😊",
                query: "happy songs",
                theme: MoodTheme {
                    accent: "#f59e0b",
                    background: "#2a1f05",
                    text: "#fff7e6",
                },
            },
            Mood::Sad => MoodProfile {
                mood: *self,
                label: "Sad 😢",
                query: "sad songs",
                theme: MoodTheme {
                    accent: "#3b82f6",
                    background: "#0b1526",
                    text: "#e6eefc",
                },
            },
            Mood::Motivated => MoodProfile {
                mood: *self,
                label: "Motivated 💪",
                query: "motivational speeches",
                theme: MoodTheme {
                    accent: "#ef4444",
                    background: "#260b0b",
                    text: "#fdeaea",
                },
            },
            Mood::Relaxed => MoodProfile {
                mood: *self,
                label: "Relaxed 😴",
                query: "lofi chill beats",
                theme: MoodTheme {
                    accent: "#10b981",
                    background: "#06201a",
                    text: "#e7fbf4",
                },
            },
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colors the presentation layer applies while a mood is active.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MoodTheme {
    pub accent: &'static str,
    pub background: &'static str,
    pub text: &'static str,
}

/// Static configuration attached to each mood.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MoodProfile {
    pub mood: Mood,
    pub label: &'static str,
    pub query: &'static str,
    pub theme: MoodTheme,
}

/// Raw classifier labels, validated against the known vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Expression {
    Happy,
    Sad,
    Angry,
    Neutral,
    Surprised,
    Fearful,
    Disgusted,
    Unknown,
}

impl Expression {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "happy" => Expression::Happy,
            "sad" => Expression::Sad,
            "angry" => Expression::Angry,
            "neutral" => Expression::Neutral,
            "surprised" => Expression::Surprised,
            "fearful" => Expression::Fearful,
            "disgusted" => Expression::Disgusted,
            _ => Expression::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionScore {
    /// Label as reported by the classifier, kept for display.
    pub label: String,
    pub expression: Expression,
    pub probability: f32,
}

/// Per-frame expression probabilities for one face.
///
/// Values come pre-normalized from the classifier and are not re-normalized
/// here. Entry order is the order the classifier reported them in, or label
/// order when built from an unordered map.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct ExpressionVector {
    scores: Vec<ExpressionScore>,
}

impl ExpressionVector {
    pub fn from_pairs<I, S>(pairs: I) -> MoodResult<Self>
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let mut scores = Vec::new();
        for (label, probability) in pairs {
            let label = label.into();
            if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
                return Err(MoodError::invalid_input(format!(
                    "probability for '{label}' out of range: {probability}"
                )));
            }
            if Expression::parse(&label) == Expression::Unknown {
                log::debug!("unrecognized expression label '{label}'");
            }
            scores.push(ExpressionScore {
                expression: Expression::parse(&label),
                label,
                probability,
            });
        }
        Ok(Self { scores })
    }

    /// Builds a vector from the classifier's unordered label map. Labels are
    /// sorted so the result does not depend on hash order.
    pub fn from_map(raw: &HashMap<String, f32>) -> MoodResult<Self> {
        let mut pairs: Vec<(&String, &f32)> = raw.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        Self::from_pairs(pairs.into_iter().map(|(label, p)| (label.clone(), *p)))
    }

    pub fn scores(&self) -> &[ExpressionScore] {
        &self.scores
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Entries sorted by probability, highest first, for live display.
    pub fn ranked(&self, limit: usize) -> Vec<ExpressionScore> {
        let mut ranked = self.scores.clone();
        ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        ranked.truncate(limit);
        ranked
    }
}

/// Output of the mood mapper for one frame.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoodReading {
    pub mood: Mood,
    pub confidence: f32,
    pub dominant: Expression,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoodSample {
    pub mood: Mood,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl MoodSample {
    pub fn new(mood: Mood, confidence: f32, timestamp: DateTime<Utc>) -> Self {
        Self {
            mood,
            confidence,
            timestamp,
        }
    }

    pub fn from_reading(reading: &MoodReading, timestamp: DateTime<Utc>) -> Self {
        Self::new(reading.mood, reading.confidence, timestamp)
    }
}
