use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::mood::types::Mood;

const MAX_HISTORY: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CommitSource {
    Manual,
    Detected,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub mood: Mood,
    pub source: CommitSource,
    pub committed_at: DateTime<Utc>,
}

/// Most recent committed moods, newest first.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct MoodHistory {
    entries: VecDeque<HistoryEntry>,
}

impl MoodHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, mood: Mood, source: CommitSource, committed_at: DateTime<Utc>) {
        self.entries.push_front(HistoryEntry {
            mood,
            source,
            committed_at,
        });
        self.entries.truncate(MAX_HISTORY);
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
