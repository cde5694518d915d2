use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ContentError, ContentResult};

/// One video returned for a mood query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub channel_name: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// What the playback overlay needs to show an activated item.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackTarget {
    pub item: ContentItem,
    pub embed_url: String,
    pub watch_url: String,
}

impl PlaybackTarget {
    pub fn for_item(item: ContentItem) -> Self {
        Self {
            embed_url: format!("https://www.youtube.com/embed/{}?autoplay=1", item.id),
            watch_url: format!("https://www.youtube.com/watch?v={}", item.id),
            item,
        }
    }
}

// Search API wire format. Only the fields we read are modelled.

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub items: Option<Vec<SearchItem>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchItem {
    pub id: SearchItemId,
    pub snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchItemId {
    pub kind: Option<String>,
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Snippet {
    pub title: Option<String>,
    pub channel_title: Option<String>,
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Thumbnails {
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorReason>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorReason {
    #[serde(default)]
    pub reason: String,
}

impl ErrorBody {
    pub fn is_rate_limit(&self) -> bool {
        self.errors.iter().any(|e| {
            matches!(
                e.reason.as_str(),
                "quotaExceeded" | "rateLimitExceeded" | "userRateLimitExceeded" | "dailyLimitExceeded"
            )
        })
    }
}

/// Turns a search payload into content items, skipping non-video results.
pub(crate) fn parse_search_response(body: &str) -> ContentResult<Vec<ContentItem>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    let items = response
        .items
        .ok_or_else(|| ContentError::MalformedPayload("missing 'items' array".into()))?;

    let mut content = Vec::with_capacity(items.len());
    for item in items {
        let Some(video_id) = item.id.video_id else {
            log::debug!(
                "skipping non-video search result ({})",
                item.id.kind.as_deref().unwrap_or("unknown kind")
            );
            continue;
        };

        let snippet = item.snippet.ok_or_else(|| {
            ContentError::MalformedPayload(format!("video {video_id} has no snippet"))
        })?;

        let thumbnail_url = snippet
            .thumbnails
            .medium
            .or(snippet.thumbnails.high)
            .or(snippet.thumbnails.default)
            .map(|thumb| thumb.url)
            .unwrap_or_default();

        let published_at = snippet.published_at.as_deref().and_then(|value| {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        content.push(ContentItem {
            id: video_id,
            title: snippet.title.unwrap_or_default(),
            thumbnail_url,
            channel_name: snippet.channel_title.unwrap_or_default(),
            published_at,
        });
    }

    Ok(content)
}
