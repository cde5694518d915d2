//! Video search client for mood playlists.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::ContentConfig;
use crate::content::types::{parse_search_response, ContentItem, ErrorEnvelope};
use crate::error::{ContentError, ContentResult};

/// Source of content items for a mood query.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn search(&self, query: &str) -> ContentResult<Vec<ContentItem>>;
}

/// YouTube Data API search client. Never retries; failures go to the caller.
pub struct YouTubeClient {
    http: Client,
    config: ContentConfig,
}

impl YouTubeClient {
    pub fn new(config: ContentConfig) -> ContentResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| ContentError::Network(err.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    fn error_from_response(status: StatusCode, body: String) -> ContentError {
        let envelope = serde_json::from_str::<ErrorEnvelope>(&body).ok();
        let message = envelope
            .as_ref()
            .map(|e| e.error.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.chars().take(200).collect());

        let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN
                && envelope.as_ref().is_some_and(|e| e.error.is_rate_limit()));

        if rate_limited {
            ContentError::RateLimited(message)
        } else {
            ContentError::Network(format!("search returned {status}: {message}"))
        }
    }
}

#[async_trait]
impl ContentProvider for YouTubeClient {
    async fn search(&self, query: &str) -> ContentResult<Vec<ContentItem>> {
        if self.config.api_key.is_empty() {
            return Err(ContentError::MissingCredential);
        }

        log::debug!("searching content for '{query}'");

        let max_results = self.config.max_results.to_string();
        let response = self
            .http
            .get(&self.config.endpoint)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("q", query),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = Self::error_from_response(status, body);
            log::warn!("content search for '{query}' failed: {err}");
            return Err(err);
        }

        let items = parse_search_response(&body)?;
        log::info!("content search for '{query}' returned {} items", items.len());
        Ok(items)
    }
}
