pub mod client;
pub mod types;

pub use client::{ContentProvider, YouTubeClient};
pub use types::{ContentItem, PlaybackTarget};
