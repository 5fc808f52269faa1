//! Backend contracts consumed by the controllers.
//!
//! [`crate::api_client::ApiClient`] implements both traits over HTTP; tests
//! plug in in-memory fakes.

use async_trait::async_trait;
use plaza_common::{FeedPage, PageQuery, PostStats, StoryViewer, UserStoryCollection};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error ({status}): {detail}")]
    Status { status: u16, detail: String },
    #[error("unexpected response format: {0}")]
    Parse(String),
    #[error("invalid URL: {0}")]
    Url(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Which listing a feed controller pages through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Every post
    Explore,
    /// Posts from followed users
    Following,
}

impl FeedKind {
    pub fn path(&self) -> &'static str {
        match self {
            FeedKind::Explore => "/posts/explore",
            FeedKind::Following => "/posts/feed",
        }
    }
}

#[async_trait]
pub trait PostsApi: Send + Sync {
    async fn fetch_page(&self, kind: FeedKind, query: &PageQuery) -> Result<FeedPage, ApiError>;

    async fn post_stats(&self) -> Result<PostStats, ApiError>;

    /// Returns whether the post is liked after the toggle
    async fn toggle_like(&self, post_id: &str) -> Result<bool, ApiError>;

    /// Returns whether the post is bookmarked after the toggle
    async fn toggle_bookmark(&self, post_id: &str) -> Result<bool, ApiError>;
}

#[async_trait]
pub trait StoriesApi: Send + Sync {
    async fn active_stories(&self) -> Result<Vec<UserStoryCollection>, ApiError>;

    async fn mark_viewed(&self, story_id: &str) -> Result<(), ApiError>;

    /// Owner only
    async fn story_viewers(&self, story_id: &str) -> Result<Vec<StoryViewer>, ApiError>;

    /// Owner only
    async fn delete_story(&self, story_id: &str) -> Result<(), ApiError>;

    /// Send a direct message referencing the story
    async fn reply_to_story(
        &self,
        recipient_id: &str,
        story_id: &str,
        content: &str,
    ) -> Result<(), ApiError>;
}
