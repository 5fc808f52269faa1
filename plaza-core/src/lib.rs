pub mod api;
pub mod api_client;
pub mod config;
pub mod feed;
pub mod session;
pub mod stories;

pub use api::{ApiError, FeedKind, PostsApi, StoriesApi};
pub use api_client::ApiClient;
pub use config::{Config, ConfigError};
pub use feed::{FeedController, InfiniteScroll, InfiniteScrollHandle, LoadMoreTarget, ScrollMetrics};
pub use session::{Session, SessionError, SessionStore};
pub use stories::{PlayerSettings, StoriesBar, StoryPlayer, StoryPlayerHandle, StoryProgress};
