use crate::api::{ApiError, FeedKind, PostsApi, StoriesApi};
use crate::session::SessionStore;
use async_trait::async_trait;
use plaza_common::{FeedPage, PageQuery, Post, PostStats, StoryViewer, UserStoryCollection};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// HTTP client for the Plaza REST API.
///
/// Every request carries the session's bearer token when one is stored.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    session: SessionStore,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WireFeedPage {
    #[serde(default)]
    posts: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_skip: Option<u32>,
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LikeResponse {
    liked: bool,
}

#[derive(Debug, Deserialize)]
struct BookmarkResponse {
    bookmarked: bool,
}

#[derive(Debug, Serialize)]
struct StoryReply<'a> {
    recipient_id: &'a str,
    content: &'a str,
    story_id: &'a str,
}

impl ApiClient {
    pub fn new(base_url: &str, session: SessionStore) -> Result<Self, ApiError> {
        let parsed = reqwest::Url::parse(base_url).map_err(|e| ApiError::Url(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::Url(format!("unsupported scheme in {base_url}")));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            http: reqwest::Client::new(),
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match self.session.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and turn non-2xx responses into `ApiError::Status`
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            detail: error_detail(&body),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let resp = self.send(builder).await?;
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// FastAPI errors look like `{"detail": "..."}`; validation errors carry a list instead.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

/// Decode each element on its own so one malformed record does not sink the page
fn decode_each<T: DeserializeOwned>(values: Vec<Value>, what: &str) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping malformed {}: {}", what, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl PostsApi for ApiClient {
    async fn fetch_page(&self, kind: FeedKind, query: &PageQuery) -> Result<FeedPage, ApiError> {
        let builder = self
            .request(Method::GET, kind.path())
            .query(&query.to_params());
        let wire: WireFeedPage = self.send_json(builder).await?;
        let posts: Vec<Post> = decode_each(wire.posts, "post");
        Ok(FeedPage {
            posts,
            has_more: wire.has_more,
            next_skip: wire.next_skip,
            total_count: wire.total_count,
        })
    }

    async fn post_stats(&self) -> Result<PostStats, ApiError> {
        self.send_json(self.request(Method::GET, "/posts/stats"))
            .await
    }

    async fn toggle_like(&self, post_id: &str) -> Result<bool, ApiError> {
        let path = format!("/posts/{}/like", post_id);
        let resp: LikeResponse = self.send_json(self.request(Method::POST, &path)).await?;
        Ok(resp.liked)
    }

    async fn toggle_bookmark(&self, post_id: &str) -> Result<bool, ApiError> {
        let path = format!("/posts/{}/bookmark", post_id);
        let resp: BookmarkResponse = self.send_json(self.request(Method::POST, &path)).await?;
        Ok(resp.bookmarked)
    }
}

#[async_trait]
impl StoriesApi for ApiClient {
    async fn active_stories(&self) -> Result<Vec<UserStoryCollection>, ApiError> {
        let values: Vec<Value> = self
            .send_json(self.request(Method::GET, "/stories/active"))
            .await?;
        let collections: Vec<UserStoryCollection> = decode_each(values, "story collection");
        Ok(collections
            .into_iter()
            .filter_map(UserStoryCollection::normalize)
            .collect())
    }

    async fn mark_viewed(&self, story_id: &str) -> Result<(), ApiError> {
        let path = format!("/stories/{}/view", story_id);
        self.send(self.request(Method::POST, &path)).await?;
        Ok(())
    }

    async fn story_viewers(&self, story_id: &str) -> Result<Vec<StoryViewer>, ApiError> {
        let path = format!("/stories/{}/viewers", story_id);
        let values: Vec<Value> = self.send_json(self.request(Method::GET, &path)).await?;
        Ok(decode_each(values, "story viewer"))
    }

    async fn delete_story(&self, story_id: &str) -> Result<(), ApiError> {
        let path = format!("/stories/{}", story_id);
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn reply_to_story(
        &self,
        recipient_id: &str,
        story_id: &str,
        content: &str,
    ) -> Result<(), ApiError> {
        let body = StoryReply {
            recipient_id,
            content,
            story_id,
        };
        self.send(self.request(Method::POST, "/messages/").json(&body))
            .await?;
        Ok(())
    }
}
