use crate::identity::{Identified, MissingIdentity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A post as held in a feed.
///
/// Only the engagement flags are owned by the client; every other field the
/// backend sends is kept verbatim in `extra` and exposed through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Identified<PostBody>")]
pub struct Post {
    pub id: String,
    pub is_liked: bool,
    pub likes_count: i64,
    pub is_bookmarked: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct PostBody {
    #[serde(default)]
    is_liked: Option<bool>,
    #[serde(default)]
    likes_count: Option<i64>,
    #[serde(default)]
    is_bookmarked: Option<bool>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<Identified<PostBody>> for Post {
    type Error = MissingIdentity;

    fn try_from(wire: Identified<PostBody>) -> Result<Self, Self::Error> {
        let (id, body) = wire.into_parts()?;
        Ok(Post {
            id,
            is_liked: body.is_liked.unwrap_or(false),
            likes_count: body.likes_count.unwrap_or(0),
            is_bookmarked: body.is_bookmarked.unwrap_or(false),
            extra: body.extra,
        })
    }
}

impl Post {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_liked: false,
            likes_count: 0,
            is_bookmarked: false,
            extra: Map::new(),
        }
    }

    /// Builder-style setter for a foreign-owned field
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    pub fn author_id(&self) -> Option<&str> {
        self.str_field("author_id")
    }

    pub fn author_username(&self) -> Option<&str> {
        self.str_field("author_username")
    }

    pub fn content(&self) -> Option<&str> {
        self.str_field("content")
    }

    pub fn media_type(&self) -> Option<&str> {
        self.str_field("media_type")
    }

    pub fn comments_count(&self) -> i64 {
        self.extra
            .get("comments_count")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }
}

/// Shallow patch over the client-owned post fields (optimistic like/bookmark)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostPatch {
    pub is_liked: Option<bool>,
    pub likes_count: Option<i64>,
    pub is_bookmarked: Option<bool>,
}

impl PostPatch {
    /// Patch that restores the client-owned fields of `post` as they are now
    pub fn snapshot(post: &Post) -> Self {
        Self {
            is_liked: Some(post.is_liked),
            likes_count: Some(post.likes_count),
            is_bookmarked: Some(post.is_bookmarked),
        }
    }

    pub fn apply_to(&self, post: &mut Post) {
        if let Some(liked) = self.is_liked {
            post.is_liked = liked;
        }
        if let Some(count) = self.likes_count {
            post.likes_count = count;
        }
        if let Some(bookmarked) = self.is_bookmarked {
            post.is_bookmarked = bookmarked;
        }
    }
}

/// One page of a feed listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub has_more: bool,
    /// Offset of the next page, when the server provides one
    pub next_skip: Option<u32>,
    pub total_count: Option<u64>,
}

/// Post counts by media type, used to label the feed filters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStats {
    #[serde(default)]
    pub total_posts: u64,
    #[serde(default)]
    pub image_posts: u64,
    #[serde(default)]
    pub video_posts: u64,
    #[serde(default)]
    pub text_posts: u64,
}
