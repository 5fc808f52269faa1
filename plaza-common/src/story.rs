use crate::identity::{Identified, MissingIdentity};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryMediaType {
    Image,
    Video,
}

/// A single story in an author's collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Identified<StoryBody>")]
pub struct Story {
    pub id: String,
    pub author_id: String,
    pub media_url: String,
    pub media_type: StoryMediaType,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub views_count: u64,
    pub is_viewed: bool,
}

#[derive(Debug, Deserialize)]
pub struct StoryBody {
    #[serde(default)]
    author_id: String,
    media_url: String,
    media_type: StoryMediaType,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    views_count: u64,
    #[serde(default)]
    is_viewed: Option<bool>,
}

impl TryFrom<Identified<StoryBody>> for Story {
    type Error = MissingIdentity;

    fn try_from(wire: Identified<StoryBody>) -> Result<Self, Self::Error> {
        let (id, body) = wire.into_parts()?;
        Ok(Story {
            id,
            author_id: body.author_id,
            media_url: body.media_url,
            media_type: body.media_type,
            thumbnail_url: body.thumbnail_url,
            created_at: body.created_at,
            views_count: body.views_count,
            is_viewed: body.is_viewed.unwrap_or(false),
        })
    }
}

/// All active stories of one author, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStoryCollection {
    pub author_id: String,
    #[serde(default)]
    pub author_username: String,
    #[serde(rename = "author_displayName", default)]
    pub author_display_name: String,
    #[serde(default)]
    pub author_photo: Option<String>,
    #[serde(default)]
    pub has_unseen: bool,
    pub stories: Vec<Story>,
}

impl UserStoryCollection {
    /// Enforce the collection invariants: stories without an author are
    /// attributed to the collection, stories of another author are dropped,
    /// and an empty collection yields `None`.
    pub fn normalize(mut self) -> Option<Self> {
        let author_id = self.author_id.clone();
        self.stories.retain_mut(|story| {
            if story.author_id.is_empty() {
                story.author_id = author_id.clone();
            }
            story.author_id == author_id
        });
        if self.stories.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    pub fn last_index(&self) -> usize {
        self.stories.len().saturating_sub(1)
    }
}

/// Someone who viewed one of the viewer's own stories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryViewer {
    pub viewer_id: String,
    #[serde(default)]
    pub viewer_username: String,
    #[serde(rename = "viewer_displayName", default)]
    pub viewer_display_name: String,
    #[serde(default)]
    pub viewer_photo: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub viewed_at: DateTime<Utc>,
}

/// Accept RFC 3339 timestamps as well as offset-less ones, which are read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("bad timestamp: {raw}")))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
