use crate::api::StoriesApi;
use plaza_common::UserStoryCollection;
use std::sync::Arc;
use tracing::{info, warn};

/// Active stories strip: one collection per author with live stories
pub struct StoriesBar {
    api: Arc<dyn StoriesApi>,
    roster: Vec<UserStoryCollection>,
}

impl StoriesBar {
    pub fn new(api: Arc<dyn StoriesApi>) -> Self {
        Self {
            api,
            roster: Vec::new(),
        }
    }

    /// Replace the roster with the backend's active stories.
    /// A failed load leaves the bar empty.
    pub async fn load(&mut self) {
        match self.api.active_stories().await {
            Ok(roster) => {
                info!("Loaded {} story collections", roster.len());
                self.roster = roster;
            }
            Err(e) => {
                warn!("Error loading stories: {}", e);
                self.roster.clear();
            }
        }
    }

    pub fn roster(&self) -> &[UserStoryCollection] {
        &self.roster
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// The viewer's own collection, when it has stories
    pub fn own_collection(&self, viewer_id: &str) -> Option<&UserStoryCollection> {
        self.roster
            .iter()
            .find(|c| c.author_id == viewer_id && !c.stories.is_empty())
    }

    /// Reflect a deleted story. Collections left empty are dropped.
    pub fn remove_story(&mut self, author_id: &str, story_id: &str) -> bool {
        let Some(pos) = self.roster.iter().position(|c| c.author_id == author_id) else {
            return false;
        };
        let collection = &mut self.roster[pos];
        let before = collection.stories.len();
        collection.stories.retain(|s| s.id != story_id);
        let removed = collection.stories.len() != before;
        if collection.stories.is_empty() {
            self.roster.remove(pos);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use async_trait::async_trait;
    use chrono::Utc;
    use plaza_common::{Story, StoryMediaType, StoryViewer};

    struct FixedStories(Result<Vec<UserStoryCollection>, u16>);

    #[async_trait]
    impl StoriesApi for FixedStories {
        async fn active_stories(&self) -> Result<Vec<UserStoryCollection>, ApiError> {
            self.0.clone().map_err(|status| ApiError::Status {
                status,
                detail: "boom".into(),
            })
        }
        async fn mark_viewed(&self, _: &str) -> Result<(), ApiError> {
            Ok(())
        }
        async fn story_viewers(&self, _: &str) -> Result<Vec<StoryViewer>, ApiError> {
            Ok(vec![])
        }
        async fn delete_story(&self, _: &str) -> Result<(), ApiError> {
            Ok(())
        }
        async fn reply_to_story(&self, _: &str, _: &str, _: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn collection(author: &str, ids: &[&str]) -> UserStoryCollection {
        UserStoryCollection {
            author_id: author.into(),
            author_username: author.into(),
            author_display_name: author.into(),
            author_photo: None,
            has_unseen: false,
            stories: ids
                .iter()
                .map(|id| Story {
                    id: (*id).into(),
                    author_id: author.into(),
                    media_url: format!("https://cdn/{id}.jpg"),
                    media_type: StoryMediaType::Image,
                    thumbnail_url: None,
                    created_at: Utc::now(),
                    views_count: 0,
                    is_viewed: false,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_load_and_remove() {
        let api = FixedStories(Ok(vec![
            collection("me", &["m1", "m2"]),
            collection("ann", &["a1"]),
        ]));
        let mut bar = StoriesBar::new(Arc::new(api));
        bar.load().await;
        assert_eq!(bar.roster().len(), 2);
        assert_eq!(bar.own_collection("me").map(|c| c.stories.len()), Some(2));
        assert!(bar.own_collection("ghost").is_none());

        assert!(bar.remove_story("me", "m1"));
        assert!(!bar.remove_story("me", "m1"));
        assert!(bar.remove_story("me", "m2"));
        assert!(bar.own_collection("me").is_none());
        assert_eq!(bar.roster().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_empty() {
        let mut bar = StoriesBar::new(Arc::new(FixedStories(Err(500))));
        bar.load().await;
        assert!(bar.is_empty());
    }
}
