use crate::api::{ApiError, FeedKind, PostsApi};
use plaza_common::{FeedState, FeedView, FilterPatch, PageTicket, Post, PostPatch};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Paginated feed for one listing.
///
/// Cheap to clone; clones share state. The state lock is only taken for
/// synchronous updates, never across a request.
#[derive(Clone)]
pub struct FeedController {
    kind: FeedKind,
    api: Arc<dyn PostsApi>,
    state: Arc<Mutex<FeedState>>,
}

impl FeedController {
    pub fn new(kind: FeedKind, api: Arc<dyn PostsApi>, page_size: u32) -> Self {
        Self {
            kind,
            api,
            state: Arc::new(Mutex::new(FeedState::new(page_size))),
        }
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FeedState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn snapshot(&self) -> FeedState {
        self.with_state(|s| s.clone())
    }

    pub fn view(&self) -> FeedView {
        self.with_state(|s| s.view())
    }

    pub fn has_more(&self) -> bool {
        self.with_state(|s| s.has_more)
    }

    pub fn is_loading(&self) -> bool {
        self.with_state(|s| s.is_loading)
    }

    /// First load plus filter stats; called once by the host
    pub async fn mount(&self) {
        info!("Mounting {:?} feed", self.kind);
        tokio::join!(self.load(true), self.load_stats());
    }

    /// Fetch one page. `reset` replaces the items, otherwise the page is appended.
    pub async fn load(&self, reset: bool) {
        let ticket = self.with_state(|s| s.begin_load(reset));
        self.run(ticket).await;
    }

    /// Next page, unless the feed is exhausted or a load is already running
    pub async fn load_more(&self) {
        let Some(ticket) = self.with_state(|s| s.try_begin_load_more()) else {
            debug!("load_more skipped: exhausted or already loading");
            return;
        };
        self.run(ticket).await;
    }

    /// Merge filters and reload from the first page.
    ///
    /// The reset happens when this is called, before the returned future is
    /// polled; awaiting it performs the load.
    pub fn update_filters(&self, patch: FilterPatch) -> impl Future<Output = ()> + Send + 'static {
        let ticket = self.with_state(|s| {
            s.update_filters(patch);
            s.begin_load(true)
        });
        info!("Feed filters changed: {:?}", patch);
        let this = self.clone();
        async move { this.run(ticket).await }
    }

    /// Drop everything and reload from the first page. Resets eagerly, like `update_filters`.
    pub fn refresh(&self) -> impl Future<Output = ()> + Send + 'static {
        let ticket = self.with_state(|s| {
            s.reset();
            s.error = None;
            s.begin_load(true)
        });
        let this = self.clone();
        async move { this.run(ticket).await }
    }

    pub async fn load_stats(&self) {
        match self.api.post_stats().await {
            Ok(stats) => self.with_state(|s| s.stats = Some(stats)),
            Err(e) => warn!("Error loading post stats: {}", e),
        }
    }

    /// Shallow-merge into the post with `id`. Unknown ids are ignored.
    pub fn patch_item(&self, id: &str, patch: PostPatch) -> bool {
        self.with_state(|s| s.patch_item(id, patch))
    }

    /// Show a freshly created post at the top
    pub fn prepend_item(&self, post: Post) {
        self.with_state(|s| s.prepend_item(post));
    }

    /// Optimistically flip the like, then settle on the server's answer.
    /// The optimistic change is reverted when the request fails.
    pub async fn toggle_like(&self, post_id: &str) -> Result<bool, ApiError> {
        let before = self.with_state(|s| s.item(post_id).map(PostPatch::snapshot));
        if let Some(before) = before {
            let liked = !before.is_liked.unwrap_or(false);
            self.patch_item(post_id, like_patch(&before, liked));
        }

        match self.api.toggle_like(post_id).await {
            Ok(liked) => {
                if let Some(before) = before {
                    self.patch_item(post_id, like_patch(&before, liked));
                }
                Ok(liked)
            }
            Err(e) => {
                warn!("Like toggle failed for {}: {}", post_id, e);
                if let Some(before) = before {
                    self.patch_item(post_id, before);
                }
                Err(e)
            }
        }
    }

    pub async fn toggle_bookmark(&self, post_id: &str) -> Result<bool, ApiError> {
        let before = self.with_state(|s| s.item(post_id).map(PostPatch::snapshot));
        if let Some(before) = before {
            let optimistic = PostPatch {
                is_bookmarked: Some(!before.is_bookmarked.unwrap_or(false)),
                ..Default::default()
            };
            self.patch_item(post_id, optimistic);
        }

        match self.api.toggle_bookmark(post_id).await {
            Ok(bookmarked) => {
                let settled = PostPatch {
                    is_bookmarked: Some(bookmarked),
                    ..Default::default()
                };
                self.patch_item(post_id, settled);
                Ok(bookmarked)
            }
            Err(e) => {
                warn!("Bookmark toggle failed for {}: {}", post_id, e);
                if let Some(before) = before {
                    self.patch_item(post_id, before);
                }
                Err(e)
            }
        }
    }

    /// The owning view went away; responses still in flight are dropped on arrival
    pub fn detach(&self) {
        self.with_state(|s| s.detach());
        debug!("{:?} feed detached", self.kind);
    }

    async fn run(&self, ticket: PageTicket) {
        match self.api.fetch_page(self.kind, &ticket.query).await {
            Ok(page) => {
                let count = page.posts.len();
                if self.with_state(|s| s.apply_page(&ticket, page)) {
                    info!(
                        "Loaded {} posts (skip={}, reset={})",
                        count, ticket.query.skip, ticket.reset
                    );
                } else {
                    debug!("Discarding stale page (skip={})", ticket.query.skip);
                }
            }
            Err(e) => {
                if self.with_state(|s| s.apply_error(&ticket, e.to_string())) {
                    warn!("Error loading {:?} feed: {}", self.kind, e);
                } else {
                    debug!("Discarding stale error: {}", e);
                }
            }
        }
    }
}

/// Client-owned fields after a like toggle, derived from the pre-toggle values
fn like_patch(before: &PostPatch, liked: bool) -> PostPatch {
    let was_liked = before.is_liked.unwrap_or(false);
    let count = before.likes_count.unwrap_or(0);
    let likes_count = match (was_liked, liked) {
        (false, true) => count + 1,
        (true, false) => (count - 1).max(0),
        _ => count,
    };
    PostPatch {
        is_liked: Some(liked),
        likes_count: Some(likes_count),
        is_bookmarked: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patch_adjusts_count() {
        let before = PostPatch {
            is_liked: Some(false),
            likes_count: Some(3),
            is_bookmarked: Some(false),
        };
        assert_eq!(like_patch(&before, true).likes_count, Some(4));
        assert_eq!(like_patch(&before, false).likes_count, Some(3));

        let liked_zero = PostPatch {
            is_liked: Some(true),
            likes_count: Some(0),
            is_bookmarked: None,
        };
        assert_eq!(like_patch(&liked_zero, false).likes_count, Some(0));
    }
}
