use crate::post::{FeedPage, Post, PostPatch, PostStats};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Media filter for feed listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    All,
    Image,
    Video,
    Text,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::All => "all",
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Text => "text",
        }
    }
}

/// Sort key for feed listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    LikesCount,
    CommentsCount,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::CreatedAt => "created_at",
            SortBy::LikesCount => "likes_count",
            SortBy::CommentsCount => "comments_count",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Desc => "desc",
            SortOrder::Asc => "asc",
        }
    }
}

macro_rules! impl_str_enum {
    ($ty:ty, [$($variant:expr),+]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($variant),+]
                    .into_iter()
                    .find(|v: &$ty| v.as_str() == s)
                    .ok_or_else(|| format!("unknown value '{}'", s))
            }
        }
    };
}

impl_str_enum!(MediaType, [MediaType::All, MediaType::Image, MediaType::Video, MediaType::Text]);
impl_str_enum!(SortBy, [SortBy::CreatedAt, SortBy::LikesCount, SortBy::CommentsCount]);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedFilters {
    pub media_type: MediaType,
    pub sort_by: SortBy,
}

/// Partial filter update; `None` keeps the current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterPatch {
    pub media_type: Option<MediaType>,
    pub sort_by: Option<SortBy>,
}

impl FilterPatch {
    pub fn media_type(media_type: MediaType) -> Self {
        Self {
            media_type: Some(media_type),
            sort_by: None,
        }
    }

    pub fn sort_by(sort_by: SortBy) -> Self {
        Self {
            media_type: None,
            sort_by: Some(sort_by),
        }
    }
}

impl FeedFilters {
    pub fn merge(&mut self, patch: FilterPatch) {
        if let Some(media_type) = patch.media_type {
            self.media_type = media_type;
        }
        if let Some(sort_by) = patch.sort_by {
            self.sort_by = sort_by;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u32,
    pub page_size: u32,
}

/// Query parameters of one page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub skip: u32,
    pub limit: u32,
    pub sort_by: SortBy,
    pub media_type: MediaType,
    pub order: SortOrder,
}

impl PageQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("skip", self.skip.to_string()),
            ("limit", self.limit.to_string()),
            ("sort_by", self.sort_by.as_str().to_string()),
            ("media_type", self.media_type.as_str().to_string()),
            ("order", self.order.as_str().to_string()),
        ]
    }
}

/// Issued when a load starts. A response is only applied while its ticket's
/// generation still matches the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTicket {
    pub generation: u64,
    pub reset: bool,
    pub query: PageQuery,
}

/// What the feed should currently render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedView {
    /// Nothing to show yet and a load is pending
    Skeleton,
    /// Last load failed; render a retry card
    Error(String),
    /// A successful load returned no posts
    Empty,
    /// Posts, more may follow
    Items,
    /// Posts, and the server reported no further pages
    EndOfContent,
}

/// Paginated feed state: cursor, filters and the accumulated posts
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState {
    pub items: Vec<Post>,
    pub is_loading: bool,
    pub has_more: bool,
    pub error: Option<String>,
    pub filters: FeedFilters,
    pub page: Page,
    pub stats: Option<PostStats>,
    generation: u64,
    loaded: bool,
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl FeedState {
    pub fn new(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            is_loading: false,
            has_more: true,
            error: None,
            filters: FeedFilters::default(),
            page: Page {
                offset: 0,
                page_size: page_size.max(1),
            },
            stats: None,
            generation: 0,
            loaded: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop all items and rewind the cursor. Invalidates in-flight requests.
    pub fn reset(&mut self) {
        self.items.clear();
        self.page.offset = 0;
        self.has_more = true;
        self.loaded = false;
        self.generation += 1;
    }

    /// Merge filters and reset. The caller follows up with a reset load.
    pub fn update_filters(&mut self, patch: FilterPatch) {
        self.filters.merge(patch);
        self.reset();
    }

    /// Mark a load as started and build its request
    pub fn begin_load(&mut self, reset: bool) -> PageTicket {
        self.is_loading = true;
        self.error = None;
        PageTicket {
            generation: self.generation,
            reset,
            query: PageQuery {
                skip: if reset { 0 } else { self.page.offset },
                limit: self.page.page_size,
                sort_by: self.filters.sort_by,
                media_type: self.filters.media_type,
                order: SortOrder::Desc,
            },
        }
    }

    /// Start a next-page load unless the feed is exhausted or already loading
    pub fn try_begin_load_more(&mut self) -> Option<PageTicket> {
        if !self.has_more || self.is_loading {
            return None;
        }
        Some(self.begin_load(false))
    }

    fn is_current(&self, ticket: &PageTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Apply a fetched page. Returns false when the ticket is stale and the page was dropped.
    pub fn apply_page(&mut self, ticket: &PageTicket, page: FeedPage) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        if ticket.reset {
            self.items.clear();
        }
        let mut seen: HashSet<String> = self.items.iter().map(|p| p.id.clone()).collect();
        for post in page.posts {
            if seen.insert(post.id.clone()) {
                self.items.push(post);
            }
        }

        self.has_more = page.has_more;
        self.page.offset = match page.next_skip {
            Some(next) if next > 0 => next,
            _ => match ticket.query.skip.checked_add(ticket.query.limit) {
                Some(next) => next,
                None => {
                    // The cursor cannot move past u32::MAX; treat the feed as exhausted
                    self.has_more = false;
                    u32::MAX
                }
            },
        };
        self.is_loading = false;
        self.loaded = true;
        true
    }

    /// Record a failed load. Items are left untouched.
    pub fn apply_error(&mut self, ticket: &PageTicket, message: String) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.error = Some(message);
        self.is_loading = false;
        true
    }

    /// Owner went away: any response still in flight must be ignored
    pub fn detach(&mut self) {
        self.generation += 1;
        self.is_loading = false;
    }

    pub fn patch_item(&mut self, id: &str, patch: PostPatch) -> bool {
        match self.items.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                patch.apply_to(post);
                true
            }
            None => false,
        }
    }

    pub fn item(&self, id: &str) -> Option<&Post> {
        self.items.iter().find(|p| p.id == id)
    }

    pub fn prepend_item(&mut self, post: Post) {
        self.items.insert(0, post);
    }

    pub fn view(&self) -> FeedView {
        if let Some(ref error) = self.error {
            return FeedView::Error(error.clone());
        }
        if self.items.is_empty() {
            if self.is_loading || !self.loaded {
                FeedView::Skeleton
            } else {
                FeedView::Empty
            }
        } else if self.has_more {
            FeedView::Items
        } else {
            FeedView::EndOfContent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(ids: &[&str], has_more: bool, next_skip: Option<u32>) -> FeedPage {
        FeedPage {
            posts: ids.iter().map(|id| Post::new(*id)).collect(),
            has_more,
            next_skip,
            total_count: None,
        }
    }

    fn ids(state: &FeedState) -> Vec<&str> {
        state.items.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_new_state() {
        let state = FeedState::default();
        assert!(state.items.is_empty());
        assert!(state.has_more);
        assert!(!state.is_loading);
        assert_eq!(state.page.offset, 0);
        assert_eq!(state.page.page_size, 20);
        assert_eq!(state.filters, FeedFilters::default());
    }

    #[test]
    fn test_begin_load_builds_query() {
        let mut state = FeedState::new(10);
        state.update_filters(FilterPatch::media_type(MediaType::Video));
        state.page.offset = 30;

        let ticket = state.begin_load(false);
        assert!(state.is_loading);
        assert_eq!(ticket.query.skip, 30);
        assert_eq!(ticket.query.limit, 10);
        assert_eq!(ticket.query.media_type, MediaType::Video);
        assert_eq!(ticket.query.order, SortOrder::Desc);

        let reset_ticket = state.begin_load(true);
        assert_eq!(reset_ticket.query.skip, 0);
    }

    #[test]
    fn test_append_then_replace() {
        let mut state = FeedState::new(2);
        let t1 = state.begin_load(true);
        assert!(state.apply_page(&t1, page(&["a", "b"], true, Some(2))));
        let t2 = state.try_begin_load_more().unwrap();
        assert!(state.apply_page(&t2, page(&["c"], false, None)));
        assert_eq!(ids(&state), vec!["a", "b", "c"]);
        assert_eq!(state.page.offset, 4);
        assert!(!state.has_more);

        let t3 = state.begin_load(true);
        assert!(state.apply_page(&t3, page(&["z"], true, None)));
        assert_eq!(ids(&state), vec!["z"]);
    }

    #[test]
    fn test_append_drops_duplicate_ids() {
        let mut state = FeedState::new(2);
        let t1 = state.begin_load(true);
        state.apply_page(&t1, page(&["a", "b"], true, None));
        let t2 = state.try_begin_load_more().unwrap();
        state.apply_page(&t2, page(&["b", "c"], true, None));
        assert_eq!(ids(&state), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_offset_falls_back_to_page_size() {
        let mut state = FeedState::new(20);
        let t1 = state.begin_load(true);
        state.apply_page(&t1, page(&["a"], true, None));
        assert_eq!(state.page.offset, 20);
        let t2 = state.try_begin_load_more().unwrap();
        state.apply_page(&t2, page(&["b"], true, Some(0)));
        assert_eq!(state.page.offset, 40);
    }

    #[test]
    fn test_offset_overflow_exhausts_feed() {
        let mut state = FeedState::new(20);
        let t1 = state.begin_load(true);
        state.apply_page(&t1, page(&["a"], true, Some(u32::MAX - 5)));
        assert_eq!(state.page.offset, u32::MAX - 5);

        let t2 = state.try_begin_load_more().unwrap();
        assert!(state.apply_page(&t2, page(&["b"], true, None)));
        assert_eq!(state.page.offset, u32::MAX);
        assert!(!state.has_more);
        assert!(state.try_begin_load_more().is_none());
        assert_eq!(ids(&state), vec!["a", "b"]);
    }

    #[test]
    fn test_load_more_guard() {
        let mut state = FeedState::default();
        let _t = state.begin_load(true);
        assert!(state.try_begin_load_more().is_none());

        let mut done = FeedState::default();
        done.has_more = false;
        assert!(done.try_begin_load_more().is_none());
    }

    #[test]
    fn test_update_filters_resets_synchronously() {
        let mut state = FeedState::default();
        let t1 = state.begin_load(true);
        state.apply_page(&t1, page(&["a", "b"], false, Some(2)));

        state.update_filters(FilterPatch::sort_by(SortBy::LikesCount));
        assert!(state.items.is_empty());
        assert_eq!(state.page.offset, 0);
        assert!(state.has_more);
        assert_eq!(state.filters.sort_by, SortBy::LikesCount);
        assert_eq!(state.filters.media_type, MediaType::All);
    }

    #[test]
    fn test_stale_page_is_dropped() {
        let mut state = FeedState::default();
        let stale = state.begin_load(true);
        state.update_filters(FilterPatch::media_type(MediaType::Image));
        let fresh = state.begin_load(true);

        assert!(!state.apply_page(&stale, page(&["old"], false, None)));
        assert!(state.items.is_empty());
        assert!(state.is_loading);

        assert!(state.apply_page(&fresh, page(&["new"], true, None)));
        assert_eq!(ids(&state), vec!["new"]);
        assert!(!state.is_loading);
    }

    #[test]
    fn test_error_keeps_items() {
        let mut state = FeedState::default();
        let t1 = state.begin_load(true);
        state.apply_page(&t1, page(&["a"], true, None));
        let t2 = state.try_begin_load_more().unwrap();
        assert!(state.apply_error(&t2, "boom".into()));
        assert_eq!(ids(&state), vec!["a"]);
        assert!(!state.is_loading);
        assert_eq!(state.view(), FeedView::Error("boom".into()));

        // retry clears the error
        let _t3 = state.try_begin_load_more().unwrap();
        assert!(state.error.is_none());
    }

    #[test]
    fn test_detach_ignores_late_response() {
        let mut state = FeedState::default();
        let ticket = state.begin_load(true);
        state.detach();
        assert!(!state.apply_page(&ticket, page(&["a"], true, None)));
        assert!(!state.apply_error(&ticket, "late".into()));
        assert!(state.items.is_empty());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_patch_and_prepend() {
        let mut state = FeedState::default();
        let t1 = state.begin_load(true);
        state.apply_page(&t1, page(&["a", "b"], true, Some(2)));

        let patch = PostPatch {
            is_bookmarked: Some(true),
            ..Default::default()
        };
        assert!(state.patch_item("b", patch));
        assert!(state.item("b").unwrap().is_bookmarked);
        assert!(!state.patch_item("missing", patch));

        state.prepend_item(Post::new("new"));
        assert_eq!(ids(&state), vec!["new", "a", "b"]);
        assert_eq!(state.page.offset, 2);
        assert!(state.has_more);
    }

    #[test]
    fn test_view_states() {
        let mut state = FeedState::default();
        assert_eq!(state.view(), FeedView::Skeleton);

        let t1 = state.begin_load(true);
        assert_eq!(state.view(), FeedView::Skeleton);
        state.apply_page(&t1, page(&[], false, None));
        assert_eq!(state.view(), FeedView::Empty);

        let t2 = state.begin_load(true);
        state.apply_page(&t2, page(&["a"], true, None));
        assert_eq!(state.view(), FeedView::Items);

        let t3 = state.try_begin_load_more().unwrap();
        state.apply_page(&t3, page(&["b"], false, None));
        assert_eq!(state.view(), FeedView::EndOfContent);
    }

    #[test]
    fn test_filter_strings() {
        assert_eq!("video".parse::<MediaType>().unwrap(), MediaType::Video);
        assert_eq!(
            "comments_count".parse::<SortBy>().unwrap(),
            SortBy::CommentsCount
        );
        assert!("newest".parse::<SortBy>().is_err());
        assert_eq!(SortBy::LikesCount.to_string(), "likes_count");
    }
}
