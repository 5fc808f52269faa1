pub mod feed_state;
pub mod identity;
pub mod playback_status;
pub mod post;
pub mod story;
pub mod story_playback;

pub use feed_state::{
    FeedFilters, FeedState, FeedView, FilterPatch, MediaType, Page, PageQuery, PageTicket, SortBy,
    SortOrder,
};
pub use identity::MissingIdentity;
pub use playback_status::{PauseReason, PlaybackStatus};
pub use post::{FeedPage, Post, PostPatch, PostStats};
pub use story::{Story, StoryMediaType, StoryViewer, UserStoryCollection};
pub use story_playback::{DeleteOutcome, PlaybackError, PlaybackSnapshot, StoryPlayback, Transition};
