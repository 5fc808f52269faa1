use plaza_common::{PlaybackStatus, StoryViewer};

/// Events emitted by the story player
#[derive(Debug, Clone, PartialEq)]
pub enum StoryProgress {
    /// A new story is on screen; progress restarts at 0
    StoryChanged {
        author_id: String,
        story_id: String,
        index: usize,
    },
    /// Playback moved to another author's collection
    CollectionChanged { author_id: String, index: usize },
    Progress { story_id: String, progress: f64 },
    StatusChanged { status: PlaybackStatus },
    /// The backend deleted the story. Hosts drop it from their own roster.
    StoryDeleted { author_id: String, story_id: String },
    DeleteFailed { story_id: String, message: String },
    ViewersLoaded {
        story_id: String,
        viewers: Vec<StoryViewer>,
    },
    ViewersFailed { story_id: String, message: String },
    ReplySent { story_id: String },
    ReplyFailed { story_id: String, message: String },
    /// Terminal event; the player task has stopped
    Closed,
}
