use std::collections::HashSet;

use crate::playback_status::{PauseReason, PlaybackStatus};
use crate::story::{Story, UserStoryCollection};

/// How long one story stays on screen
pub const STORY_DURATION_MS: u64 = 5000;
/// Progress timer period
pub const TICK_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("no story collections to play")]
    EmptyRoster,
    #[error("no story collection for author {0}")]
    UnknownAuthor(String),
}

/// Result of a navigation input (tick completion, next, previous)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Moved to another story of the same collection
    Story { index: usize },
    /// Switched to another author's collection
    Collection { author_id: String, index: usize },
    /// Nothing before the first story of the first collection; state unchanged
    Stay,
    /// Ran past the last story of the last collection. The host closes the viewer.
    Close,
}

/// Result of removing the current story
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The collection still has stories; playback continues at `index`
    Continue { story_id: String, index: usize },
    /// The collection is now empty. The host closes the viewer.
    Close { story_id: String },
}

/// Point-in-time view of the machine, for hosts and tests
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub author_id: String,
    pub story_id: Option<String>,
    pub index: usize,
    pub progress: f64,
    pub status: PlaybackStatus,
    pub segments: Vec<f64>,
    pub closed: bool,
}

/// Story autoplay state machine.
///
/// Walks a roster of per-author collections story by story. Holds no clock
/// and does no I/O: the caller feeds ticks and inputs and acts on the
/// returned [`Transition`]s and pending view marks.
pub struct StoryPlayback {
    roster: Vec<UserStoryCollection>,
    collection: usize,
    index: usize,
    progress: f64,
    held: bool,
    input_focused: bool,
    closed: bool,
    viewer_id: Option<String>,
    story_duration_ms: u64,
    marked: HashSet<String>,
    pending_view_mark: Option<String>,
}

impl StoryPlayback {
    /// Start at the first story of `start_author`'s collection.
    ///
    /// The roster is copied and normalized; collections that end up empty are skipped.
    pub fn new(
        roster: Vec<UserStoryCollection>,
        start_author: &str,
        viewer_id: Option<String>,
    ) -> Result<Self, PlaybackError> {
        let roster: Vec<UserStoryCollection> = roster
            .into_iter()
            .filter_map(UserStoryCollection::normalize)
            .collect();
        if roster.is_empty() {
            return Err(PlaybackError::EmptyRoster);
        }

        let collection = position_of(&roster, start_author)
            .ok_or_else(|| PlaybackError::UnknownAuthor(start_author.to_string()))?;

        let mut playback = Self {
            roster,
            collection,
            index: 0,
            progress: 0.0,
            held: false,
            input_focused: false,
            closed: false,
            viewer_id,
            story_duration_ms: STORY_DURATION_MS,
            marked: HashSet::new(),
            pending_view_mark: None,
        };
        playback.enter_story();
        Ok(playback)
    }

    pub fn with_story_duration(mut self, duration_ms: u64) -> Self {
        self.story_duration_ms = duration_ms.max(1);
        self
    }

    /// Jump to `author_id`'s collection at `index` (clamped to its last story).
    /// An unknown author leaves the state untouched.
    pub fn open(&mut self, author_id: &str, index: usize) -> Result<Transition, PlaybackError> {
        let collection = position_of(&self.roster, author_id)
            .ok_or_else(|| PlaybackError::UnknownAuthor(author_id.to_string()))?;

        self.collection = collection;
        self.index = index.min(self.roster[collection].last_index());
        self.closed = false;
        self.enter_story();
        Ok(Transition::Collection {
            author_id: author_id.to_string(),
            index: self.index,
        })
    }

    /// Advance the progress bar by `elapsed_ms`. Completing the story advances.
    /// Does nothing while paused or closed.
    pub fn tick(&mut self, elapsed_ms: u64) -> Option<Transition> {
        if self.closed || self.is_paused() {
            return None;
        }

        let step = elapsed_ms as f64 * 100.0 / self.story_duration_ms as f64;
        self.progress = (self.progress + step).min(100.0);

        if self.progress >= 100.0 {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Next story, else next collection, else close
    pub fn advance(&mut self) -> Transition {
        if self.closed {
            return Transition::Close;
        }

        if self.index < self.current_collection().last_index() {
            self.index += 1;
            self.enter_story();
            return Transition::Story { index: self.index };
        }

        if self.collection + 1 < self.roster.len() {
            self.collection += 1;
            self.index = 0;
            self.enter_story();
            return Transition::Collection {
                author_id: self.current_collection().author_id.clone(),
                index: 0,
            };
        }

        self.closed = true;
        Transition::Close
    }

    /// Previous story, else the previous collection's last story, else stay
    pub fn retreat(&mut self) -> Transition {
        if self.closed {
            return Transition::Stay;
        }

        if self.index > 0 {
            self.index -= 1;
            self.enter_story();
            return Transition::Story { index: self.index };
        }

        if self.collection > 0 {
            self.collection -= 1;
            self.index = self.current_collection().last_index();
            self.enter_story();
            return Transition::Collection {
                author_id: self.current_collection().author_id.clone(),
                index: self.index,
            };
        }

        Transition::Stay
    }

    pub fn pause(&mut self, reason: PauseReason) {
        match reason {
            PauseReason::Hold => self.held = true,
            PauseReason::InputFocus => self.input_focused = true,
        }
    }

    pub fn resume(&mut self, reason: PauseReason) {
        match reason {
            PauseReason::Hold => self.held = false,
            PauseReason::InputFocus => self.input_focused = false,
        }
    }

    /// Remove the current story after the backend accepted the delete.
    pub fn remove_current_story(&mut self) -> Option<DeleteOutcome> {
        if self.closed {
            return None;
        }

        let collection = &mut self.roster[self.collection];
        if self.index >= collection.stories.len() {
            return None;
        }
        let story = collection.stories.remove(self.index);

        if collection.stories.is_empty() {
            // Emptied collections leave the roster so navigation never lands on them.
            // A lone collection stays as a placeholder; `open` skips it.
            if self.roster.len() > 1 {
                self.roster.remove(self.collection);
                self.collection = self.collection.min(self.roster.len() - 1);
            }
            self.index = 0;
            self.closed = true;
            self.progress = 0.0;
            self.pending_view_mark = None;
            return Some(DeleteOutcome::Close { story_id: story.id });
        }

        if self.index > collection.last_index() {
            self.index = collection.last_index();
        }
        self.enter_story();
        Some(DeleteOutcome::Continue {
            story_id: story.id,
            index: self.index,
        })
    }

    /// Story id that still needs a "viewed" mark, at most once per story
    pub fn take_view_mark(&mut self) -> Option<String> {
        self.pending_view_mark.take()
    }

    pub fn is_paused(&self) -> bool {
        self.held || self.input_focused
    }

    pub fn status(&self) -> PlaybackStatus {
        if self.is_paused() {
            PlaybackStatus::Paused
        } else {
            PlaybackStatus::Playing
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn current_collection(&self) -> &UserStoryCollection {
        &self.roster[self.collection]
    }

    pub fn current_story(&self) -> Option<&Story> {
        self.current_collection().stories.get(self.index)
    }

    pub fn roster(&self) -> &[UserStoryCollection] {
        &self.roster
    }

    /// Whether the viewer authored the current collection
    pub fn is_own_collection(&self) -> bool {
        self.viewer_id.as_deref() == Some(self.current_collection().author_id.as_str())
    }

    pub fn can_go_previous(&self) -> bool {
        self.index > 0 || self.collection > 0
    }

    pub fn can_go_next(&self) -> bool {
        self.index < self.current_collection().last_index() || self.collection + 1 < self.roster.len()
    }

    /// Fill of one progress bar segment: earlier stories full, the current one
    /// live, later ones empty
    pub fn segment_fill(&self, index: usize) -> f64 {
        if index < self.index {
            100.0
        } else if index == self.index {
            self.progress
        } else {
            0.0
        }
    }

    pub fn segments(&self) -> Vec<f64> {
        (0..self.current_collection().stories.len())
            .map(|i| self.segment_fill(i))
            .collect()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            author_id: self.current_collection().author_id.clone(),
            story_id: self.current_story().map(|s| s.id.clone()),
            index: self.index,
            progress: self.progress,
            status: self.status(),
            segments: self.segments(),
            closed: self.closed,
        }
    }

    fn enter_story(&mut self) {
        self.progress = 0.0;
        self.pending_view_mark = None;
        if self.is_own_collection() {
            return;
        }
        if let Some(story) = self.current_story() {
            let id = story.id.clone();
            if self.marked.insert(id.clone()) {
                self.pending_view_mark = Some(id);
            }
        }
    }
}

fn position_of(roster: &[UserStoryCollection], author_id: &str) -> Option<usize> {
    roster
        .iter()
        .position(|c| c.author_id == author_id && !c.stories.is_empty())
}
