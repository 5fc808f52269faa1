use crate::api::StoriesApi;
use crate::config::Config;
use crate::stories::progress::StoryProgress;
use plaza_common::story_playback::{STORY_DURATION_MS, TICK_INTERVAL_MS};
use plaza_common::{
    DeleteOutcome, PauseReason, PlaybackError, PlaybackSnapshot, StoryPlayback, Transition,
    UserStoryCollection,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Timing of the story autoplay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSettings {
    pub story_duration: Duration,
    pub tick: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            story_duration: Duration::from_millis(STORY_DURATION_MS),
            tick: Duration::from_millis(TICK_INTERVAL_MS),
        }
    }
}

impl From<&Config> for PlayerSettings {
    fn from(config: &Config) -> Self {
        Self {
            story_duration: Duration::from_millis(config.story_duration_ms),
            tick: config.story_tick(),
        }
    }
}

/// Commands sent to the player task
#[derive(Debug)]
enum StoryCommand {
    Next,
    Previous,
    Pause(PauseReason),
    Resume(PauseReason),
    Open { author_id: String, index: usize },
    DeleteCurrent,
    LoadViewers,
    Reply(String),
    Snapshot(oneshot::Sender<PlaybackSnapshot>),
    Close,
}

/// Handle to a running story player
#[derive(Clone)]
pub struct StoryPlayerHandle {
    command_tx: mpsc::UnboundedSender<StoryCommand>,
}

impl StoryPlayerHandle {
    pub fn next(&self) {
        let _ = self.command_tx.send(StoryCommand::Next);
    }

    pub fn previous(&self) {
        let _ = self.command_tx.send(StoryCommand::Previous);
    }

    pub fn pause(&self, reason: PauseReason) {
        let _ = self.command_tx.send(StoryCommand::Pause(reason));
    }

    pub fn resume(&self, reason: PauseReason) {
        let _ = self.command_tx.send(StoryCommand::Resume(reason));
    }

    /// Jump to another author's collection
    pub fn open(&self, author_id: impl Into<String>, index: usize) {
        let _ = self.command_tx.send(StoryCommand::Open {
            author_id: author_id.into(),
            index,
        });
    }

    /// Delete the story on screen. Only honoured for the viewer's own stories.
    pub fn delete_current(&self) {
        let _ = self.command_tx.send(StoryCommand::DeleteCurrent);
    }

    pub fn load_viewers(&self) {
        let _ = self.command_tx.send(StoryCommand::LoadViewers);
    }

    pub fn reply(&self, content: impl Into<String>) {
        let _ = self.command_tx.send(StoryCommand::Reply(content.into()));
    }

    /// Current state, or `None` once the player has stopped
    pub async fn snapshot(&self) -> Option<PlaybackSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.command_tx.send(StoryCommand::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    pub fn close(&self) {
        let _ = self.command_tx.send(StoryCommand::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

enum Flow {
    Continue,
    /// A new story is on screen; restart the tick timer
    Restart,
    Exit,
}

/// Story viewer service: owns the playback machine, the tick timer, and the
/// backend side effects of viewing stories.
pub struct StoryPlayer {
    playback: StoryPlayback,
    api: Arc<dyn StoriesApi>,
    command_rx: mpsc::UnboundedReceiver<StoryCommand>,
    progress_tx: mpsc::UnboundedSender<StoryProgress>,
    tick: Duration,
}

impl StoryPlayer {
    /// Spawn a player starting at `start_author`'s first story.
    ///
    /// The roster is copied; the caller's roster only changes when it reacts to
    /// [`StoryProgress::StoryDeleted`].
    pub fn start(
        roster: Vec<UserStoryCollection>,
        start_author: &str,
        viewer_id: Option<String>,
        api: Arc<dyn StoriesApi>,
        settings: PlayerSettings,
    ) -> Result<(StoryPlayerHandle, mpsc::UnboundedReceiver<StoryProgress>), PlaybackError> {
        let duration_ms = u64::try_from(settings.story_duration.as_millis()).unwrap_or(u64::MAX);
        let playback =
            StoryPlayback::new(roster, start_author, viewer_id)?.with_story_duration(duration_ms);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let player = StoryPlayer {
            playback,
            api,
            command_rx,
            progress_tx,
            tick: settings.tick.max(Duration::from_millis(1)),
        };
        tokio::spawn(player.run());
        Ok((StoryPlayerHandle { command_tx }, progress_rx))
    }

    async fn run(mut self) {
        info!(
            "StoryPlayer started at {}",
            self.playback.current_collection().author_id
        );
        self.emit_story_changed();
        self.flush_view_mark();

        let mut ticker = new_ticker(self.tick);
        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        debug!("All player handles dropped");
                        break;
                    };
                    match self.handle_command(command).await {
                        Flow::Continue => {}
                        Flow::Restart => ticker.reset(),
                        Flow::Exit => break,
                    }
                }
                _ = ticker.tick() => {
                    match self.on_tick() {
                        Flow::Continue => {}
                        Flow::Restart => ticker.reset(),
                        Flow::Exit => break,
                    }
                }
            }
        }

        info!("StoryPlayer closed");
        self.emit(StoryProgress::Closed);
    }

    fn on_tick(&mut self) -> Flow {
        let elapsed_ms = u64::try_from(self.tick.as_millis()).unwrap_or(u64::MAX);
        match self.playback.tick(elapsed_ms) {
            Some(transition) => self.on_transition(transition),
            None => {
                if !self.playback.is_paused() {
                    if let Some(story) = self.playback.current_story() {
                        let story_id = story.id.clone();
                        self.emit(StoryProgress::Progress {
                            story_id,
                            progress: self.playback.progress(),
                        });
                    }
                }
                Flow::Continue
            }
        }
    }

    async fn handle_command(&mut self, command: StoryCommand) -> Flow {
        match command {
            StoryCommand::Next => {
                let transition = self.playback.advance();
                self.on_transition(transition)
            }
            StoryCommand::Previous => {
                let transition = self.playback.retreat();
                self.on_transition(transition)
            }
            StoryCommand::Pause(reason) => {
                let was_paused = self.playback.is_paused();
                self.playback.pause(reason);
                if !was_paused {
                    debug!("Story paused ({:?})", reason);
                    self.emit_status();
                }
                Flow::Continue
            }
            StoryCommand::Resume(reason) => {
                let was_paused = self.playback.is_paused();
                self.playback.resume(reason);
                if was_paused && !self.playback.is_paused() {
                    debug!("Story resumed");
                    self.emit_status();
                    return Flow::Restart;
                }
                Flow::Continue
            }
            StoryCommand::Open { author_id, index } => match self.playback.open(&author_id, index) {
                Ok(transition) => self.on_transition(transition),
                Err(e) => {
                    warn!("Cannot open stories: {}", e);
                    Flow::Continue
                }
            },
            StoryCommand::DeleteCurrent => self.delete_current().await,
            StoryCommand::LoadViewers => {
                self.load_viewers();
                Flow::Continue
            }
            StoryCommand::Reply(content) => {
                self.reply(content);
                Flow::Continue
            }
            StoryCommand::Snapshot(reply) => {
                let _ = reply.send(self.playback.snapshot());
                Flow::Continue
            }
            StoryCommand::Close => Flow::Exit,
        }
    }

    fn on_transition(&mut self, transition: Transition) -> Flow {
        match transition {
            Transition::Stay => return Flow::Continue,
            Transition::Close => return Flow::Exit,
            Transition::Story { .. } => {}
            Transition::Collection { author_id, index } => {
                info!("Switched to {}'s stories", author_id);
                self.emit(StoryProgress::CollectionChanged { author_id, index });
            }
        }
        self.emit_story_changed();
        self.flush_view_mark();
        Flow::Restart
    }

    /// Delete is awaited inline: no ticks or inputs are processed until the
    /// backend answers.
    async fn delete_current(&mut self) -> Flow {
        let Some(story_id) = self.playback.current_story().map(|s| s.id.clone()) else {
            return Flow::Continue;
        };
        if !self.playback.is_own_collection() {
            warn!("Refusing to delete story {} owned by someone else", story_id);
            self.emit(StoryProgress::DeleteFailed {
                story_id,
                message: "only the author can delete a story".to_string(),
            });
            return Flow::Continue;
        }

        if let Err(e) = self.api.delete_story(&story_id).await {
            warn!("Failed to delete story {}: {}", story_id, e);
            self.emit(StoryProgress::DeleteFailed {
                story_id,
                message: e.to_string(),
            });
            return Flow::Continue;
        }

        let author_id = self.playback.current_collection().author_id.clone();
        match self.playback.remove_current_story() {
            Some(DeleteOutcome::Continue { story_id, .. }) => {
                info!("Deleted story {}", story_id);
                self.emit(StoryProgress::StoryDeleted {
                    author_id,
                    story_id,
                });
                self.emit_story_changed();
                self.flush_view_mark();
                Flow::Restart
            }
            Some(DeleteOutcome::Close { story_id }) => {
                info!("Deleted last story {}", story_id);
                self.emit(StoryProgress::StoryDeleted {
                    author_id,
                    story_id,
                });
                Flow::Exit
            }
            None => Flow::Continue,
        }
    }

    fn load_viewers(&self) {
        let Some(story_id) = self.playback.current_story().map(|s| s.id.clone()) else {
            return;
        };
        if !self.playback.is_own_collection() {
            debug!("Viewer list is only available to the author");
            return;
        }

        let api = self.api.clone();
        let progress_tx = self.progress_tx.clone();
        tokio::spawn(async move {
            let event = match api.story_viewers(&story_id).await {
                Ok(viewers) => StoryProgress::ViewersLoaded { story_id, viewers },
                Err(e) => {
                    warn!("Failed to load viewers of {}: {}", story_id, e);
                    StoryProgress::ViewersFailed {
                        story_id,
                        message: e.to_string(),
                    }
                }
            };
            let _ = progress_tx.send(event);
        });
    }

    fn reply(&self, content: String) {
        let content = content.trim().to_string();
        if content.is_empty() {
            return;
        }
        let Some(story_id) = self.playback.current_story().map(|s| s.id.clone()) else {
            return;
        };
        if self.playback.is_own_collection() {
            debug!("Ignoring reply to own story {}", story_id);
            return;
        }

        let recipient_id = self.playback.current_collection().author_id.clone();
        let api = self.api.clone();
        let progress_tx = self.progress_tx.clone();
        tokio::spawn(async move {
            let event = match api.reply_to_story(&recipient_id, &story_id, &content).await {
                Ok(()) => StoryProgress::ReplySent { story_id },
                Err(e) => {
                    warn!("Failed to reply to story {}: {}", story_id, e);
                    StoryProgress::ReplyFailed {
                        story_id,
                        message: e.to_string(),
                    }
                }
            };
            let _ = progress_tx.send(event);
        });
    }

    /// Fire the pending "viewed" mark, if any. Failures are only logged.
    fn flush_view_mark(&mut self) {
        let Some(story_id) = self.playback.take_view_mark() else {
            return;
        };
        let api = self.api.clone();
        tokio::spawn(async move {
            match api.mark_viewed(&story_id).await {
                Ok(()) => debug!("Marked story {} viewed", story_id),
                Err(e) => warn!("Failed to mark story {} viewed: {}", story_id, e),
            }
        });
    }

    fn emit_story_changed(&self) {
        if let Some(story) = self.playback.current_story() {
            self.emit(StoryProgress::StoryChanged {
                author_id: story.author_id.clone(),
                story_id: story.id.clone(),
                index: self.playback.current_index(),
            });
        }
    }

    fn emit_status(&self) {
        self.emit(StoryProgress::StatusChanged {
            status: self.playback.status(),
        });
    }

    fn emit(&self, event: StoryProgress) {
        let _ = self.progress_tx.send(event);
    }
}

/// First tick one period from now; a late tick does not trigger a burst
fn new_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
