/// Story playback status as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
}

#[allow(clippy::derivable_impls)]
impl Default for PlaybackStatus {
    fn default() -> Self {
        PlaybackStatus::Playing
    }
}

/// Why the viewer paused playback. Playback only resumes once every reason is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Press-and-hold on the story
    Hold,
    /// The reply input has focus
    InputFocus,
}
