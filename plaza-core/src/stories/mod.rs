mod bar;
pub mod player;
pub mod progress;
pub use bar::StoriesBar;
pub use player::{PlayerSettings, StoryPlayer, StoryPlayerHandle};
pub use progress::StoryProgress;
