mod controller;
pub mod scroll;
pub use controller::FeedController;
pub use scroll::{InfiniteScroll, InfiniteScrollHandle, LoadMoreTarget, ScrollMetrics};
