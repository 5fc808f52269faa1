use crate::feed::FeedController;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Sentinel distance (px) from the bottom at which the next page is requested
pub const DEFAULT_THRESHOLD_PX: u32 = 200;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Geometry of the scroll container at the time of a scroll event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollMetrics {
    pub scroll_top: u32,
    pub scroll_height: u32,
    pub client_height: u32,
}

impl ScrollMetrics {
    pub fn distance_from_bottom(&self) -> u32 {
        self.scroll_height
            .saturating_sub(self.scroll_top.saturating_add(self.client_height))
    }
}

/// Anything that can fetch a further page
#[async_trait]
pub trait LoadMoreTarget: Send + Sync {
    fn has_more(&self) -> bool;

    async fn load_more(&self);
}

#[async_trait]
impl LoadMoreTarget for FeedController {
    fn has_more(&self) -> bool {
        FeedController::has_more(self)
    }

    async fn load_more(&self) {
        FeedController::load_more(self).await
    }
}

enum ScrollSignal {
    Scroll(ScrollMetrics),
    Detach,
}

/// Feeds scroll events to the observer task. Clones share the task; the task
/// stops on `detach` or once every handle is dropped.
#[derive(Clone)]
pub struct InfiniteScrollHandle {
    signal_tx: mpsc::UnboundedSender<ScrollSignal>,
    is_fetching: Arc<AtomicBool>,
}

impl InfiniteScrollHandle {
    /// Report the container geometry. Dropped while a fetch is running.
    pub fn on_scroll(&self, metrics: ScrollMetrics) {
        if self.is_fetching() {
            trace!("Scroll signal dropped: fetch in flight");
            return;
        }
        let _ = self.signal_tx.send(ScrollSignal::Scroll(metrics));
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching.load(Ordering::Acquire)
    }

    pub fn detach(&self) {
        let _ = self.signal_tx.send(ScrollSignal::Detach);
    }

    pub fn is_detached(&self) -> bool {
        self.signal_tx.is_closed()
    }
}

/// Observer task deciding when to call `load_more`
pub struct InfiniteScroll {
    target: Arc<dyn LoadMoreTarget>,
    threshold_px: u32,
    debounce: Duration,
    signal_rx: mpsc::UnboundedReceiver<ScrollSignal>,
    is_fetching: Arc<AtomicBool>,
}

/// Clears the fetching flag when the load settles, even if it unwinds
struct FetchGuard(Arc<AtomicBool>);

impl Drop for FetchGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl InfiniteScroll {
    /// Spawn the observer on the current runtime
    pub fn attach(
        target: Arc<dyn LoadMoreTarget>,
        threshold_px: u32,
        debounce: Duration,
    ) -> InfiniteScrollHandle {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let is_fetching = Arc::new(AtomicBool::new(false));
        let observer = InfiniteScroll {
            target,
            threshold_px,
            debounce,
            signal_rx,
            is_fetching: is_fetching.clone(),
        };
        tokio::spawn(observer.run());
        InfiniteScrollHandle {
            signal_tx,
            is_fetching,
        }
    }

    async fn run(mut self) {
        debug!(
            "Infinite scroll attached (threshold={}px, debounce={:?})",
            self.threshold_px, self.debounce
        );
        while let Some(signal) = self.signal_rx.recv().await {
            let ScrollSignal::Scroll(first) = signal else {
                break;
            };
            match self.settle(first).await {
                Some(latest) => self.evaluate(latest),
                None => break,
            }
        }
        debug!("Infinite scroll detached");
    }

    /// Trailing-edge debounce: wait until no signal arrived for `debounce`,
    /// then return the last one. `None` means detach.
    async fn settle(&mut self, mut latest: ScrollMetrics) -> Option<ScrollMetrics> {
        let debounce = self.debounce;
        let quiet = tokio::time::sleep(debounce);
        tokio::pin!(quiet);
        loop {
            tokio::select! {
                signal = self.signal_rx.recv() => match signal {
                    Some(ScrollSignal::Scroll(metrics)) => {
                        latest = metrics;
                        quiet.as_mut().reset(Instant::now() + debounce);
                    }
                    Some(ScrollSignal::Detach) | None => return None,
                },
                _ = &mut quiet => return Some(latest),
            }
        }
    }

    fn evaluate(&self, metrics: ScrollMetrics) {
        let distance = metrics.distance_from_bottom();
        if distance > self.threshold_px {
            return;
        }
        if !self.target.has_more() {
            trace!("Near bottom but nothing more to load");
            return;
        }
        if self.is_fetching.swap(true, Ordering::AcqRel) {
            trace!("Fetch already in flight");
            return;
        }

        debug!("Sentinel visible ({}px from bottom), loading more", distance);
        let target = self.target.clone();
        let guard = FetchGuard(self.is_fetching.clone());
        tokio::spawn(async move {
            let _guard = guard;
            target.load_more().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_saturates() {
        let m = ScrollMetrics {
            scroll_top: 900,
            scroll_height: 1000,
            client_height: 300,
        };
        assert_eq!(m.distance_from_bottom(), 0);

        let m = ScrollMetrics {
            scroll_top: 100,
            scroll_height: 1000,
            client_height: 300,
        };
        assert_eq!(m.distance_from_bottom(), 600);
    }
}
