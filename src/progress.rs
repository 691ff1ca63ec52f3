//! Batch progress observation over a set of in-flight or resolved loads.

use crate::views::AsyncResourceView;

/// A point-in-time snapshot of how many of a batch's loads are waiting,
/// done, or failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Status {
    pub total: usize,
    pub waiting: usize,
    pub done: usize,
    pub failed: usize,
    pub waiting_ratio: f64,
    pub done_ratio: f64,
    pub failed_ratio: f64,
}

fn to_ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    if count == total {
        return 1.0;
    }
    count as f64 / total as f64
}

/// Tracks a fixed batch of [`AsyncResourceView`]s and reports aggregate
/// progress on demand. Polling never blocks.
pub struct ProgressTracker<R> {
    views: Vec<AsyncResourceView<R>>,
}

impl<R> ProgressTracker<R> {
    pub fn new(views: Vec<AsyncResourceView<R>>) -> Self {
        Self { views }
    }

    pub fn total(&self) -> usize {
        self.views.len()
    }

    /// Polls every handle and computes the current status. O(n) in the
    /// batch size; cheap enough to call in a loop.
    pub fn status(&self) -> Status {
        let total = self.views.len();
        let mut done = 0;
        let mut failed = 0;

        for view in &self.views {
            match view.handle.poll() {
                None => {}
                Some(Ok(_)) => done += 1,
                Some(Err(_)) => failed += 1,
            }
        }

        let waiting = total - done - failed;

        Status {
            total,
            waiting,
            done,
            failed,
            waiting_ratio: to_ratio(waiting, total),
            done_ratio: to_ratio(done, total),
            failed_ratio: to_ratio(failed, total),
        }
    }
}
