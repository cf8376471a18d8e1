//! Cancellable scheduled actions.
//!
//! A [`DelayedTask`] runs a closure once after a delay unless it is cancelled
//! first. Dropping the handle cancels it, so an owner that stores the handle in
//! an `Option` and replaces it gets "cancel previous, arm new" for free.
//!
//! Cancellation is cooperative: once the delay has elapsed and the action has
//! started it runs to completion. Owners that need to reject a late firing
//! (state changed between expiry and execution) pair the task with a
//! generation counter.
//!
//! # Examples
//!
//! ```rust
//! use core_async::delay::DelayedTask;
//! use core_async::time::Duration;
//!
//! async fn example() {
//!     let mut pending = Some(DelayedTask::schedule(Duration::from_millis(250), || {
//!         println!("fired");
//!     }));
//!
//!     // A newer request supersedes the previous one.
//!     pending = Some(DelayedTask::schedule(Duration::from_millis(250), || {
//!         println!("replacement fired");
//!     }));
//!     # drop(pending);
//! }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::time::{sleep_until, Duration, Instant};

/// Handle to an action scheduled to run once after a delay.
#[derive(Debug)]
pub struct DelayedTask {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
    deadline: Instant,
}

impl DelayedTask {
    /// Schedules `action` to run after `delay` on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime context.
    pub fn schedule<F>(delay: Duration, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::schedule_async(delay, async move { action() })
    }

    /// Schedules a future to be polled after `delay`.
    ///
    /// The future is not polled at all if the task is cancelled before the
    /// deadline.
    pub fn schedule_async<Fut>(delay: Duration, action: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + delay;

        let child = token.clone();
        let flag = Arc::clone(&fired);
        crate::task::spawn(async move {
            tokio::select! {
                biased;
                _ = child.cancelled() => {
                    tracing::trace!("delayed task cancelled before deadline");
                }
                _ = sleep_until(deadline) => {
                    flag.store(true, Ordering::SeqCst);
                    action.await;
                }
            }
        });

        Self {
            token,
            fired,
            deadline,
        }
    }

    /// Cancels the task. Has no effect if the action already started.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called or the handle dropped.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns `true` once the deadline elapsed and the action was started.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Returns `true` while the action is still waiting for its deadline.
    pub fn is_pending(&self) -> bool {
        !self.is_cancelled() && !self.has_fired()
    }

    /// Instant at which the action is due.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (count, action) = counter();
        let task = DelayedTask::schedule(Duration::from_millis(100), action);

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(task.is_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(task.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (count, action) = counter();
        let task = DelayedTask::schedule(Duration::from_millis(100), action);
        task.cancel();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!task.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_handle_cancels_previous() {
        let (count, first) = counter();
        let mut slot = Some(DelayedTask::schedule(Duration::from_millis(100), first));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let second_count = Arc::clone(&count);
        slot = Some(DelayedTask::schedule(Duration::from_millis(100), move || {
            second_count.fetch_add(10, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 10);
        drop(slot);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let task = DelayedTask::schedule(Duration::from_secs(3), || {});
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(task.remaining(), Duration::from_secs(2));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(task.remaining(), Duration::ZERO);
    }
}
