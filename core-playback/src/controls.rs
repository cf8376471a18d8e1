//! # Controls Visibility
//!
//! Show/hide state machine for the transient overlay controls.
//!
//! | From \ Call     | `show`            | `toggle`  | `hide_overlays` | `lock`          | `unlock`              |
//! |-----------------|-------------------|-----------|-----------------|-----------------|-----------------------|
//! | `Hidden`        | `Visible` + timer | `Visible` | `Hidden`        | `VisibleLocked` | -                     |
//! | `Visible`       | timer reset       | `Hidden`  | `Hidden`        | `VisibleLocked` | -                     |
//! | `VisibleLocked` | -                 | -         | `Hidden`        | -               | `Visible` + timer     |
//!
//! The auto-hide timer is owned here. Every transition cancels the previous
//! timer before arming a new one, and a timer checks its generation before
//! hiding, so a firing that races a newer transition is a no-op.

use core_async::sync::watch;
use core_async::time::Duration;
use core_async::DelayedTask;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlsState {
    Hidden,
    /// Shown with the auto-hide timer armed.
    Visible,
    /// Shown while a menu or overlay is open. No timer.
    VisibleLocked,
}

impl ControlsState {
    pub fn is_visible(&self) -> bool {
        !matches!(self, ControlsState::Hidden)
    }
}

#[derive(Debug)]
struct Inner {
    state: ControlsState,
    timer: Option<DelayedTask>,
    generation: u64,
    /// Countdown left when `lock` interrupted a running timer.
    remaining_at_lock: Option<Duration>,
    tx: watch::Sender<ControlsState>,
}

impl Inner {
    fn set(&mut self, state: ControlsState) {
        if self.state != state {
            trace!(from = ?self.state, to = ?state, "Controls transition");
            self.state = state;
            self.tx.send_replace(state);
        }
    }

    fn disarm(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Cloneable handle to the controls state machine.
#[derive(Debug, Clone)]
pub struct ControlsVisibility {
    inner: Arc<Mutex<Inner>>,
    rx: watch::Receiver<ControlsState>,
    timeout: Duration,
}

impl ControlsVisibility {
    /// Starts `Hidden`. Must be used from within a Tokio runtime.
    pub fn new(timeout: Duration) -> Self {
        let (tx, rx) = watch::channel(ControlsState::Hidden);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ControlsState::Hidden,
                timer: None,
                generation: 0,
                remaining_at_lock: None,
                tx,
            })),
            rx,
            timeout,
        }
    }

    pub fn state(&self) -> ControlsState {
        self.inner.lock().state
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlsState> {
        self.rx.clone()
    }

    pub fn show(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            ControlsState::Hidden | ControlsState::Visible => {
                inner.set(ControlsState::Visible);
                self.arm(&mut inner, self.timeout);
            }
            ControlsState::VisibleLocked => {}
        }
    }

    pub fn hide_overlays(&self) {
        let mut inner = self.inner.lock();
        inner.disarm();
        inner.remaining_at_lock = None;
        inner.set(ControlsState::Hidden);
    }

    pub fn toggle(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            ControlsState::Hidden => {
                inner.set(ControlsState::Visible);
                self.arm(&mut inner, self.timeout);
            }
            ControlsState::Visible => {
                inner.disarm();
                inner.set(ControlsState::Hidden);
            }
            ControlsState::VisibleLocked => {}
        }
    }

    pub fn lock(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ControlsState::VisibleLocked {
            return;
        }
        inner.remaining_at_lock = inner
            .timer
            .as_ref()
            .filter(|timer| timer.is_pending())
            .map(DelayedTask::remaining);
        inner.disarm();
        inner.set(ControlsState::VisibleLocked);
    }

    /// Leaves `VisibleLocked`. The countdown resumes where `lock` paused it;
    /// with nothing left, a full timeout is armed.
    pub fn unlock(&self) {
        let mut inner = self.inner.lock();
        if inner.state != ControlsState::VisibleLocked {
            return;
        }
        let delay = inner
            .remaining_at_lock
            .take()
            .filter(|remaining| !remaining.is_zero())
            .unwrap_or(self.timeout);
        inner.set(ControlsState::Visible);
        self.arm(&mut inner, delay);
    }

    /// Activity without a visibility change: restarts the countdown if visible.
    pub fn touch(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ControlsState::Visible {
            self.arm(&mut inner, self.timeout);
        }
    }

    fn arm(&self, inner: &mut Inner, delay: Duration) {
        inner.disarm();
        let generation = inner.generation;
        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        inner.timer = Some(DelayedTask::schedule(delay, move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut inner = shared.lock();
            if inner.generation == generation && inner.state == ControlsState::Visible {
                inner.timer = None;
                inner.set(ControlsState::Hidden);
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_async::time::sleep;

    const TIMEOUT: Duration = Duration::from_secs(3);

    #[tokio::test(start_paused = true)]
    async fn test_auto_hide() {
        let controls = ControlsVisibility::new(TIMEOUT);
        controls.show();
        sleep(Duration::from_millis(2_900)).await;
        assert_eq!(controls.state(), ControlsState::Visible);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(controls.state(), ControlsState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_resets_countdown() {
        let controls = ControlsVisibility::new(TIMEOUT);
        controls.show();
        sleep(Duration::from_secs(2)).await;
        controls.show();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(controls.state(), ControlsState::Visible);
        sleep(Duration::from_millis(1_100)).await;
        assert_eq!(controls.state(), ControlsState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_and_hide() {
        let controls = ControlsVisibility::new(TIMEOUT);
        controls.toggle();
        assert_eq!(controls.state(), ControlsState::Visible);
        controls.toggle();
        assert_eq!(controls.state(), ControlsState::Hidden);

        controls.show();
        controls.hide_overlays();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(controls.state(), ControlsState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_locked_ignores_show_toggle_and_timer() {
        let controls = ControlsVisibility::new(TIMEOUT);
        controls.show();
        controls.lock();
        controls.toggle();
        controls.show();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(controls.state(), ControlsState::VisibleLocked);

        controls.hide_overlays();
        assert_eq!(controls.state(), ControlsState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_resumes_remaining_countdown() {
        let controls = ControlsVisibility::new(TIMEOUT);
        controls.show();
        sleep(Duration::from_secs(2)).await;
        controls.lock();
        sleep(Duration::from_secs(30)).await;
        controls.unlock();
        assert_eq!(controls.state(), ControlsState::Visible);

        sleep(Duration::from_millis(900)).await;
        assert_eq!(controls.state(), ControlsState::Visible);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(controls.state(), ControlsState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_from_hidden_arms_full_timeout() {
        let controls = ControlsVisibility::new(TIMEOUT);
        controls.lock();
        controls.unlock();
        sleep(Duration::from_millis(2_900)).await;
        assert_eq!(controls.state(), ControlsState::Visible);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(controls.state(), ControlsState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_only_refreshes_visible() {
        let controls = ControlsVisibility::new(TIMEOUT);
        controls.touch();
        assert_eq!(controls.state(), ControlsState::Hidden);

        controls.show();
        sleep(Duration::from_secs(2)).await;
        controls.touch();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(controls.state(), ControlsState::Visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_transitions() {
        let controls = ControlsVisibility::new(TIMEOUT);
        let mut rx = controls.subscribe();
        controls.show();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ControlsState::Visible);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ControlsState::Hidden);
    }
}
