//! Coalescing of rapid relative seeks.
//!
//! Relative user seeks that arrive within the coalesce window of each other
//! are summed. Each new seek cancels the pending delayed action and arms a
//! new one, so only one backend seek is issued per burst. The delayed action
//! carries a generation number; the owner applies the sum only if the
//! generation it receives is still the latest.

use core_async::time::Duration;
use core_async::DelayedTask;

use crate::time::TimeDelta;

#[derive(Debug)]
struct PendingSeek {
    delta: TimeDelta,
    _timer: DelayedTask,
}

#[derive(Debug)]
pub struct SeekCoalescer {
    window: Duration,
    generation: u64,
    pending: Option<PendingSeek>,
}

impl SeekCoalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            generation: 0,
            pending: None,
        }
    }

    /// Adds `delta` to the pending sum and restarts the window.
    ///
    /// `on_elapsed` receives the generation to hand back to [`take`](Self::take).
    pub fn push<F>(&mut self, delta: TimeDelta, on_elapsed: F) -> TimeDelta
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let sum = self.pending.take().map_or(delta, |pending| pending.delta + delta);
        self.generation += 1;
        let generation = self.generation;
        let timer = DelayedTask::schedule(self.window, move || on_elapsed(generation));
        self.pending = Some(PendingSeek { delta: sum, _timer: timer });
        sum
    }

    /// Takes the pending sum if `generation` is the latest one.
    pub fn take(&mut self, generation: u64) -> Option<TimeDelta> {
        if generation != self.generation {
            return None;
        }
        self.pending.take().map(|pending| pending.delta)
    }

    /// Drops the pending sum without applying it.
    pub fn discard(&mut self) -> Option<TimeDelta> {
        self.generation += 1;
        self.pending.take().map(|pending| pending.delta)
    }

    pub fn pending_delta(&self) -> Option<TimeDelta> {
        self.pending.as_ref().map(|pending| pending.delta)
    }
}
