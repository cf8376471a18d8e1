//! # Gesture Router
//!
//! Splits the video surface into three equal zones and tells single taps from
//! double taps in each of them.
//!
//! | Zone      | Single tap                                  | Double tap            |
//! |-----------|---------------------------------------------|-----------------------|
//! | `Rewind`  | hide overlays if locked open, else toggle   | seek back one step    |
//! | `Center`  | same                                        | toggle play/pause     |
//! | `Forward` | same                                        | seek forward one step |
//!
//! A first tap arms a delayed single-tap action for the sensitivity window. A
//! second tap in the same zone before it fires cancels it and runs the
//! double-tap action instead. Both sides race for one claim flag, so exactly
//! one of the two actions runs. Zones are independent.

use core_async::time::Duration;
use core_async::DelayedTask;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

use crate::controls::{ControlsState, ControlsVisibility};
use crate::time::{SeekOrigin, SeekRequest, TimeDelta};

/// Commands the gesture router issues. Implemented by the player handle.
pub trait TransportControl: Send + Sync {
    fn seek(&self, request: SeekRequest);

    fn toggle_play(&self);

    /// Distance of one rewind/forward step.
    fn seek_step(&self) -> TimeDelta;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapZone {
    Rewind,
    Center,
    Forward,
}

impl TapZone {
    /// Zone for a tap at `x` on a surface `width` wide. Out-of-range positions
    /// land in the nearest edge zone.
    pub fn from_position(x: f64, width: f64) -> TapZone {
        if !(width > 0.0) || x.is_nan() {
            return TapZone::Center;
        }
        let third = width / 3.0;
        if x < third {
            TapZone::Rewind
        } else if x < third * 2.0 {
            TapZone::Center
        } else {
            TapZone::Forward
        }
    }

    fn index(&self) -> usize {
        match self {
            TapZone::Rewind => 0,
            TapZone::Center => 1,
            TapZone::Forward => 2,
        }
    }
}

/// How a tap was classified when it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// First tap of a possible double tap; the single-tap action is pending.
    Pending,
    /// Second tap inside the window; the double-tap action ran.
    Double,
}

#[derive(Debug)]
struct PendingTap {
    claimed: Arc<AtomicBool>,
    _timer: DelayedTask,
}

pub struct GestureRouter {
    controls: ControlsVisibility,
    transport: Arc<dyn TransportControl>,
    sensitivity: Duration,
    zones: Mutex<[Option<PendingTap>; 3]>,
}

impl GestureRouter {
    pub fn new(
        controls: ControlsVisibility,
        transport: Arc<dyn TransportControl>,
        sensitivity: Duration,
    ) -> Self {
        Self {
            controls,
            transport,
            sensitivity,
            zones: Mutex::new([None, None, None]),
        }
    }

    /// Routes a tap at `x` on a surface `width` wide.
    pub fn tap(&self, x: f64, width: f64) -> TapOutcome {
        self.tap_zone(TapZone::from_position(x, width))
    }

    pub fn tap_zone(&self, zone: TapZone) -> TapOutcome {
        self.controls.touch();

        let mut zones = self.zones.lock();
        let slot = &mut zones[zone.index()];

        if let Some(previous) = slot.take() {
            if !previous.claimed.swap(true, Ordering::SeqCst) {
                drop(zones);
                trace!(?zone, "Double tap");
                self.double_tap(zone);
                return TapOutcome::Double;
            }
        }

        let claimed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&claimed);
        let controls = self.controls.clone();
        let timer = DelayedTask::schedule(self.sensitivity, move || {
            if !flag.swap(true, Ordering::SeqCst) {
                trace!(?zone, "Single tap");
                single_tap(&controls);
            }
        });
        *slot = Some(PendingTap {
            claimed,
            _timer: timer,
        });
        TapOutcome::Pending
    }

    fn double_tap(&self, zone: TapZone) {
        let step = self.transport.seek_step();
        match zone {
            TapZone::Rewind => self
                .transport
                .seek(SeekRequest::relative(-step, SeekOrigin::UserInteracted)),
            TapZone::Center => self.transport.toggle_play(),
            TapZone::Forward => self
                .transport
                .seek(SeekRequest::relative(step, SeekOrigin::UserInteracted)),
        }
    }
}

fn single_tap(controls: &ControlsVisibility) {
    if controls.state() == ControlsState::VisibleLocked {
        controls.hide_overlays();
    } else {
        controls.toggle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_async::time::sleep;

    #[derive(Default)]
    struct RecordingTransport {
        seeks: Mutex<Vec<SeekRequest>>,
        toggles: Mutex<usize>,
    }

    impl TransportControl for RecordingTransport {
        fn seek(&self, request: SeekRequest) {
            self.seeks.lock().push(request);
        }

        fn toggle_play(&self) {
            *self.toggles.lock() += 1;
        }

        fn seek_step(&self) -> TimeDelta {
            TimeDelta::from_secs(10)
        }
    }

    fn router() -> (GestureRouter, Arc<RecordingTransport>, ControlsVisibility) {
        let transport = Arc::new(RecordingTransport::default());
        let controls = ControlsVisibility::new(Duration::from_secs(3));
        let router = GestureRouter::new(
            controls.clone(),
            transport.clone(),
            Duration::from_millis(200),
        );
        (router, transport, controls)
    }

    #[test]
    fn test_zones() {
        assert_eq!(TapZone::from_position(10.0, 300.0), TapZone::Rewind);
        assert_eq!(TapZone::from_position(150.0, 300.0), TapZone::Center);
        assert_eq!(TapZone::from_position(299.0, 300.0), TapZone::Forward);
        assert_eq!(TapZone::from_position(-5.0, 300.0), TapZone::Rewind);
        assert_eq!(TapZone::from_position(500.0, 300.0), TapZone::Forward);
        assert_eq!(TapZone::from_position(10.0, 0.0), TapZone::Center);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_tap_toggles_controls_after_window() {
        let (router, transport, controls) = router();
        assert_eq!(router.tap(150.0, 300.0), TapOutcome::Pending);
        assert_eq!(controls.state(), ControlsState::Hidden);

        sleep(Duration::from_millis(250)).await;
        assert_eq!(controls.state(), ControlsState::Visible);
        assert_eq!(*transport.toggles.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_tap_cancels_single() {
        let (router, transport, controls) = router();
        router.tap(10.0, 300.0);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(router.tap(20.0, 300.0), TapOutcome::Double);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(controls.state(), ControlsState::Hidden);
        assert_eq!(
            *transport.seeks.lock(),
            vec![SeekRequest::relative(
                TimeDelta::from_secs(-10),
                SeekOrigin::UserInteracted
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_center_double_tap_toggles_play() {
        let (router, transport, _controls) = router();
        router.tap_zone(TapZone::Center);
        router.tap_zone(TapZone::Center);
        assert_eq!(*transport.toggles.lock(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_taps_after_window_are_two_singles() {
        let (router, transport, controls) = router();
        router.tap_zone(TapZone::Forward);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(controls.state(), ControlsState::Visible);

        assert_eq!(router.tap_zone(TapZone::Forward), TapOutcome::Pending);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(controls.state(), ControlsState::Hidden);
        assert!(transport.seeks.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zones_are_independent() {
        let (router, transport, _controls) = router();
        router.tap_zone(TapZone::Rewind);
        assert_eq!(router.tap_zone(TapZone::Forward), TapOutcome::Pending);
        assert!(transport.seeks.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_tap_dismisses_locked_overlay() {
        let (router, _transport, controls) = router();
        controls.lock();
        router.tap_zone(TapZone::Center);
        sleep(Duration::from_millis(250)).await;
        assert_eq!(controls.state(), ControlsState::Hidden);
    }
}
