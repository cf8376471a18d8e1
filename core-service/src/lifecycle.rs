//! Foreground/background handling.

use bridge_traits::{LifecycleChangeStream, LifecycleState};
use core_playback::{ControlsVisibility, PlayerHandle};
use tracing::{debug, warn};

/// Applies lifecycle transitions until the host closes the stream or the
/// player stops.
///
/// Leaving the screen hides the overlays and, with `pause_in_background`,
/// pauses playback. Coming back shows the controls; playback is not resumed.
pub(crate) async fn watch_lifecycle(
    mut changes: Box<dyn LifecycleChangeStream>,
    initial: LifecycleState,
    player: PlayerHandle,
    controls: ControlsVisibility,
    pause_in_background: bool,
) {
    let mut backgrounded = initial.is_backgrounded();
    while let Some(state) = changes.next().await {
        if state.is_backgrounded() == backgrounded {
            continue;
        }
        backgrounded = state.is_backgrounded();
        debug!(?state, "Lifecycle changed");

        if backgrounded {
            controls.hide_overlays();
            if pause_in_background && player.pause().is_err() {
                warn!("Player stopped, lifecycle watcher exiting");
                return;
            }
        } else {
            controls.show();
        }
    }
    debug!("Lifecycle stream closed");
}
