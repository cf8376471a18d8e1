//! # Player Configuration
//!
//! Timing and sizing knobs for the playback core.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Player configuration.
///
/// Controls debounce windows, timeouts and autoplay selection limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Window in which relative user seeks are summed into one backend seek.
    ///
    /// Each new seek in the burst restarts the window.
    ///
    /// Default: 250 ms.
    #[serde(default = "default_seek_coalesce_window")]
    pub seek_coalesce_window: Duration,

    /// Inactivity after which visible controls hide themselves.
    ///
    /// Default: 3 seconds.
    #[serde(default = "default_auto_hide_timeout")]
    pub auto_hide_timeout: Duration,

    /// Maximum gap between two taps of a double tap.
    ///
    /// Default: 200 ms.
    #[serde(default = "default_tap_sensitivity")]
    pub tap_sensitivity: Duration,

    /// Watchdog on the `loading` state, from the start of resolution to the
    /// backend's ready signal.
    ///
    /// Default: 15 seconds.
    #[serde(default = "default_load_timeout")]
    pub load_timeout: Duration,

    /// Delay before the single retry of a transient load or seek failure.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Related videos pulled from the provider per selection.
    ///
    /// Default: 20.
    #[serde(default = "default_max_related_candidates")]
    pub max_related_candidates: usize,

    /// Recent history entries that disqualify an autoplay candidate.
    ///
    /// Default: 100.
    #[serde(default = "default_history_lookback")]
    pub history_lookback: usize,

    /// Minimum spacing of `PositionChanged` events on the event bus.
    ///
    /// The snapshot channel is updated on every tick regardless.
    ///
    /// Default: 1 second.
    #[serde(default = "default_position_event_interval")]
    pub position_event_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            seek_coalesce_window: default_seek_coalesce_window(),
            auto_hide_timeout: default_auto_hide_timeout(),
            tap_sensitivity: default_tap_sensitivity(),
            load_timeout: default_load_timeout(),
            retry_delay: default_retry_delay(),
            max_related_candidates: default_max_related_candidates(),
            history_lookback: default_history_lookback(),
            position_event_interval: default_position_event_interval(),
        }
    }
}

impl PlayerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        let durations = [
            ("seek_coalesce_window", self.seek_coalesce_window),
            ("auto_hide_timeout", self.auto_hide_timeout),
            ("tap_sensitivity", self.tap_sensitivity),
            ("load_timeout", self.load_timeout),
            ("retry_delay", self.retry_delay),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| value.is_zero()) {
            return Err(format!("{name} must be > 0"));
        }

        if self.seek_coalesce_window >= self.load_timeout {
            return Err("seek_coalesce_window must be shorter than load_timeout".to_string());
        }

        if self.retry_delay >= self.load_timeout {
            return Err("retry_delay must be shorter than load_timeout".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_seek_coalesce_window() -> Duration {
    Duration::from_millis(250)
}

fn default_auto_hide_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_tap_sensitivity() -> Duration {
    Duration::from_millis(200)
}

fn default_load_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_related_candidates() -> usize {
    20
}

fn default_history_lookback() -> usize {
    100
}

fn default_position_event_interval() -> Duration {
    Duration::from_secs(1)
}
