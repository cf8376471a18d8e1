//! # Player Preferences
//!
//! Read-only flags the core consults but does not own.

use async_trait::async_trait;
use bridge_traits::SettingsStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::backend::BackendKind;
use crate::queue::PlaybackMode;
use crate::time::TimeDelta;

pub const BACKEND_KEY: &str = "player.backend";
pub const MODE_KEY: &str = "player.mode";
pub const SEEK_STEP_KEY: &str = "player.seek_step_ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerPreferences {
    pub preferred_backend: BackendKind,
    pub default_mode: PlaybackMode,
    /// Distance of a double-tap seek.
    pub seek_step: Duration,
}

impl Default for PlayerPreferences {
    fn default() -> Self {
        Self {
            preferred_backend: BackendKind::Engine,
            default_mode: PlaybackMode::Queue,
            seek_step: Duration::from_secs(10),
        }
    }
}

impl PlayerPreferences {
    pub fn seek_step_delta(&self) -> TimeDelta {
        TimeDelta::from_millis(i64::try_from(self.seek_step.as_millis()).unwrap_or(i64::MAX))
    }
}

#[async_trait]
pub trait PreferenceSource: Send + Sync {
    async fn snapshot(&self) -> PlayerPreferences;
}

/// Fixed preferences.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPreferences(pub PlayerPreferences);

#[async_trait]
impl PreferenceSource for StaticPreferences {
    async fn snapshot(&self) -> PlayerPreferences {
        self.0
    }
}

/// Preferences read from the host settings store.
///
/// Missing or unparsable values fall back to the defaults given at construction.
pub struct SettingsPreferences {
    store: Arc<dyn SettingsStore>,
    defaults: PlayerPreferences,
}

impl SettingsPreferences {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            defaults: PlayerPreferences::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: PlayerPreferences) -> Self {
        self.defaults = defaults;
        self
    }

    async fn read_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        match self.store.get_string(key).await {
            Ok(Some(raw)) => match raw.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(key, value = %raw, "Ignoring invalid preference");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(key, error = %err, "Preference unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl PreferenceSource for SettingsPreferences {
    async fn snapshot(&self) -> PlayerPreferences {
        let preferred_backend = self
            .read_parsed::<BackendKind>(BACKEND_KEY)
            .await
            .unwrap_or(self.defaults.preferred_backend);
        let default_mode = self
            .read_parsed::<PlaybackMode>(MODE_KEY)
            .await
            .unwrap_or(self.defaults.default_mode);
        let seek_step = match self.store.get_i64(SEEK_STEP_KEY).await {
            Ok(Some(ms)) if ms > 0 => Duration::from_millis(ms.unsigned_abs()),
            Ok(Some(ms)) => {
                warn!(key = SEEK_STEP_KEY, value = ms, "Ignoring invalid preference");
                self.defaults.seek_step
            }
            Ok(None) => self.defaults.seek_step,
            Err(err) => {
                warn!(key = SEEK_STEP_KEY, error = %err, "Preference unavailable");
                self.defaults.seek_step
            }
        };

        PlayerPreferences {
            preferred_backend,
            default_mode,
            seek_step,
        }
    }
}
