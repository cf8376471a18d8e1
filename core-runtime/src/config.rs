//! # Core Configuration Module
//!
//! Provides configuration management for the playback core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the host bridges and settings the core needs. It
//! enforces fail-fast validation so a misconfigured host learns what is
//! missing at start-up rather than on first playback.
//!
//! ## Required Dependencies
//!
//! - `SettingsStore` - preferences and the persisted play queue
//! - At least one media engine: `RenderEngine` and/or `PlatformPlayer`
//!
//! ## Optional Dependencies
//!
//! - `LifecycleObserver` - App lifecycle (required by `pause_in_background`)
//! - `Clock` - Wall-clock for history records (defaults to `SystemClock`)
//! - `LoggerSink` - Host log forwarding
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .settings_store(Arc::new(MySettingsStore))
//!     .render_engine(Arc::new(MyMpvEngine::new()?))
//!     .platform_player(Arc::new(MyAvPlayer::new()))
//!     .lifecycle_observer(Arc::new(MyLifecycle))
//!     .enable_pause_in_background(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! The builder validates all required dependencies and provides actionable error
//! messages when capabilities are missing:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    Clock, LifecycleObserver, LoggerSink, PlatformPlayer, RenderEngine, SettingsStore,
    SystemClock,
};
use std::sync::Arc;

/// Upper bound for the event bus buffer.
const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

/// Core configuration for the playback core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// User preferences storage (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Software decode/render engine (optional if a platform player is provided)
    pub render_engine: Option<Arc<dyn RenderEngine>>,

    /// Native platform player (optional if a render engine is provided)
    pub platform_player: Option<Arc<dyn PlatformPlayer>>,

    /// App lifecycle observer (optional)
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,

    /// Wall-clock used for watch-history timestamps
    pub clock: Arc<dyn Clock>,

    /// Host log forwarding (optional)
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Event bus buffer size
    pub event_buffer_size: usize,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("settings_store", &"SettingsStore { ... }")
            .field(
                "render_engine",
                &self.render_engine.as_ref().map(|_| "RenderEngine { ... }"),
            )
            .field(
                "platform_player",
                &self
                    .platform_player
                    .as_ref()
                    .map(|_| "PlatformPlayer { ... }"),
            )
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Restore the persisted play queue at start-up and save it on shutdown
    pub restore_queue: bool,

    /// Pause playback when the app leaves the foreground (requires LifecycleObserver)
    pub pause_in_background: bool,

    /// Append a watch record to the history store when an item starts
    pub record_history: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            restore_queue: true,
            pause_in_background: false,
            record_history: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - At least one media engine is provided
    /// - Event buffer size is in range
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        if self.render_engine.is_none() && self.platform_player.is_none() {
            return Err(Error::CapabilityMissing {
                capability: "RenderEngine | PlatformPlayer".to_string(),
                message: "At least one media engine is required for playback. \
                         Inject the software render engine adapter, the native \
                         platform player adapter, or both."
                    .to_string(),
            });
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        if self.features.pause_in_background && self.lifecycle_observer.is_none() {
            return Err(Error::Config(
                "Pause in background enabled but no LifecycleObserver provided. \
                 Disable the feature or inject a LifecycleObserver implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for player preferences \
                 and queue persistence. Apple platforms: inject a UserDefaults adapter. \
                 Desktop/tests: use bridge_traits::MemorySettingsStore."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    settings_store: Option<Arc<dyn SettingsStore>>,
    render_engine: Option<Arc<dyn RenderEngine>>,
    platform_player: Option<Arc<dyn PlatformPlayer>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    clock: Option<Arc<dyn Clock>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the settings store (required).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the software render engine.
    pub fn render_engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.render_engine = Some(engine);
        self
    }

    /// Sets the native platform player.
    pub fn platform_player(mut self, player: Arc<dyn PlatformPlayer>) -> Self {
        self.platform_player = Some(player);
        self
    }

    /// Sets the lifecycle observer.
    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    /// Overrides the wall-clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Forwards log events to the host logger.
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Sets the event bus buffer size (default: 100).
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Enables or disables queue restore at start-up.
    pub fn enable_restore_queue(mut self, enabled: bool) -> Self {
        self.features.restore_queue = enabled;
        self
    }

    /// Enables or disables pausing when the app is backgrounded.
    pub fn enable_pause_in_background(mut self, enabled: bool) -> Self {
        self.features.pause_in_background = enabled;
        self
    }

    /// Enables or disables watch-history recording.
    pub fn enable_record_history(mut self, enabled: bool) -> Self {
        self.features.record_history = enabled;
        self
    }

    /// Replaces all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityMissing`] when a required bridge is absent and
    /// [`Error::Config`] when settings are inconsistent.
    pub fn build(self) -> Result<CoreConfig> {
        let settings_store = self
            .settings_store
            .ok_or_else(settings_store_missing_error)?;

        let config = CoreConfig {
            settings_store,
            render_engine: self.render_engine,
            platform_player: self.platform_player,
            lifecycle_observer: self.lifecycle_observer,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            logger_sink: self.logger_sink,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        EngineEventStream, EngineLoadOptions, LifecycleChangeStream, LifecycleState,
        MemorySettingsStore,
    };

    struct NullEngine;

    #[async_trait]
    impl RenderEngine for NullEngine {
        async fn load_file(&self, _url: &str, _options: EngineLoadOptions) -> BridgeResult<()> {
            Ok(())
        }
        async fn set_paused(&self, _paused: bool) -> BridgeResult<()> {
            Ok(())
        }
        async fn seek_to(&self, _seconds: f64) -> BridgeResult<()> {
            Ok(())
        }
        async fn stop(&self) -> BridgeResult<()> {
            Ok(())
        }
        async fn time_pos(&self) -> BridgeResult<Option<f64>> {
            Ok(None)
        }
        async fn subscribe_events(&self) -> BridgeResult<Box<dyn EngineEventStream>> {
            Err(bridge_traits::BridgeError::NotAvailable("events".to_string()))
        }
    }

    struct ForegroundOnly;

    #[async_trait]
    impl LifecycleObserver for ForegroundOnly {
        async fn get_state(&self) -> BridgeResult<LifecycleState> {
            Ok(LifecycleState::Foreground)
        }
        async fn subscribe_changes(&self) -> BridgeResult<Box<dyn LifecycleChangeStream>> {
            Err(bridge_traits::BridgeError::NotAvailable("lifecycle".to_string()))
        }
    }

    fn base_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .settings_store(Arc::new(MemorySettingsStore::new()))
            .render_engine(Arc::new(NullEngine))
    }

    #[test]
    fn test_builder_requires_settings_store() {
        let result = CoreConfig::builder()
            .render_engine(Arc::new(NullEngine))
            .build();

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("SettingsStore"));
        assert!(err_msg.contains("queue persistence"));
    }

    #[test]
    fn test_builder_requires_a_media_engine() {
        let result = CoreConfig::builder()
            .settings_store(Arc::new(MemorySettingsStore::new()))
            .build();

        assert!(matches!(
            result.unwrap_err(),
            Error::CapabilityMissing { .. }
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let config = base_builder().build().unwrap();
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.features.restore_queue);
        assert!(config.features.record_history);
        assert!(!config.features.pause_in_background);
        assert!(config.platform_player.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_event_buffer() {
        let result = base_builder().event_buffer_size(0).build();
        assert!(result.unwrap_err().to_string().contains("greater than 0"));
    }

    #[test]
    fn test_validate_rejects_huge_event_buffer() {
        let result = base_builder().event_buffer_size(50_000).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_pause_in_background_requires_lifecycle_observer() {
        let result = base_builder().enable_pause_in_background(true).build();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("LifecycleObserver"));

        let config = base_builder()
            .enable_pause_in_background(true)
            .lifecycle_observer(Arc::new(ForegroundOnly))
            .build()
            .unwrap();
        assert!(config.features.pause_in_background);
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = base_builder().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("RenderEngine { ... }"));
        assert!(debug.contains("features"));
    }
}
