//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the host
//! application. Each trait represents a capability the core requires but that
//! is implemented differently per platform (macOS, iOS/tvOS, desktop Linux).
//!
//! ## Traits
//!
//! ### Media Engines
//! - [`RenderEngine`](media::RenderEngine) - Software decode/render engine (command/property driven)
//! - [`PlatformPlayer`](media::PlatformPlayer) - Native platform player (item/rate driven)
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Platform Integration
//! - [`LifecycleObserver`](background::LifecycleObserver) - App foreground/background transitions
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let settings = builder.settings_store
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "SettingsStore".to_string(),
//!         message: "Inject the host preferences adapter.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Host adapters
//! convert platform errors into it with an actionable message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`: the core calls them from the
//! tasks it spawns on a multi-threaded runtime.

pub mod background;
pub mod error;
pub mod logging;
pub mod media;
pub mod platform;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{
    EndFileReason, EngineErrorCode, EngineEvent, EngineEventStream, EngineLoadOptions,
    MediaTimestamp, PlatformErrorDomain, PlatformFailure, PlatformPlayer, PlatformPlayerEvent,
    PlatformPlayerEventStream, PlayerItemId, PlayerItemSource, PlayerItemStatus, RenderEngine,
    SeekTolerance,
};
pub use storage::{MemorySettingsStore, SettingsStore};
pub use time::{Clock, ManualClock, SystemClock};
