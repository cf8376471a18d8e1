//! Player service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (render engine,
//! platform player, settings store, lifecycle observer) into the playback
//! core and hands the UI a single [`PlayerContext`].
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .settings_store(settings)
//!     .render_engine(engine)
//!     .lifecycle_observer(lifecycle)
//!     .build()?;
//! init_logging(logging_config(&config))?;
//!
//! let context = PlayerContext::start(config, collaborators).await?;
//! context.player().play_now(item)?;
//! ```

mod context;
pub mod error;
mod lifecycle;

pub use context::{Collaborators, PlayerContext};
pub use error::{CoreError, Result};

pub use core_playback::*;
pub use core_runtime::config::{CoreConfig, CoreConfigBuilder, FeatureFlags};
pub use core_runtime::events::{CoreEvent, EventBus};
pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

/// Logging configuration that forwards records to the host's logger sink,
/// when the config carries one.
pub fn logging_config(config: &CoreConfig) -> LoggingConfig {
    let logging = LoggingConfig::default();
    match &config.logger_sink {
        Some(sink) => logging.with_logger_sink(sink.clone()),
        None => logging,
    }
}
