//! # Video Playback Core
//!
//! Drives video playback over one of two interchangeable host engines and
//! owns everything around it: the play queue, the autoplay candidate, seek
//! coalescing, the overlay controls and the tap gestures on the video surface.
//!
//! ## Overview
//!
//! - [`time`]: media time and seek requests
//! - [`backend`]: the uniform transport surface and its two adapters
//! - [`queue`]: ordered queue plus the autoplay candidate slot
//! - [`player`]: the orchestrator actor and its handle
//! - [`controls`] and [`gestures`]: overlay visibility and tap routing
//!
//! Host engines, stream resolution, related videos and watch history are
//! injected through traits; nothing here talks to the network directly.

pub mod backend;
pub mod collaborators;
pub mod config;
pub mod controls;
pub mod error;
pub mod gestures;
pub mod item;
pub mod persistence;
pub mod player;
pub mod preferences;
pub mod queue;
pub mod related;
pub mod seek;
pub mod time;

pub use backend::{BackendFactory, BackendKind, PlaybackBackend};
pub use collaborators::{HistoryStore, MemoryHistoryStore, Resolver, WatchRecord};
pub use config::PlayerConfig;
pub use controls::{ControlsState, ControlsVisibility};
pub use error::{PlaybackError, Result};
pub use gestures::{GestureRouter, TapOutcome, TapZone, TransportControl};
pub use item::{Chapter, PlaybackItem, StreamKind, StreamSource, Video, VideoId};
pub use persistence::QueueStore;
pub use player::{PlaybackState, PlayerHandle, PlayerModel, PlayerSnapshot};
pub use preferences::{PlayerPreferences, PreferenceSource, SettingsPreferences, StaticPreferences};
pub use queue::{PlaybackMode, QueueEngine};
pub use related::{AutoplaySelector, CandidateRanker, RelatedItemsProvider, StaticRelatedItems};
pub use time::{SeekOrigin, SeekRequest, SeekTarget, Time, TimeDelta};
