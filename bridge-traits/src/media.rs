//! Host media engine bridges.
//!
//! The core drives two structurally different host engines:
//!
//! - [`RenderEngine`]: a software decode/render engine controlled through
//!   commands and observed through property-change events. Positions are
//!   plain seconds and a replaced file reports its own `EndFile` after the
//!   replacement was requested.
//! - [`PlatformPlayer`]: the operating system's native player. It is driven
//!   by swapping a current item and setting a playback rate, works with
//!   rational timestamps, and scopes item notifications to a [`PlayerItemId`].
//!
//! Neither trait tries to hide those differences; reconciling them behind one
//! transport contract is the job of the backend adapters in `core-playback`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};

/// HTTP header pair forwarded to the engine when opening a stream.
pub type HttpHeader = (String, String);

// ============================================================================
// Render engine
// ============================================================================

/// Options accompanying a `load_file` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineLoadOptions {
    /// Position to start decoding from, in seconds.
    pub start_seconds: f64,
    /// Open the file paused instead of starting playback immediately.
    pub paused: bool,
    /// Headers sent with every HTTP request for this file.
    pub http_headers: Vec<HttpHeader>,
}

/// Error codes the render engine attaches to an abnormal `EndFile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineErrorCode {
    /// Network or file access failure while opening the source.
    LoadingFailed,
    /// The container could not be recognised.
    UnknownFormat,
    /// The source contained no decodable audio or video track.
    NothingToPlay,
    /// A decoder failed mid-stream.
    DecodeFailed,
    /// The video or audio output could not be initialised.
    OutputInitFailed,
}

/// Why the engine stopped playing a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndFileReason {
    /// Reached the end of the file.
    Eof,
    /// Playback was stopped or the file was replaced by `load_file`.
    Stop,
    /// The engine is shutting down.
    Quit,
    /// The file redirected to another URL (playlists, redirects).
    Redirect,
    /// Playback aborted with an error.
    Error { code: EngineErrorCode, message: String },
}

/// Asynchronous notifications emitted by the render engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A new file started opening.
    StartFile,
    /// The file was opened and its tracks selected.
    FileLoaded,
    /// Decoding (re)started after a load or a seek; the first frame is ready.
    PlaybackRestart,
    /// The `pause` property changed.
    PauseChanged(bool),
    /// The `time-pos` property changed, in seconds.
    TimePos(f64),
    /// The `duration` property became known or changed, in seconds.
    DurationChanged(f64),
    /// The engine paused or resumed itself because of cache underrun.
    PausedForCache(bool),
    /// The current file stopped playing.
    EndFile(EndFileReason),
}

/// Software decode/render engine bridge.
///
/// Commands are accepted asynchronously: a successful return means the engine
/// queued the command, not that it took effect. Effects are reported on the
/// event stream.
#[async_trait]
pub trait RenderEngine: PlatformSendSync {
    /// Replace the current file with `url`.
    async fn load_file(&self, url: &str, options: EngineLoadOptions) -> Result<()>;

    /// Set the `pause` property.
    async fn set_paused(&self, paused: bool) -> Result<()>;

    /// Absolute seek, in seconds.
    async fn seek_to(&self, seconds: f64) -> Result<()>;

    /// Stop playback and unload the current file.
    async fn stop(&self) -> Result<()>;

    /// Read the `time-pos` property. `None` when nothing is loaded.
    async fn time_pos(&self) -> Result<Option<f64>>;

    /// Subscribe to engine events.
    async fn subscribe_events(&self) -> Result<Box<dyn EngineEventStream>>;
}

/// Stream of render engine events.
#[async_trait]
pub trait EngineEventStream: PlatformSend {
    /// Returns `None` once the engine is destroyed.
    async fn next(&mut self) -> Option<EngineEvent>;
}

// ============================================================================
// Platform player
// ============================================================================

/// Rational media timestamp (`value / timescale` seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaTimestamp {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTimestamp {
    /// Timescale the core uses when it converts positions for the platform player.
    pub const PREFERRED_TIMESCALE: i32 = 600;

    pub const ZERO: MediaTimestamp = MediaTimestamp {
        value: 0,
        timescale: Self::PREFERRED_TIMESCALE,
    };

    pub fn new(value: i64, timescale: i32) -> Self {
        Self { value, timescale }
    }

    /// Converts seconds into a timestamp with the preferred timescale.
    pub fn from_seconds(seconds: f64) -> Self {
        let scale = Self::PREFERRED_TIMESCALE;
        Self {
            value: (seconds * f64::from(scale)).round() as i64,
            timescale: scale,
        }
    }

    /// A zero or negative timescale marks an invalid or indefinite time.
    pub fn is_valid(&self) -> bool {
        self.timescale > 0
    }

    pub fn seconds(&self) -> Option<f64> {
        self.is_valid()
            .then(|| self.value as f64 / f64::from(self.timescale))
    }
}

/// Seek precision requested from the platform player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekTolerance {
    /// Land exactly on the requested time (slower, decodes from the previous keyframe).
    Exact,
    /// Let the player snap to a nearby keyframe.
    #[default]
    Keyframe,
}

/// Source handed to the platform player when replacing its current item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerItemSource {
    pub url: String,
    pub http_headers: Vec<HttpHeader>,
}

/// Identity of an item created by [`PlatformPlayer::replace_current_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerItemId(pub u64);

/// Error domain attached to platform player failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformErrorDomain {
    /// Media decoding or format error.
    Decoder,
    /// URL loading error.
    Network,
    Unknown,
}

/// Failure description reported by the platform player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFailure {
    pub domain: PlatformErrorDomain,
    pub message: String,
}

/// Readiness status of a player item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerItemStatus {
    Unknown,
    ReadyToPlay,
    Failed(PlatformFailure),
}

/// Notifications emitted by the platform player.
///
/// Item-scoped notifications carry the [`PlayerItemId`] they belong to, so a
/// late notification for a replaced item can be told apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlatformPlayerEvent {
    StatusChanged {
        item: PlayerItemId,
        status: PlayerItemStatus,
    },
    /// Player rate changed (0.0 is paused).
    RateChanged(f32),
    /// Periodic time observer tick.
    PeriodicTime(MediaTimestamp),
    DidPlayToEnd { item: PlayerItemId },
    FailedToPlayToEnd {
        item: PlayerItemId,
        failure: PlatformFailure,
    },
    PlaybackStalled { item: PlayerItemId },
    /// `isPlaybackLikelyToKeepUp` changed.
    LikelyToKeepUp { item: PlayerItemId, value: bool },
}

/// Native platform player bridge.
#[async_trait]
pub trait PlatformPlayer: PlatformSendSync {
    /// Replace the current item. `None` empties the player.
    ///
    /// Returns the identity of the newly created item, if any.
    async fn replace_current_item(
        &self,
        source: Option<PlayerItemSource>,
    ) -> Result<Option<PlayerItemId>>;

    /// Set the playback rate. `0.0` pauses, `1.0` plays at normal speed.
    async fn set_rate(&self, rate: f32) -> Result<()>;

    /// Seek the current item. Returns `false` when a later seek interrupted this one.
    async fn seek(&self, to: MediaTimestamp, tolerance: SeekTolerance) -> Result<bool>;

    /// Current playback time of the current item.
    async fn current_time(&self) -> Result<MediaTimestamp>;

    /// Duration of the current item, `None` for live or not-yet-known durations.
    async fn item_duration(&self) -> Result<Option<MediaTimestamp>>;

    /// Subscribe to player notifications.
    async fn subscribe_events(&self) -> Result<Box<dyn PlatformPlayerEventStream>>;
}

/// Stream of platform player notifications.
#[async_trait]
pub trait PlatformPlayerEventStream: PlatformSend {
    /// Returns `None` once the player is released.
    async fn next(&mut self) -> Option<PlatformPlayerEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_from_seconds() {
        let ts = MediaTimestamp::from_seconds(12.5);
        assert_eq!(ts.value, 7_500);
        assert_eq!(ts.timescale, 600);
        assert_eq!(ts.seconds(), Some(12.5));
    }

    #[test]
    fn test_invalid_timestamp_has_no_seconds() {
        let ts = MediaTimestamp::new(100, 0);
        assert!(!ts.is_valid());
        assert_eq!(ts.seconds(), None);
    }

    #[test]
    fn test_foreign_timescale() {
        let ts = MediaTimestamp::new(90_000, 90_000);
        assert_eq!(ts.seconds(), Some(1.0));
    }

    #[test]
    fn test_end_file_reason_serializes() {
        let reason = EndFileReason::Error {
            code: EngineErrorCode::DecodeFailed,
            message: "hevc".to_string(),
        };
        let json = serde_json::to_string(&reason).unwrap();
        let back: EndFileReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reason);
    }
}
