//! # Playback Error Types
//!
//! Typed errors for each seam of the playback core, plus the umbrella
//! [`PlaybackError`] returned by the public command surface.

use bridge_traits::BridgeError;
use thiserror::Error;

use crate::backend::BackendKind;
use crate::item::VideoId;
use crate::time::Time;

/// Failure to start loading an item on a backend.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The backend cannot accept a load right now (engine still initialising).
    #[error("Backend not ready to load")]
    NotReady,

    /// The stream could not be opened (network error, expired URL).
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The backend does not handle this stream format.
    #[error("Unsupported stream format: {0}")]
    UnsupportedFormat(String),

    /// The item reached a backend without a resolved stream.
    #[error("Item {0} has no resolved stream")]
    NotResolved(VideoId),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl LoadError {
    /// Returns `true` if the load may succeed when retried shortly.
    pub fn is_transient(&self) -> bool {
        matches!(self, LoadError::NotReady | LoadError::SourceUnavailable(_))
    }
}

impl From<BridgeError> for LoadError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::NotAvailable(_) => LoadError::NotReady,
            BridgeError::EngineRejected { message, .. } => LoadError::SourceUnavailable(message),
            other => LoadError::Backend(BackendError::Bridge(other)),
        }
    }
}

#[derive(Error, Debug)]
pub enum SeekError {
    /// Target is negative or past the known duration. `bound` is the nearest
    /// valid position.
    #[error("Seek target {requested_ms}ms out of range, nearest bound {bound}")]
    OutOfRange { requested_ms: i64, bound: Time },

    /// Nothing is loaded, or the load has not progressed far enough to seek.
    #[error("Nothing loaded to seek in")]
    NotReady,

    #[error("Backend error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Failure to turn a video identifier into a playable item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Video not found: {0}")]
    NotFound(VideoId),

    #[error("No playable stream for {0}")]
    NoPlayableStream(VideoId),

    /// Geo-blocked, private, age-restricted, service error.
    #[error("Video {id} unavailable: {reason}")]
    Unavailable { id: VideoId, reason: String },
}

/// Errors from transport commands on a backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend has nothing loaded")]
    NotReady,

    /// The host did not provide this kind of engine.
    #[error("Backend {0} is not available on this host")]
    Unavailable(BackendKind),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Classification of a failure reported by a backend while playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Container or codec the engine cannot decode.
    Decode,
    Network,
    /// Source rejected or missing (HTTP 403/404, empty file).
    Source,
    Unknown,
}

/// Failure reported asynchronously through a backend's `DidFail` event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?} failure: {message}")]
pub struct BackendFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl BackendFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Decode failures are the ones the other backend may handle.
    pub fn is_fatal_decode(&self) -> bool {
        self.kind == FailureKind::Decode
    }
}

/// Errors returned by the public playback API.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Seek(#[from] SeekError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The player actor has shut down.
    #[error("Player is shut down")]
    ActorClosed,

    #[error("Invalid player configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::Load(err) => err.is_transient(),
            PlaybackError::Seek(SeekError::NotReady) => true,
            _ => false,
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PlaybackError::from(LoadError::NotReady).is_transient());
        assert!(PlaybackError::from(LoadError::SourceUnavailable("503".into())).is_transient());
        assert!(PlaybackError::from(SeekError::NotReady).is_transient());
        assert!(!PlaybackError::from(LoadError::UnsupportedFormat("flv".into())).is_transient());
        assert!(!PlaybackError::from(SeekError::OutOfRange {
            requested_ms: -5,
            bound: Time::ZERO
        })
        .is_transient());
        assert!(!PlaybackError::ActorClosed.is_transient());
    }

    #[test]
    fn test_bridge_errors_map_to_load_errors() {
        let not_ready = LoadError::from(BridgeError::NotAvailable("engine".into()));
        assert!(matches!(not_ready, LoadError::NotReady));

        let rejected = LoadError::from(BridgeError::EngineRejected {
            command: "loadfile".into(),
            message: "403".into(),
        });
        assert!(matches!(rejected, LoadError::SourceUnavailable(ref m) if m == "403"));

        let failed = LoadError::from(BridgeError::OperationFailed("boom".into()));
        assert!(!failed.is_transient());
    }

    #[test]
    fn test_only_decode_failures_are_fatal_decode() {
        assert!(BackendFailure::new(FailureKind::Decode, "hevc").is_fatal_decode());
        assert!(!BackendFailure::new(FailureKind::Network, "timeout").is_fatal_decode());
    }
}
