//! Messages processed by the player actor.

use core_async::sync::oneshot;

use crate::backend::{BackendEnvelope, BackendKind, SessionId};
use crate::error::{LoadError, ResolutionError};
use crate::item::{PlaybackItem, Video, VideoId};
use crate::preferences::PlayerPreferences;
use crate::queue::PlaybackMode;
use crate::time::{SeekRequest, Time};

#[derive(Debug)]
pub(crate) enum Command {
    // UI commands
    PlayNow {
        item: PlaybackItem,
        start: Time,
    },
    Enqueue {
        item: PlaybackItem,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        id: VideoId,
        reply: oneshot::Sender<bool>,
    },
    RemoveAll,
    Restore(Vec<Video>),
    Play,
    Pause,
    TogglePlay,
    Seek {
        request: SeekRequest,
        retried: bool,
    },
    Advance,
    Stop,
    SetMode(PlaybackMode),
    FindOtherAutoplay,
    SwitchBackend(BackendKind),
    Reset(PlayerPreferences),
    CurrentTime(oneshot::Sender<Option<Time>>),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<Vec<Video>>),

    // Internal
    Backend(BackendEnvelope),
    Resolved {
        session: SessionId,
        result: Result<PlaybackItem, ResolutionError>,
    },
    LoadFailed {
        session: SessionId,
        error: LoadError,
    },
    Watchdog(SessionId),
    RetryLoad(SessionId),
    CoalescedSeek(u64),
    AutoplaySelected {
        generation: u64,
        for_id: VideoId,
        candidate: Option<Video>,
    },
}
