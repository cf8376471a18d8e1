//! Observable player state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::backend::BackendKind;
use crate::item::Video;
use crate::queue::PlaybackMode;
use crate::time::Time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Finished,
    Failed,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Finished => "finished",
            PlaybackState::Failed => "failed",
        }
    }

    /// An item is loaded and transport commands reach the backend.
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the UI renders, published after every applied message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub current: Option<Video>,
    pub state: PlaybackState,
    pub time: Time,
    pub duration: Option<Time>,
    pub buffering: bool,
    pub queue: Vec<Video>,
    pub autoplay_candidate: Option<Video>,
    pub mode: PlaybackMode,
    pub backend: Option<BackendKind>,
    /// Index into `current.chapters`.
    pub chapter: Option<usize>,
}

impl PlayerSnapshot {
    pub fn current_chapter_title(&self) -> Option<&str> {
        let video = self.current.as_ref()?;
        let index = self.chapter?;
        video.chapters.get(index).map(|chapter| chapter.title.as_str())
    }
}
