//! # Queue Engine
//!
//! Ordered play queue plus an independent autoplay candidate slot.
//!
//! The queue is strictly FIFO with no reordering. Items are identified by
//! their [`VideoId`]: enqueueing a video that is already queued does nothing.
//! The autoplay candidate is not part of the queue order and survives
//! [`remove_all`](QueueEngine::remove_all).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::trace;

use crate::item::{PlaybackItem, Video, VideoId};

/// What happens when the current item finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackMode {
    /// Play the next queued item, then stop.
    #[default]
    Queue,
    /// Play the next queued item, else the autoplay candidate.
    Related,
    /// Restart the current item.
    RepeatOne,
    /// Cycle through the queue, re-appending each finished item.
    RepeatAll,
}

impl PlaybackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackMode::Queue => "queue",
            PlaybackMode::Related => "related",
            PlaybackMode::RepeatOne => "repeat-one",
            PlaybackMode::RepeatAll => "repeat-all",
        }
    }
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(PlaybackMode::Queue),
            "related" | "autoplay" => Ok(PlaybackMode::Related),
            "repeat-one" | "loop" => Ok(PlaybackMode::RepeatOne),
            "repeat-all" => Ok(PlaybackMode::RepeatAll),
            other => Err(format!("unknown playback mode `{other}`")),
        }
    }
}

#[derive(Debug, Default)]
pub struct QueueEngine {
    items: VecDeque<PlaybackItem>,
    autoplay_candidate: Option<PlaybackItem>,
}

impl QueueEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `item` unless a video with the same id is already queued.
    /// Returns whether it was inserted.
    pub fn enqueue(&mut self, item: PlaybackItem) -> bool {
        if self.contains(item.id()) {
            trace!(video_id = %item.id(), "Already queued");
            return false;
        }
        self.items.push_back(item);
        true
    }

    /// Removes the video with this id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &VideoId) -> bool {
        match self.position(id) {
            Some(index) => self.items.remove(index).is_some(),
            None => false,
        }
    }

    /// Empties the queue. The autoplay candidate is kept.
    pub fn remove_all(&mut self) {
        self.items.clear();
    }

    /// Removes and returns the head of the queue.
    pub fn dequeue_next(&mut self) -> Option<PlaybackItem> {
        self.items.pop_front()
    }

    pub fn set_autoplay_candidate(&mut self, item: Option<PlaybackItem>) {
        self.autoplay_candidate = item;
    }

    pub fn clear_autoplay_candidate(&mut self) {
        self.autoplay_candidate = None;
    }

    /// Promotes the candidate out of its slot.
    pub fn take_autoplay_candidate(&mut self) -> Option<PlaybackItem> {
        self.autoplay_candidate.take()
    }

    pub fn autoplay_candidate(&self) -> Option<&PlaybackItem> {
        self.autoplay_candidate.as_ref()
    }

    pub fn contains(&self, id: &VideoId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &VideoId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn items(&self) -> impl Iterator<Item = &PlaybackItem> {
        self.items.iter()
    }

    pub fn videos(&self) -> Vec<Video> {
        self.items.iter().map(|item| item.video.clone()).collect()
    }

    pub fn ids(&self) -> Vec<VideoId> {
        self.items.iter().map(|item| item.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> PlaybackItem {
        PlaybackItem::unresolved(Video::new(id, id.to_uppercase()))
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let mut queue = QueueEngine::new();
        assert!(queue.enqueue(item("a")));
        assert!(queue.enqueue(item("b")));
        assert!(!queue.enqueue(item("a")));
        assert_eq!(queue.ids(), vec![VideoId::from("a"), VideoId::from("b")]);
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = QueueEngine::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(item(id));
        }
        let order: Vec<_> = std::iter::from_fn(|| queue.dequeue_next())
            .map(|item| item.id().to_string())
            .collect();
        assert_eq!(order, ["a", "b", "c"]);
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn test_remove_by_identity() {
        let mut queue = QueueEngine::new();
        queue.enqueue(item("a"));
        queue.enqueue(item("b"));
        assert!(queue.remove(&VideoId::from("a")));
        assert!(!queue.remove(&VideoId::from("a")));
        assert_eq!(queue.position(&VideoId::from("b")), Some(0));
        // A removed video can be queued again.
        assert!(queue.enqueue(item("a")));
    }

    #[test]
    fn test_remove_all_keeps_candidate() {
        let mut queue = QueueEngine::new();
        queue.enqueue(item("a"));
        queue.set_autoplay_candidate(Some(item("c")));
        queue.remove_all();
        assert!(queue.is_empty());
        assert_eq!(queue.autoplay_candidate().map(|c| c.id().as_str()), Some("c"));
        assert_eq!(queue.take_autoplay_candidate().map(|c| c.id().to_string()), Some("c".into()));
        assert!(queue.autoplay_candidate().is_none());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("repeat-one".parse::<PlaybackMode>().unwrap(), PlaybackMode::RepeatOne);
        assert_eq!("Related".parse::<PlaybackMode>().unwrap(), PlaybackMode::Related);
        assert!("shuffle".parse::<PlaybackMode>().is_err());
        assert_eq!(PlaybackMode::RepeatAll.to_string(), "repeat-all");
    }
}
