//! # External Collaborators
//!
//! Interfaces the core consumes but does not implement: turning an id into a
//! playable stream and reading/writing watch history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{ResolutionError, Result};
use crate::item::{PlaybackItem, VideoId};

/// Resolves a video id into a [`PlaybackItem`] with a stream.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, id: &VideoId) -> std::result::Result<PlaybackItem, ResolutionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRecord {
    pub video_id: VideoId,
    pub title: String,
    pub watched_at: DateTime<Utc>,
}

/// Watch history, owned by the host application.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Most recently watched ids, newest first, at most `limit`.
    async fn recent_ids(&self, limit: usize) -> Result<Vec<VideoId>>;

    async fn record_watch(&self, record: WatchRecord) -> Result<()>;
}

/// In-process history, for hosts without their own store and for tests.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: Mutex<Vec<WatchRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<WatchRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn recent_ids(&self, limit: usize) -> Result<Vec<VideoId>> {
        let records = self.records.lock();
        Ok(records
            .iter()
            .rev()
            .take(limit)
            .map(|record| record.video_id.clone())
            .collect())
    }

    async fn record_watch(&self, record: WatchRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}
