//! Saves the play queue across launches.
//!
//! Only catalog metadata is stored. Resolved stream URLs expire, so restored
//! items are unresolved and go through the resolver when they are played.

use bridge_traits::SettingsStore;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::item::Video;

pub const QUEUE_KEY: &str = "player.queue";

pub struct QueueStore {
    store: Arc<dyn SettingsStore>,
}

impl QueueStore {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub async fn save(&self, videos: &[Video]) -> Result<()> {
        if videos.is_empty() {
            return self.clear().await;
        }
        let json = serde_json::to_string(videos)?;
        self.store.set_string(QUEUE_KEY, &json).await?;
        debug!(count = videos.len(), "Queue saved");
        Ok(())
    }

    /// Loads the saved queue. A corrupt entry is discarded and reads as empty.
    pub async fn load(&self) -> Result<Vec<Video>> {
        let Some(json) = self.store.get_string(QUEUE_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<Video>>(&json) {
            Ok(videos) => Ok(videos),
            Err(err) => {
                warn!(error = %err, "Discarding unreadable saved queue");
                self.clear().await?;
                Ok(Vec::new())
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.delete(QUEUE_KEY).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Chapter;
    use crate::time::Time;
    use bridge_traits::MemorySettingsStore;

    #[tokio::test]
    async fn test_save_and_load() {
        let settings = Arc::new(MemorySettingsStore::new());
        let store = QueueStore::new(settings.clone());
        let videos = vec![
            Video::new("a", "A").with_length(Time::from_secs(90)),
            Video::new("b", "B").with_chapters(vec![Chapter::new("Intro", Time::ZERO)]),
        ];

        store.save(&videos).await.unwrap();
        assert_eq!(store.load().await.unwrap(), videos);

        store.save(&[]).await.unwrap();
        assert!(!settings.has_key(QUEUE_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_queue_reads_empty() {
        let settings = Arc::new(MemorySettingsStore::new());
        settings.set_string(QUEUE_KEY, "{not json").await.unwrap();

        let store = QueueStore::new(settings.clone());
        assert!(store.load().await.unwrap().is_empty());
        assert!(!settings.has_key(QUEUE_KEY).await.unwrap());
    }
}
