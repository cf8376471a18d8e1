//! # Autoplay Selection
//!
//! Picks the autoplay candidate from a lazy sequence of related videos.
//!
//! Candidates that are the current item, were watched recently, or were
//! explicitly excluded (the previous candidate on "find other") are skipped.
//! Among the remaining ones a [`CandidateRanker`] makes the final choice.

use futures::stream::{BoxStream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::collaborators::HistoryStore;
use crate::item::{Video, VideoId};

/// Source of related videos for a given video.
pub trait RelatedItemsProvider: Send + Sync {
    /// A lazy, finite sequence of candidates. Only as many are pulled as the
    /// selector needs.
    fn related(&self, id: &VideoId) -> BoxStream<'static, Video>;
}

/// Chooses among eligible candidates.
pub trait CandidateRanker: Send + Sync {
    /// `eligible` is in provider order and never empty.
    fn pick(&self, eligible: Vec<Video>) -> Option<Video>;
}

/// Keeps the provider's order: the first eligible candidate wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderOrder;

impl CandidateRanker for ProviderOrder {
    fn pick(&self, eligible: Vec<Video>) -> Option<Video> {
        eligible.into_iter().next()
    }
}

/// Autoplay candidate selection over the injected collaborators.
pub struct AutoplaySelector {
    provider: Arc<dyn RelatedItemsProvider>,
    history: Arc<dyn HistoryStore>,
    ranker: Arc<dyn CandidateRanker>,
    max_candidates: usize,
    history_lookback: usize,
}

impl AutoplaySelector {
    pub fn new(
        provider: Arc<dyn RelatedItemsProvider>,
        history: Arc<dyn HistoryStore>,
        max_candidates: usize,
        history_lookback: usize,
    ) -> Self {
        Self {
            provider,
            history,
            ranker: Arc::new(ProviderOrder),
            max_candidates,
            history_lookback,
        }
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn CandidateRanker>) -> Self {
        self.ranker = ranker;
        self
    }

    /// Selects the candidate to play after `current`, skipping `exclude`.
    pub async fn select(&self, current: &VideoId, exclude: Option<&VideoId>) -> Option<Video> {
        let watched: HashSet<VideoId> = match self.history.recent_ids(self.history_lookback).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(err) => {
                warn!(error = %err, "History unavailable, autoplay ignores it");
                HashSet::new()
            }
        };

        let eligible: Vec<Video> = self
            .provider
            .related(current)
            .take(self.max_candidates)
            .filter(|video| {
                let keep = &video.id != current
                    && Some(&video.id) != exclude
                    && !watched.contains(&video.id);
                futures::future::ready(keep)
            })
            .collect()
            .await;

        if eligible.is_empty() {
            debug!(video_id = %current, "No autoplay candidate");
            return None;
        }
        let picked = self.ranker.pick(eligible);
        debug!(
            video_id = %current,
            candidate = picked.as_ref().map(|video| video.id.as_str()),
            "Autoplay candidate selected"
        );
        picked
    }
}

/// Related items from a fixed map, for hosts that prefetch them and for tests.
#[derive(Debug, Default, Clone)]
pub struct StaticRelatedItems {
    related: std::collections::HashMap<VideoId, Vec<Video>>,
}

impl StaticRelatedItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<VideoId>, videos: Vec<Video>) -> Self {
        self.related.insert(id.into(), videos);
        self
    }
}

impl RelatedItemsProvider for StaticRelatedItems {
    fn related(&self, id: &VideoId) -> BoxStream<'static, Video> {
        let videos = self.related.get(id).cloned().unwrap_or_default();
        futures::stream::iter(videos).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryHistoryStore, WatchRecord};
    use chrono::Utc;

    fn videos(ids: &[&str]) -> Vec<Video> {
        ids.iter().map(|id| Video::new(*id, *id)).collect()
    }

    fn selector(history: Arc<MemoryHistoryStore>, max: usize) -> AutoplaySelector {
        let provider = StaticRelatedItems::new().with("cur", videos(&["cur", "seen", "x", "y"]));
        AutoplaySelector::new(Arc::new(provider), history, max, 100)
    }

    async fn watched(store: &MemoryHistoryStore, id: &str) {
        store
            .record_watch(WatchRecord {
                video_id: VideoId::from(id),
                title: id.to_string(),
                watched_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_skips_current_and_watched() {
        let history = Arc::new(MemoryHistoryStore::new());
        watched(&history, "seen").await;

        let picked = selector(history, 20).select(&VideoId::from("cur"), None).await;
        assert_eq!(picked.map(|v| v.id), Some(VideoId::from("x")));
    }

    #[tokio::test]
    async fn test_find_other_excludes_previous_candidate() {
        let history = Arc::new(MemoryHistoryStore::new());
        let picked = selector(history, 20)
            .select(&VideoId::from("cur"), Some(&VideoId::from("seen")))
            .await;
        assert_eq!(picked.map(|v| v.id), Some(VideoId::from("x")));
    }

    #[tokio::test]
    async fn test_candidate_limit() {
        let history = Arc::new(MemoryHistoryStore::new());
        // Only "cur" and "seen" are considered.
        let picked = selector(Arc::clone(&history), 2)
            .select(&VideoId::from("cur"), Some(&VideoId::from("seen")))
            .await;
        assert_eq!(picked, None);
        assert_eq!(selector(history, 0).select(&VideoId::from("cur"), None).await, None);
    }

    #[tokio::test]
    async fn test_custom_ranker() {
        struct Last;
        impl CandidateRanker for Last {
            fn pick(&self, eligible: Vec<Video>) -> Option<Video> {
                eligible.into_iter().last()
            }
        }

        let history = Arc::new(MemoryHistoryStore::new());
        let picked = selector(history, 20)
            .with_ranker(Arc::new(Last))
            .select(&VideoId::from("cur"), None)
            .await;
        assert_eq!(picked.map(|v| v.id), Some(VideoId::from("y")));
    }
}
