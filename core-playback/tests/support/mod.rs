//! Scripted host engines and collaborator mocks shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, EndFileReason, EngineErrorCode, EngineEvent, EngineEventStream,
    EngineLoadOptions, MediaTimestamp, PlatformErrorDomain, PlatformFailure, PlatformPlayer,
    PlatformPlayerEvent, PlatformPlayerEventStream, PlayerItemId, PlayerItemSource,
    PlayerItemStatus, RenderEngine, SeekTolerance,
};
use core_playback::collaborators::{HistoryStore, Resolver, WatchRecord};
use core_playback::error::{PlaybackError, ResolutionError};
use core_playback::{
    BackendFactory, PlaybackItem, StreamKind, StreamSource, Time, Video, VideoId,
};
use core_runtime::events::{CoreEvent, Receiver};
use mockall::mock;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep, Duration};

pub const LENGTH_SECS: u64 = 600;

pub fn video(id: &str) -> Video {
    Video::new(id, format!("Video {id}")).with_length(Time::from_secs(LENGTH_SECS))
}

pub fn stream_url(id: &str) -> String {
    format!("https://cdn.example.test/{id}/master.m3u8")
}

pub fn resolved(id: &str) -> PlaybackItem {
    PlaybackItem::resolved(video(id), StreamSource::new(stream_url(id), StreamKind::Hls))
}

pub fn unresolved(id: &str) -> PlaybackItem {
    PlaybackItem::unresolved(video(id))
}

/// Lets spawned tasks and pumps run until everything is idle.
pub async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

pub fn drain(events: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// ============================================================================
// Event feed
// ============================================================================

struct Feed<T> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone> Feed<T> {
    fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    fn send(&self, event: T) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

struct ChannelStream<T>(mpsc::UnboundedReceiver<T>);

#[async_trait]
impl EngineEventStream for ChannelStream<EngineEvent> {
    async fn next(&mut self) -> Option<EngineEvent> {
        self.0.recv().await
    }
}

#[async_trait]
impl PlatformPlayerEventStream for ChannelStream<PlatformPlayerEvent> {
    async fn next(&mut self) -> Option<PlatformPlayerEvent> {
        self.0.recv().await
    }
}

// ============================================================================
// Render engine
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load {
        url: String,
        start_seconds: f64,
        paused: bool,
    },
    SetPaused(bool),
    Seek(f64),
    Stop,
}

/// Render engine that walks every load through `StartFile` → `FileLoaded` →
/// `PlaybackRestart` on its own.
pub struct FakeEngine {
    feed: Feed<EngineEvent>,
    calls: Mutex<Vec<EngineCall>>,
    duration_secs: f64,
    undecodable: Mutex<HashSet<String>>,
    rejected_loads: Mutex<usize>,
    hold_ready: Mutex<bool>,
    seek_gate: Mutex<Option<Arc<Notify>>>,
    stop_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            feed: Feed::new(),
            calls: Mutex::new(Vec::new()),
            duration_secs: LENGTH_SECS as f64,
            undecodable: Mutex::new(HashSet::new()),
            rejected_loads: Mutex::new(0),
            hold_ready: Mutex::new(false),
            seek_gate: Mutex::new(None),
            stop_gate: Mutex::new(None),
        })
    }

    /// Loads of `url` end with a decoder error.
    pub fn fail_decoding(&self, url: impl Into<String>) {
        self.undecodable.lock().insert(url.into());
    }

    /// The next `count` loads are rejected outright.
    pub fn reject_next_loads(&self, count: usize) {
        *self.rejected_loads.lock() = count;
    }

    /// Loads open but never report their first frame.
    pub fn hold_ready(&self, hold: bool) {
        *self.hold_ready.lock() = hold;
    }

    /// `seek_to` blocks until [`release_seeks`](Self::release_seeks).
    pub fn stall_seeks(&self) {
        *self.seek_gate.lock() = Some(Arc::new(Notify::new()));
    }

    pub fn release_seeks(&self) {
        release_gate(&self.seek_gate);
    }

    /// `stop` blocks until [`release_stop`](Self::release_stop).
    pub fn stall_stop(&self) {
        *self.stop_gate.lock() = Some(Arc::new(Notify::new()));
    }

    pub fn release_stop(&self) {
        release_gate(&self.stop_gate);
    }

    pub fn inject(&self, event: EngineEvent) {
        self.feed.send(event);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Load { url, .. } => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Seek(seconds) => Some(seconds),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

async fn wait_for(gate: &Mutex<Option<Arc<Notify>>>) {
    let gate = gate.lock().clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

fn release_gate(gate: &Mutex<Option<Arc<Notify>>>) {
    if let Some(gate) = gate.lock().take() {
        gate.notify_one();
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn load_file(&self, url: &str, options: EngineLoadOptions) -> BridgeResult<()> {
        self.calls.lock().push(EngineCall::Load {
            url: url.to_string(),
            start_seconds: options.start_seconds,
            paused: options.paused,
        });
        {
            let mut rejected = self.rejected_loads.lock();
            if *rejected > 0 {
                *rejected -= 1;
                return Err(BridgeError::EngineRejected {
                    command: "loadfile".to_string(),
                    message: "demuxer busy".to_string(),
                });
            }
        }

        self.feed.send(EngineEvent::StartFile);
        if self.undecodable.lock().contains(url) {
            self.feed.send(EngineEvent::EndFile(EndFileReason::Error {
                code: EngineErrorCode::DecodeFailed,
                message: "no decoder for av1".to_string(),
            }));
            return Ok(());
        }
        self.feed.send(EngineEvent::FileLoaded);
        self.feed
            .send(EngineEvent::DurationChanged(self.duration_secs));
        if !*self.hold_ready.lock() {
            self.feed.send(EngineEvent::PlaybackRestart);
            self.feed.send(EngineEvent::TimePos(options.start_seconds));
        }
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> BridgeResult<()> {
        self.calls.lock().push(EngineCall::SetPaused(paused));
        self.feed.send(EngineEvent::PauseChanged(paused));
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> BridgeResult<()> {
        self.calls.lock().push(EngineCall::Seek(seconds));
        wait_for(&self.seek_gate).await;
        self.feed.send(EngineEvent::PlaybackRestart);
        self.feed.send(EngineEvent::TimePos(seconds));
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.calls.lock().push(EngineCall::Stop);
        wait_for(&self.stop_gate).await;
        self.feed.send(EngineEvent::EndFile(EndFileReason::Stop));
        Ok(())
    }

    async fn time_pos(&self) -> BridgeResult<Option<f64>> {
        Ok(None)
    }

    async fn subscribe_events(&self) -> BridgeResult<Box<dyn EngineEventStream>> {
        Ok(Box::new(ChannelStream(self.feed.subscribe())))
    }
}

// ============================================================================
// Platform player
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Replace(Option<String>),
    SetRate(f32),
    Seek {
        seconds: f64,
        tolerance: SeekTolerance,
    },
}

/// Platform player whose items become ready before `replace_current_item`
/// even returns.
pub struct FakePlatformPlayer {
    feed: Feed<PlatformPlayerEvent>,
    calls: Mutex<Vec<PlatformCall>>,
    next_item: Mutex<u64>,
    current: Mutex<Option<PlayerItemId>>,
    duration_secs: f64,
    undecodable: Mutex<HashSet<String>>,
}

impl FakePlatformPlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            feed: Feed::new(),
            calls: Mutex::new(Vec::new()),
            next_item: Mutex::new(0),
            current: Mutex::new(None),
            duration_secs: LENGTH_SECS as f64,
            undecodable: Mutex::new(HashSet::new()),
        })
    }

    pub fn fail_decoding(&self, url: impl Into<String>) {
        self.undecodable.lock().insert(url.into());
    }

    pub fn current_item(&self) -> Option<PlayerItemId> {
        *self.current.lock()
    }

    pub fn inject(&self, event: PlatformPlayerEvent) {
        self.feed.send(event);
    }

    /// Periodic time tick for the current item.
    pub fn tick(&self, seconds: f64) {
        self.feed
            .send(PlatformPlayerEvent::PeriodicTime(MediaTimestamp::from_seconds(seconds)));
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    pub fn replaced_urls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Replace(Some(url)) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn seeks(&self) -> Vec<(f64, SeekTolerance)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Seek { seconds, tolerance } => Some((seconds, tolerance)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl PlatformPlayer for FakePlatformPlayer {
    async fn replace_current_item(
        &self,
        source: Option<PlayerItemSource>,
    ) -> BridgeResult<Option<PlayerItemId>> {
        self.calls
            .lock()
            .push(PlatformCall::Replace(source.as_ref().map(|s| s.url.clone())));
        let Some(source) = source else {
            *self.current.lock() = None;
            return Ok(None);
        };

        let item = {
            let mut next = self.next_item.lock();
            *next += 1;
            PlayerItemId(*next)
        };
        *self.current.lock() = Some(item);

        let status = if self.undecodable.lock().contains(&source.url) {
            PlayerItemStatus::Failed(PlatformFailure {
                domain: PlatformErrorDomain::Decoder,
                message: "Cannot Decode".to_string(),
            })
        } else {
            PlayerItemStatus::ReadyToPlay
        };
        self.feed.send(PlatformPlayerEvent::StatusChanged { item, status });
        Ok(Some(item))
    }

    async fn set_rate(&self, rate: f32) -> BridgeResult<()> {
        self.calls.lock().push(PlatformCall::SetRate(rate));
        self.feed.send(PlatformPlayerEvent::RateChanged(rate));
        Ok(())
    }

    async fn seek(&self, to: MediaTimestamp, tolerance: SeekTolerance) -> BridgeResult<bool> {
        self.calls.lock().push(PlatformCall::Seek {
            seconds: to.seconds().unwrap_or_default(),
            tolerance,
        });
        Ok(true)
    }

    async fn current_time(&self) -> BridgeResult<MediaTimestamp> {
        Ok(MediaTimestamp::ZERO)
    }

    async fn item_duration(&self) -> BridgeResult<Option<MediaTimestamp>> {
        Ok(Some(MediaTimestamp::from_seconds(self.duration_secs)))
    }

    async fn subscribe_events(&self) -> BridgeResult<Box<dyn PlatformPlayerEventStream>> {
        Ok(Box::new(ChannelStream(self.feed.subscribe())))
    }
}

// ============================================================================
// Collaborators
// ============================================================================

mock! {
    pub Resolver {}

    #[async_trait]
    impl Resolver for Resolver {
        async fn resolve(&self, id: &VideoId) -> Result<PlaybackItem, ResolutionError>;
    }
}

mock! {
    pub HistoryStore {}

    #[async_trait]
    impl HistoryStore for HistoryStore {
        async fn recent_ids(&self, limit: usize) -> Result<Vec<VideoId>, PlaybackError>;
        async fn record_watch(&self, record: WatchRecord) -> Result<(), PlaybackError>;
    }
}

/// Resolver that resolves every id to [`stream_url`].
pub fn resolving_resolver() -> MockResolver {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|id| Ok(resolved(id.as_str())));
    resolver
}

pub fn both_engines(
    engine: &Arc<FakeEngine>,
    platform: &Arc<FakePlatformPlayer>,
) -> BackendFactory {
    BackendFactory::new(
        Some(engine.clone() as Arc<dyn RenderEngine>),
        Some(platform.clone() as Arc<dyn PlatformPlayer>),
    )
}

pub fn engine_only(engine: &Arc<FakeEngine>) -> BackendFactory {
    BackendFactory::new(Some(engine.clone() as Arc<dyn RenderEngine>), None)
}
