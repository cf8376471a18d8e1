//! Host bridges for the service tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    EndFileReason, EngineEvent, EngineEventStream, EngineLoadOptions, LifecycleChangeStream,
    LifecycleObserver, LifecycleState, MemorySettingsStore, RenderEngine,
};
use core_playback::collaborators::{MemoryHistoryStore, Resolver};
use core_playback::error::ResolutionError;
use core_service::{
    Collaborators, CoreConfig, PlaybackItem, StaticRelatedItems, StreamKind, StreamSource, Time,
    Video, VideoId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

pub fn video(id: &str) -> Video {
    Video::new(id, format!("Video {id}")).with_length(Time::from_secs(600))
}

pub fn stream(id: &str) -> StreamSource {
    StreamSource::new(format!("https://cdn.example.test/{id}/master.m3u8"), StreamKind::Hls)
}

pub fn resolved(id: &str) -> PlaybackItem {
    PlaybackItem::resolved(video(id), stream(id))
}

pub async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

/// Resolves every id to its CDN stream.
pub struct CdnResolver;

#[async_trait]
impl Resolver for CdnResolver {
    async fn resolve(&self, id: &VideoId) -> Result<PlaybackItem, ResolutionError> {
        Ok(resolved(id.as_str()))
    }
}

pub fn collaborators() -> Collaborators {
    Collaborators::new(
        Arc::new(CdnResolver),
        Arc::new(StaticRelatedItems::new()),
        Arc::new(MemoryHistoryStore::new()),
    )
}

// ============================================================================
// Render engine
// ============================================================================

/// Engine that opens every file immediately and echoes pause changes.
#[derive(Default)]
pub struct ScriptedEngine {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<EngineEvent>>>,
    loads: Mutex<Vec<String>>,
    paused: Mutex<Vec<bool>>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().clone()
    }

    pub fn pause_calls(&self) -> Vec<bool> {
        self.paused.lock().clone()
    }

    fn send(&self, event: EngineEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

struct EngineStream(mpsc::UnboundedReceiver<EngineEvent>);

#[async_trait]
impl EngineEventStream for EngineStream {
    async fn next(&mut self) -> Option<EngineEvent> {
        self.0.recv().await
    }
}

#[async_trait]
impl RenderEngine for ScriptedEngine {
    async fn load_file(&self, url: &str, options: EngineLoadOptions) -> BridgeResult<()> {
        self.loads.lock().push(url.to_string());
        self.send(EngineEvent::StartFile);
        self.send(EngineEvent::FileLoaded);
        self.send(EngineEvent::DurationChanged(600.0));
        self.send(EngineEvent::PlaybackRestart);
        self.send(EngineEvent::TimePos(options.start_seconds));
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> BridgeResult<()> {
        self.paused.lock().push(paused);
        self.send(EngineEvent::PauseChanged(paused));
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> BridgeResult<()> {
        self.send(EngineEvent::PlaybackRestart);
        self.send(EngineEvent::TimePos(seconds));
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.send(EngineEvent::EndFile(EndFileReason::Stop));
        Ok(())
    }

    async fn time_pos(&self) -> BridgeResult<Option<f64>> {
        Ok(None)
    }

    async fn subscribe_events(&self) -> BridgeResult<Box<dyn EngineEventStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        Ok(Box::new(EngineStream(rx)))
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle observer the test moves between foreground and background.
pub struct ManualLifecycle {
    state: Mutex<LifecycleState>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<LifecycleState>>>,
}

impl ManualLifecycle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LifecycleState::Foreground),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn set(&self, state: LifecycleState) {
        *self.state.lock() = state;
        self.subscribers.lock().retain(|tx| tx.send(state).is_ok());
    }
}

struct LifecycleStream(mpsc::UnboundedReceiver<LifecycleState>);

#[async_trait]
impl LifecycleChangeStream for LifecycleStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        self.0.recv().await
    }
}

#[async_trait]
impl LifecycleObserver for ManualLifecycle {
    async fn get_state(&self) -> BridgeResult<LifecycleState> {
        Ok(*self.state.lock())
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn LifecycleChangeStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        Ok(Box::new(LifecycleStream(rx)))
    }
}

// ============================================================================
// Configuration
// ============================================================================

pub struct Host {
    pub settings: Arc<MemorySettingsStore>,
    pub engine: Arc<ScriptedEngine>,
    pub lifecycle: Arc<ManualLifecycle>,
}

impl Host {
    pub fn new() -> Self {
        Self {
            settings: Arc::new(MemorySettingsStore::new()),
            engine: ScriptedEngine::new(),
            lifecycle: ManualLifecycle::new(),
        }
    }

    pub fn config(&self, restore_queue: bool, pause_in_background: bool) -> CoreConfig {
        CoreConfig::builder()
            .settings_store(self.settings.clone())
            .render_engine(self.engine.clone())
            .lifecycle_observer(self.lifecycle.clone())
            .enable_restore_queue(restore_queue)
            .enable_pause_in_background(pause_in_background)
            .build()
            .expect("valid config")
    }
}
