//! # Player Usage Example
//!
//! Drives a [`PlayerModel`] over a toy render engine that "plays" each file
//! in a few ticks, then prints the events the player publishes while it
//! works through a queue and the related-items autoplay candidate.
//!
//! Run with: `cargo run --example player_demo --package core-playback`

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    EndFileReason, EngineEvent, EngineEventStream, EngineLoadOptions, RenderEngine,
};
use core_playback::error::ResolutionError;
use core_playback::{
    BackendFactory, MemoryHistoryStore, PlaybackItem, PlaybackMode, PlayerModel,
    PlayerPreferences, Resolver, StaticPreferences, StaticRelatedItems, StreamKind, StreamSource,
    Time, Video, VideoId,
};
use core_runtime::events::{CoreEvent, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Toy render engine
// ============================================================================

/// Plays every file for `ticks` seconds of wall time, one `TimePos` per tick.
struct ToyEngine {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<EngineEvent>>>>,
    ticks: u32,
    playback: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ToyEngine {
    fn new(ticks: u32) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            ticks,
            playback: Mutex::new(None),
        }
    }

    fn broadcast(subscribers: &Mutex<Vec<mpsc::UnboundedSender<EngineEvent>>>, event: EngineEvent) {
        subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

struct ToyStream(mpsc::UnboundedReceiver<EngineEvent>);

#[async_trait]
impl EngineEventStream for ToyStream {
    async fn next(&mut self) -> Option<EngineEvent> {
        self.0.recv().await
    }
}

#[async_trait]
impl RenderEngine for ToyEngine {
    async fn load_file(&self, url: &str, options: EngineLoadOptions) -> BridgeResult<()> {
        println!("  [engine] loadfile {url} start={}", options.start_seconds);
        let subscribers = Arc::clone(&self.subscribers);
        let ticks = self.ticks;
        let task = tokio::spawn(async move {
            Self::broadcast(&subscribers, EngineEvent::StartFile);
            Self::broadcast(&subscribers, EngineEvent::FileLoaded);
            Self::broadcast(&subscribers, EngineEvent::DurationChanged(f64::from(ticks)));
            Self::broadcast(&subscribers, EngineEvent::PlaybackRestart);
            for second in 0..=ticks {
                Self::broadcast(&subscribers, EngineEvent::TimePos(f64::from(second)));
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Self::broadcast(&subscribers, EngineEvent::EndFile(EndFileReason::Eof));
        });
        if let Some(previous) = self.playback.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> BridgeResult<()> {
        Self::broadcast(&self.subscribers, EngineEvent::PauseChanged(paused));
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> BridgeResult<()> {
        Self::broadcast(&self.subscribers, EngineEvent::TimePos(seconds));
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        if let Some(task) = self.playback.lock().take() {
            task.abort();
        }
        Self::broadcast(&self.subscribers, EngineEvent::EndFile(EndFileReason::Stop));
        Ok(())
    }

    async fn time_pos(&self) -> BridgeResult<Option<f64>> {
        Ok(None)
    }

    async fn subscribe_events(&self) -> BridgeResult<Box<dyn EngineEventStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        Ok(Box::new(ToyStream(rx)))
    }
}

// ============================================================================
// Catalog
// ============================================================================

fn video(id: &str, title: &str) -> Video {
    Video::new(id, title).with_length(Time::from_secs(3))
}

struct CatalogResolver;

#[async_trait]
impl Resolver for CatalogResolver {
    async fn resolve(&self, id: &VideoId) -> Result<PlaybackItem, ResolutionError> {
        let stream = StreamSource::new(
            format!("https://cdn.example.test/{id}/master.m3u8", id = id.as_str()),
            StreamKind::Hls,
        );
        Ok(PlaybackItem::resolved(
            video(id.as_str(), &format!("Video {}", id.as_str())),
            stream,
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Player Demo ===\n");

    let engine: Arc<dyn RenderEngine> = Arc::new(ToyEngine::new(3));
    let related = StaticRelatedItems::new()
        .with("intro", vec![video("deep-dive", "Deep Dive")])
        .with("deep-dive", vec![video("intro", "Intro"), video("outro", "Outro")]);

    let player = PlayerModel::new(
        BackendFactory::new(Some(engine), None),
        Arc::new(CatalogResolver),
        Arc::new(related),
        Arc::new(MemoryHistoryStore::new()),
    )
    .with_preferences(Arc::new(StaticPreferences(PlayerPreferences {
        default_mode: PlaybackMode::Related,
        ..PlayerPreferences::default()
    })))
    .spawn()
    .await?;

    let mut events = player.events().subscribe();
    player.play_now(PlaybackItem::unresolved(video("intro", "Intro")))?;

    // Intro, then its related pick, then the next unwatched pick.
    let mut started = 0;
    while let Ok(event) = events.recv().await {
        match &event {
            CoreEvent::Playback(PlaybackEvent::PositionChanged { .. }) => continue,
            CoreEvent::Playback(PlaybackEvent::Started { title, .. }) => {
                started += 1;
                println!("▶ {title}");
            }
            other => println!("  {}", other.description()),
        }
        if started == 3 {
            break;
        }
    }

    let queue = player.shutdown().await?;
    println!("\n✓ Player shut down ({} queued item(s) left)", queue.len());
    Ok(())
}
