//! # Player Model
//!
//! The orchestrator between the UI, the queue and the active backend.
//!
//! [`PlayerModel`] collects the collaborators and spawns the player actor;
//! [`PlayerHandle`] is the cloneable front end the UI talks to. Commands are
//! applied in the order they were sent. State is observed through
//! [`PlayerHandle::subscribe`] (a `watch` channel of [`PlayerSnapshot`]) and
//! discrete occurrences through the [`EventBus`].
//!
//! ## Example
//!
//! ```rust,ignore
//! let handle = PlayerModel::new(factory, resolver, related, history)
//!     .with_preferences(Arc::new(SettingsPreferences::new(store)))
//!     .spawn()
//!     .await?;
//!
//! handle.play_now(PlaybackItem::unresolved(video))?;
//! handle.seek(SeekRequest::relative(TimeDelta::from_secs(-10), SeekOrigin::UserInteracted))?;
//! let position = handle.current_time().await?;
//! ```

mod actor;
mod messages;
mod state;

pub use state::{PlaybackState, PlayerSnapshot};

use bridge_traits::time::{Clock, SystemClock};
use core_async::sync::{mpsc, oneshot, watch};
use core_runtime::events::EventBus;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::{BackendEventSink, BackendFactory, BackendKind, BackendSet};
use crate::collaborators::{HistoryStore, Resolver};
use crate::config::PlayerConfig;
use crate::controls::ControlsVisibility;
use crate::error::{PlaybackError, Result};
use crate::gestures::TransportControl;
use crate::item::{PlaybackItem, Video, VideoId};
use crate::preferences::{PlayerPreferences, PreferenceSource, StaticPreferences};
use crate::queue::PlaybackMode;
use crate::related::{AutoplaySelector, CandidateRanker, RelatedItemsProvider};
use crate::time::{SeekRequest, Time, TimeDelta};

use actor::{Collaborators, PlayerActor};
use messages::Command;

/// Builder for the player actor.
pub struct PlayerModel {
    factory: BackendFactory,
    resolver: Arc<dyn Resolver>,
    related: Arc<dyn RelatedItemsProvider>,
    history: Arc<dyn HistoryStore>,
    ranker: Option<Arc<dyn CandidateRanker>>,
    preferences: Arc<dyn PreferenceSource>,
    config: PlayerConfig,
    events: Option<EventBus>,
    clock: Arc<dyn Clock>,
    controls: Option<ControlsVisibility>,
    record_history: bool,
}

impl PlayerModel {
    pub fn new(
        factory: BackendFactory,
        resolver: Arc<dyn Resolver>,
        related: Arc<dyn RelatedItemsProvider>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            factory,
            resolver,
            related,
            history,
            ranker: None,
            preferences: Arc::new(StaticPreferences::default()),
            config: PlayerConfig::default(),
            events: None,
            clock: Arc::new(SystemClock),
            controls: None,
            record_history: true,
        }
    }

    pub fn with_preferences(mut self, preferences: Arc<dyn PreferenceSource>) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bus to publish events on. A private one is created otherwise.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Controls shown when the user seeks.
    pub fn with_controls(mut self, controls: ControlsVisibility) -> Self {
        self.controls = Some(controls);
        self
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn CandidateRanker>) -> Self {
        self.ranker = Some(ranker);
        self
    }

    pub fn record_history(mut self, enabled: bool) -> Self {
        self.record_history = enabled;
        self
    }

    /// Validates the configuration, reads the preferences and starts the actor.
    pub async fn spawn(self) -> Result<PlayerHandle> {
        self.config.validate().map_err(PlaybackError::Config)?;
        if !self.factory.supports(BackendKind::Engine)
            && !self.factory.supports(BackendKind::Platform)
        {
            return Err(PlaybackError::Config(
                "no media engine was provided".to_string(),
            ));
        }

        let preferences = self.preferences.snapshot().await;
        debug!(?preferences, "Player preferences");

        let (tx, rx) = mpsc::unbounded_channel();
        let weak = tx.downgrade();
        let sink_tx = tx.downgrade();
        let sink = BackendEventSink::new(move |envelope| {
            if let Some(tx) = sink_tx.upgrade() {
                let _ = tx.send(Command::Backend(envelope));
            }
        });
        let backends = BackendSet::new(self.factory, preferences.preferred_backend, sink);

        let mut selector = AutoplaySelector::new(
            self.related,
            Arc::clone(&self.history),
            self.config.max_related_candidates,
            self.config.history_lookback,
        );
        if let Some(ranker) = self.ranker {
            selector = selector.with_ranker(ranker);
        }

        let events = self.events.unwrap_or_else(|| EventBus::new(100));
        let collab = Collaborators {
            resolver: self.resolver,
            history: self.history,
            selector: Arc::new(selector),
            clock: self.clock,
            events: events.clone(),
            controls: self.controls,
            record_history: self.record_history,
        };

        let (snapshot_tx, snapshot_rx) = watch::channel(PlayerSnapshot::default());
        let actor = PlayerActor::new(
            self.config,
            backends,
            collab,
            preferences.default_mode,
            weak,
            snapshot_tx,
        );
        core_async::spawn(actor.run(rx));

        Ok(PlayerHandle {
            tx,
            snapshot: snapshot_rx,
            events,
            preferences: Arc::new(RwLock::new(preferences)),
        })
    }
}

/// Cloneable front end of a running player.
///
/// The actor stops when the last handle is dropped or after
/// [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<PlayerSnapshot>,
    events: EventBus,
    preferences: Arc<RwLock<PlayerPreferences>>,
}

impl PlayerHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| PlaybackError::ActorClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;
        rx.await.map_err(|_| PlaybackError::ActorClosed)
    }

    /// Replaces the current item and starts playing it from the beginning.
    pub fn play_now(&self, item: PlaybackItem) -> Result<()> {
        self.play_from(item, Time::ZERO)
    }

    pub fn play_from(&self, item: PlaybackItem, start: Time) -> Result<()> {
        self.send(Command::PlayNow { item, start })
    }

    /// Appends to the queue. `false` if the video was already queued.
    pub async fn enqueue(&self, item: PlaybackItem) -> Result<bool> {
        self.request(|reply| Command::Enqueue { item, reply }).await
    }

    pub async fn remove(&self, id: &VideoId) -> Result<bool> {
        let id = id.clone();
        self.request(|reply| Command::Remove { id, reply }).await
    }

    /// Empties the queue. The autoplay candidate is kept.
    pub fn remove_all(&self) -> Result<()> {
        self.send(Command::RemoveAll)
    }

    /// Appends previously saved videos. They are resolved when reached.
    pub fn restore(&self, videos: Vec<Video>) -> Result<()> {
        self.send(Command::Restore(videos))
    }

    pub fn play(&self) -> Result<()> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn toggle_play(&self) -> Result<()> {
        self.send(Command::TogglePlay)
    }

    pub fn seek(&self, request: SeekRequest) -> Result<()> {
        self.send(Command::Seek {
            request,
            retried: false,
        })
    }

    /// Moves on to the next item as if the current one had finished.
    pub fn advance(&self) -> Result<()> {
        self.send(Command::Advance)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn set_mode(&self, mode: PlaybackMode) -> Result<()> {
        self.send(Command::SetMode(mode))
    }

    /// Picks a different autoplay candidate than the current one.
    pub fn find_other_autoplay(&self) -> Result<()> {
        self.send(Command::FindOtherAutoplay)
    }

    /// Moves playback to `kind`, keeping the current item and position.
    pub fn switch_backend(&self, kind: BackendKind) -> Result<()> {
        self.preferences.write().preferred_backend = kind;
        self.send(Command::SwitchBackend(kind))
    }

    /// Stops playback, clears the queue and applies new preferences.
    pub fn reset(&self, preferences: PlayerPreferences) -> Result<()> {
        *self.preferences.write() = preferences;
        self.send(Command::Reset(preferences))
    }

    /// Position of the current item, `None` when idle.
    pub async fn current_time(&self) -> Result<Option<Time>> {
        self.request(Command::CurrentTime).await
    }

    /// Resolves once every command sent before it has been applied and the
    /// snapshot reflects it.
    pub async fn flush(&self) -> Result<()> {
        self.request(Command::Flush).await
    }

    /// Stops playback and the actor. Returns the queue for persistence.
    pub async fn shutdown(&self) -> Result<Vec<Video>> {
        self.request(Command::Shutdown).await
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn preferences(&self) -> PlayerPreferences {
        *self.preferences.read()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl TransportControl for PlayerHandle {
    fn seek(&self, request: SeekRequest) {
        if let Err(err) = PlayerHandle::seek(self, request) {
            warn!(error = %err, "Seek gesture dropped");
        }
    }

    fn toggle_play(&self) {
        if let Err(err) = PlayerHandle::toggle_play(self) {
            warn!(error = %err, "Play/pause gesture dropped");
        }
    }

    fn seek_step(&self) -> TimeDelta {
        self.preferences.read().seek_step_delta()
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}
