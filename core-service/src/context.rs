//! The application context.

use bridge_traits::LifecycleState;
use core_async::task::JoinHandle;
use core_playback::related::CandidateRanker;
use core_playback::{
    BackendFactory, ControlsVisibility, GestureRouter, HistoryStore, PlayerConfig, PlayerHandle,
    PlayerModel, PreferenceSource, QueueStore, RelatedItemsProvider, Resolver,
    SettingsPreferences, TransportControl,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{CoreError, Result};
use crate::lifecycle::watch_lifecycle;

/// Application services the player consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn Resolver>,
    pub related: Arc<dyn RelatedItemsProvider>,
    pub history: Arc<dyn HistoryStore>,
    pub ranker: Option<Arc<dyn CandidateRanker>>,
}

impl Collaborators {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        related: Arc<dyn RelatedItemsProvider>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            resolver,
            related,
            history,
            ranker: None,
        }
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn CandidateRanker>) -> Self {
        self.ranker = Some(ranker);
        self
    }
}

/// Everything the UI needs to drive playback, constructed once at app start.
///
/// Owns the player actor, the controls state machine, the gesture router and
/// the lifecycle watcher. Call [`shutdown`](Self::shutdown) at app exit so
/// the queue is persisted.
pub struct PlayerContext {
    player: PlayerHandle,
    controls: ControlsVisibility,
    gestures: GestureRouter,
    events: EventBus,
    queue_store: QueueStore,
    preferences: Arc<SettingsPreferences>,
    restore_queue: bool,
    lifecycle: Option<JoinHandle<()>>,
}

impl PlayerContext {
    /// Starts the player with default timings.
    pub async fn start(config: CoreConfig, collaborators: Collaborators) -> Result<Self> {
        Self::start_with(config, collaborators, PlayerConfig::default()).await
    }

    #[instrument(skip_all)]
    pub async fn start_with(
        config: CoreConfig,
        collaborators: Collaborators,
        player_config: PlayerConfig,
    ) -> Result<Self> {
        config.validate()?;
        player_config
            .validate()
            .map_err(CoreError::InitializationFailed)?;

        let events = EventBus::new(config.event_buffer_size);
        let controls = ControlsVisibility::new(player_config.auto_hide_timeout);
        let preferences = Arc::new(SettingsPreferences::new(Arc::clone(
            &config.settings_store,
        )));
        let factory = BackendFactory::new(
            config.render_engine.clone(),
            config.platform_player.clone(),
        );

        let mut model = PlayerModel::new(
            factory,
            collaborators.resolver,
            collaborators.related,
            collaborators.history,
        )
        .with_preferences(Arc::clone(&preferences) as Arc<dyn PreferenceSource>)
        .with_config(player_config.clone())
        .with_event_bus(events.clone())
        .with_clock(Arc::clone(&config.clock))
        .with_controls(controls.clone())
        .record_history(config.features.record_history);
        if let Some(ranker) = collaborators.ranker {
            model = model.with_ranker(ranker);
        }
        let player = model.spawn().await?;

        let gestures = GestureRouter::new(
            controls.clone(),
            Arc::new(player.clone()) as Arc<dyn TransportControl>,
            player_config.tap_sensitivity,
        );

        let queue_store = QueueStore::new(Arc::clone(&config.settings_store));
        if config.features.restore_queue {
            restore_queue(&queue_store, &player).await?;
        }

        let lifecycle = match &config.lifecycle_observer {
            Some(observer) => {
                let initial = observer.get_state().await.unwrap_or_else(|err| {
                    warn!(error = %err, "Lifecycle state unavailable, assuming foreground");
                    LifecycleState::Foreground
                });
                let changes = observer.subscribe_changes().await?;
                Some(core_async::spawn(watch_lifecycle(
                    changes,
                    initial,
                    player.clone(),
                    controls.clone(),
                    config.features.pause_in_background,
                )))
            }
            None => None,
        };

        info!(
            engine = config.render_engine.is_some(),
            platform = config.platform_player.is_some(),
            features = ?config.features,
            "Player context started"
        );

        Ok(Self {
            player,
            controls,
            gestures,
            events,
            queue_store,
            preferences,
            restore_queue: config.features.restore_queue,
            lifecycle,
        })
    }

    pub fn player(&self) -> &PlayerHandle {
        &self.player
    }

    pub fn controls(&self) -> &ControlsVisibility {
        &self.controls
    }

    pub fn gestures(&self) -> &GestureRouter {
        &self.gestures
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Stops playback, forgets the queue (in memory and persisted) and
    /// applies the new account's preferences.
    #[instrument(skip(self))]
    pub async fn account_changed(&self) -> Result<()> {
        info!("Account changed, resetting player");
        self.queue_store.clear().await?;
        let preferences = self.preferences.snapshot().await;
        self.player.reset(preferences)?;
        self.player.flush().await?;
        Ok(())
    }

    /// Stops the player and persists its queue.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(lifecycle) = self.lifecycle.take() {
            lifecycle.abort();
        }
        let queue = self.player.shutdown().await?;
        if self.restore_queue {
            self.queue_store.save(&queue).await?;
        }
        info!(saved = queue.len(), "Player context shut down");
        Ok(())
    }
}

impl Drop for PlayerContext {
    fn drop(&mut self) {
        if let Some(lifecycle) = self.lifecycle.take() {
            lifecycle.abort();
        }
    }
}

async fn restore_queue(store: &QueueStore, player: &PlayerHandle) -> Result<()> {
    let videos = store.load().await?;
    if videos.is_empty() {
        debug!("No saved queue");
        return Ok(());
    }
    player.restore(videos)?;
    player.flush().await?;
    Ok(())
}

