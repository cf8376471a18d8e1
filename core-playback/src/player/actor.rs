//! The player actor.
//!
//! All player state lives in one task and is mutated only while handling a
//! [`Command`]. UI commands, backend events, resolver results and timer
//! firings all arrive through the same channel, so each one is applied to a
//! consistent state. Every message that belongs to a load carries the
//! [`SessionId`] it was issued for; messages for an older session are dropped.

use bridge_traits::time::Clock;
use core_async::sync::{mpsc, oneshot, watch};
use core_async::time::{Duration, Instant};
use core_async::DelayedTask;
use core_runtime::events::{
    BackendEvent as BackendBusEvent, CoreEvent, EventBus, PlaybackEvent, QueueEvent,
    SwitchReason,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::backend::{
    BackendEnvelope, BackendEvent, BackendKind, BackendSet, LoadRequest, PlaybackBackend,
    SessionId,
};
use crate::collaborators::{HistoryStore, Resolver, WatchRecord};
use crate::config::PlayerConfig;
use crate::controls::ControlsVisibility;
use crate::error::{BackendFailure, FailureKind, LoadError, ResolutionError, SeekError};
use crate::item::{PlaybackItem, Video, VideoId};
use crate::player::messages::Command;
use crate::player::state::{PlaybackState, PlayerSnapshot};
use crate::preferences::PlayerPreferences;
use crate::queue::{PlaybackMode, QueueEngine};
use crate::related::AutoplaySelector;
use crate::seek::SeekCoalescer;
use crate::time::{SeekOrigin, SeekRequest, SeekTarget, Time};

/// Services the actor calls out to.
pub(crate) struct Collaborators {
    pub resolver: Arc<dyn Resolver>,
    pub history: Arc<dyn HistoryStore>,
    pub selector: Arc<AutoplaySelector>,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
    pub controls: Option<ControlsVisibility>,
    pub record_history: bool,
}

/// Why the player moves on from the current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advance {
    Finished,
    Failed,
    Skipped,
    User,
}

#[derive(Debug)]
struct Current {
    item: PlaybackItem,
    session: SessionId,
    state: PlaybackState,
    /// Backend the latest load was handed to. `None` while resolving.
    backend: Option<BackendKind>,
    time: Time,
    duration: Option<Time>,
    buffering: bool,
    /// Start playing once ready. Updated by play/pause while loading.
    autoplay: bool,
    start: Time,
    load_retried: bool,
    fell_back: bool,
    started: bool,
}

impl Current {
    fn id(&self) -> String {
        self.item.id().to_string()
    }

    fn wants_playing(&self) -> bool {
        match self.state {
            PlaybackState::Playing => true,
            PlaybackState::Loading => self.autoplay,
            _ => false,
        }
    }
}

pub(crate) struct PlayerActor {
    config: PlayerConfig,
    backends: BackendSet,
    queue: QueueEngine,
    collab: Collaborators,
    tx: mpsc::WeakUnboundedSender<Command>,
    snapshot: watch::Sender<PlayerSnapshot>,
    mode: PlaybackMode,
    current: Option<Current>,
    next_session: u64,
    coalescer: SeekCoalescer,
    watchdog: Option<DelayedTask>,
    retry: Option<DelayedTask>,
    /// A seek waiting for the backend, applied on its retry or on `Ready`.
    seek_retry: Option<(SeekRequest, DelayedTask)>,
    autoplay_generation: u64,
    last_position_event: Option<Instant>,
}

impl PlayerActor {
    pub(crate) fn new(
        config: PlayerConfig,
        backends: BackendSet,
        collab: Collaborators,
        mode: PlaybackMode,
        tx: mpsc::WeakUnboundedSender<Command>,
        snapshot: watch::Sender<PlayerSnapshot>,
    ) -> Self {
        let coalescer = SeekCoalescer::new(config.seek_coalesce_window);
        Self {
            config,
            backends,
            queue: QueueEngine::new(),
            collab,
            tx,
            snapshot,
            mode,
            current: None,
            next_session: 0,
            coalescer,
            watchdog: None,
            retry: None,
            seek_retry: None,
            autoplay_generation: 0,
            last_position_event: None,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!(backend = %self.backends.active_kind(), mode = %self.mode, "Player started");
        self.publish();
        while let Some(command) = rx.recv().await {
            let shutdown = matches!(command, Command::Shutdown(_));
            self.handle(command).await;
            self.publish();
            if shutdown {
                break;
            }
        }
        self.cancel_timers();
        self.stop_backend().await;
        info!("Player stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::PlayNow { item, start } => self.begin_item(item, start, true).await,
            Command::Enqueue { item, reply } => {
                let _ = reply.send(self.enqueue(item));
            }
            Command::Remove { id, reply } => {
                let removed = self.queue.remove(&id);
                if removed {
                    self.emit(CoreEvent::Queue(QueueEvent::ItemRemoved {
                        video_id: id.to_string(),
                    }));
                }
                let _ = reply.send(removed);
            }
            Command::RemoveAll => {
                self.queue.remove_all();
                self.emit(CoreEvent::Queue(QueueEvent::Cleared));
            }
            Command::Restore(videos) => self.restore(videos),
            Command::Play => self.set_playing(true).await,
            Command::Pause => self.set_playing(false).await,
            Command::TogglePlay => {
                let playing = self
                    .current
                    .as_ref()
                    .is_some_and(Current::wants_playing);
                self.set_playing(!playing).await;
            }
            Command::Seek { request, retried } => {
                if retried {
                    self.seek_retry = None;
                    self.apply_seek(request, true).await;
                } else {
                    self.seek(request).await;
                }
            }
            Command::Advance => {
                if self.current.is_some() {
                    self.advance(Advance::User).await;
                } else {
                    self.start_from_queue().await;
                }
            }
            Command::Stop => {
                if self.current.is_some() {
                    self.go_idle().await;
                }
            }
            Command::SetMode(mode) => self.set_mode(mode),
            Command::FindOtherAutoplay => {
                let exclude = self.queue.autoplay_candidate().map(|item| item.id().clone());
                self.recompute_autoplay(exclude);
            }
            Command::SwitchBackend(kind) => self.switch_to(kind, SwitchReason::Preference).await,
            Command::Reset(preferences) => self.reset(preferences).await,
            Command::CurrentTime(reply) => {
                let _ = reply.send(self.current.as_ref().map(|current| current.time));
            }
            Command::Flush(reply) => {
                self.publish();
                let _ = reply.send(());
            }
            Command::Shutdown(reply) => self.shutdown(reply).await,

            Command::Backend(envelope) => self.on_backend_event(envelope).await,
            Command::Resolved { session, result } => self.on_resolved(session, result).await,
            Command::LoadFailed { session, error } => self.on_load_failed(session, error).await,
            Command::Watchdog(session) => {
                if self.is_loading(session) {
                    warn!(session = %session, timeout = ?self.config.load_timeout, "Load timed out");
                    self.fail_current("Timed out waiting for the video to load".to_string())
                        .await;
                }
            }
            Command::RetryLoad(session) => {
                if self.is_loading(session) {
                    debug!(session = %session, "Retrying load");
                    self.start_load().await;
                }
            }
            Command::CoalescedSeek(generation) => {
                if let Some(delta) = self.coalescer.take(generation) {
                    let request = SeekRequest::relative(delta, SeekOrigin::UserInteracted);
                    self.apply_seek(request, false).await;
                }
            }
            Command::AutoplaySelected {
                generation,
                for_id,
                candidate,
            } => self.on_autoplay_selected(generation, for_id, candidate),
        }
    }

    // ------------------------------------------------------------------
    // Items and loads
    // ------------------------------------------------------------------

    #[instrument(skip(self, item), fields(video_id = %item.id()))]
    async fn begin_item(&mut self, item: PlaybackItem, start: Time, autoplay: bool) {
        self.cancel_timers();
        self.coalescer.discard();
        let session = self.allocate_session();
        info!(session = %session, start = %start, "Starting item");

        let resolved = item.is_resolved();
        self.current = Some(Current {
            duration: item.video.length,
            item,
            session,
            state: PlaybackState::Loading,
            backend: None,
            time: start,
            buffering: false,
            autoplay,
            start,
            load_retried: false,
            fell_back: false,
            started: false,
        });
        self.last_position_event = None;
        self.arm_watchdog(session);

        if self.mode == PlaybackMode::Related {
            self.clear_candidate();
            self.recompute_autoplay(None);
        }

        if resolved {
            self.start_load().await;
        } else {
            self.spawn_resolve(session);
        }
    }

    fn spawn_resolve(&self, session: SessionId) {
        let Some(current) = self.current.as_ref() else {
            return;
        };
        let id = current.item.id().clone();
        let resolver = Arc::clone(&self.collab.resolver);
        let tx = self.tx.clone();
        debug!(session = %session, video_id = %id, "Resolving stream");
        core_async::spawn(async move {
            let result = resolver.resolve(&id).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::Resolved { session, result });
            }
        });
    }

    async fn on_resolved(
        &mut self,
        session: SessionId,
        result: Result<PlaybackItem, ResolutionError>,
    ) {
        if !self.is_loading(session) {
            trace!(session = %session, "Dropping stale resolution");
            return;
        }
        let result = result.and_then(|item| {
            if item.is_resolved() {
                Ok(item)
            } else {
                Err(ResolutionError::NoPlayableStream(item.id().clone()))
            }
        });
        match result {
            Ok(item) => {
                if let Some(current) = self.current.as_mut() {
                    if current.duration.is_none() {
                        current.duration = item.video.length;
                    }
                    current.item = item;
                }
                self.start_load().await;
            }
            Err(err) => {
                let video_id = self.current.as_ref().map(Current::id).unwrap_or_default();
                warn!(video_id = %video_id, error = %err, "Skipping unresolvable item");
                self.cancel_timers();
                self.emit(CoreEvent::Playback(PlaybackEvent::Skipped {
                    video_id,
                    reason: err.to_string(),
                }));
                self.advance(Advance::Skipped).await;
            }
        }
    }

    /// Hands the current item to the active backend. Failures come back as
    /// [`Command::LoadFailed`].
    async fn start_load(&mut self) {
        let Some(current) = self.current.as_ref() else {
            return;
        };
        let request = LoadRequest {
            session: current.session,
            item: current.item.clone(),
            start: current.start,
            autoplay: current.autoplay,
        };
        let session = request.session;

        let backend = match self.backends.active().await {
            Ok(backend) => backend,
            Err(err) => {
                self.post(Command::LoadFailed {
                    session,
                    error: LoadError::Backend(err),
                });
                return;
            }
        };
        if let Some(current) = self.current.as_mut() {
            current.backend = Some(backend.kind());
        }

        debug!(session = %session, backend = %backend.kind(), "Loading");
        if let Err(error) = backend.load(request).await {
            self.post(Command::LoadFailed { session, error });
        }
    }

    async fn on_load_failed(&mut self, session: SessionId, error: LoadError) {
        if !self.is_loading(session) {
            return;
        }
        let retry = match self.current.as_mut() {
            Some(current) if error.is_transient() && !current.load_retried => {
                current.load_retried = true;
                true
            }
            _ => false,
        };
        if retry {
            warn!(session = %session, error = %error, delay = ?self.config.retry_delay, "Load failed, retrying");
            self.retry = Some(self.send_later(self.config.retry_delay, Command::RetryLoad(session)));
            return;
        }
        match error {
            LoadError::UnsupportedFormat(message) => {
                self.handle_failure(BackendFailure::new(FailureKind::Decode, message))
                    .await
            }
            other => self.fail_current(other.to_string()).await,
        }
    }

    // ------------------------------------------------------------------
    // Backend events
    // ------------------------------------------------------------------

    async fn on_backend_event(&mut self, envelope: BackendEnvelope) {
        let BackendEnvelope {
            backend,
            session,
            event,
        } = envelope;
        let Some(current) = self.current.as_mut() else {
            trace!(session = %session, "Dropping backend event with nothing loaded");
            return;
        };
        if current.session != session || current.backend != Some(backend) {
            trace!(session = %session, backend = %backend, ?event, "Dropping stale backend event");
            return;
        }

        match event {
            BackendEvent::Ready { duration } => {
                if current.state != PlaybackState::Loading {
                    return;
                }
                current.state = if current.autoplay {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Paused
                };
                if duration.is_some() {
                    current.duration = duration;
                }
                let first = !current.started;
                current.started = true;
                let video = current.item.video.clone();
                info!(session = %session, backend = %backend, state = %current.state, "Ready");

                self.cancel_load_timers();
                if first {
                    self.emit(CoreEvent::Playback(PlaybackEvent::Started {
                        video_id: video.id.to_string(),
                        title: video.title.clone(),
                    }));
                    if self.collab.record_history {
                        self.record_watch(&video);
                    }
                }
                if let Some((request, timer)) = self.seek_retry.take() {
                    timer.cancel();
                    debug!(?request, "Applying deferred seek");
                    self.apply_seek(request, true).await;
                }
            }
            BackendEvent::TimeDidChange(time) => {
                current.time = time;
                let (video_id, duration) = (current.id(), current.duration);
                self.maybe_emit_position(video_id, time, duration);
            }
            BackendEvent::DurationChanged(duration) => {
                current.duration = duration;
            }
            BackendEvent::BufferingStateChanged(buffering) => {
                if current.buffering == buffering {
                    return;
                }
                current.buffering = buffering;
                let video_id = current.id();
                self.emit(CoreEvent::Playback(PlaybackEvent::Buffering {
                    video_id,
                    buffering,
                }));
            }
            BackendEvent::PlayingChanged(playing) => match current.state {
                PlaybackState::Loading => current.autoplay = playing,
                PlaybackState::Playing | PlaybackState::Paused => {
                    let state = if playing {
                        PlaybackState::Playing
                    } else {
                        PlaybackState::Paused
                    };
                    if current.state == state {
                        return;
                    }
                    debug!(session = %session, state = %state, "Playing state changed externally");
                    current.state = state;
                    let (video_id, position_ms) = (current.id(), current.time.as_millis());
                    self.emit(CoreEvent::Playback(if playing {
                        PlaybackEvent::Resumed {
                            video_id,
                            position_ms,
                        }
                    } else {
                        PlaybackEvent::Paused {
                            video_id,
                            position_ms,
                        }
                    }));
                }
                _ => {}
            },
            BackendEvent::DidFinish => {
                if !current.state.is_active() {
                    return;
                }
                current.state = PlaybackState::Finished;
                let video_id = current.id();
                info!(session = %session, video_id = %video_id, "Finished");
                self.emit(CoreEvent::Playback(PlaybackEvent::Completed { video_id }));
                self.advance(Advance::Finished).await;
            }
            BackendEvent::DidFail(failure) => self.handle_failure(failure).await,
        }
    }

    fn maybe_emit_position(&mut self, video_id: String, time: Time, duration: Option<Time>) {
        let now = Instant::now();
        let due = self
            .last_position_event
            .map_or(true, |last| now.duration_since(last) >= self.config.position_event_interval);
        if due {
            self.last_position_event = Some(now);
            self.emit(CoreEvent::Playback(PlaybackEvent::PositionChanged {
                video_id,
                position_ms: time.as_millis(),
                duration_ms: duration.map(|d| d.as_millis()),
            }));
        }
    }

    fn record_watch(&self, video: &Video) {
        let record = WatchRecord {
            video_id: video.id.clone(),
            title: video.title.clone(),
            watched_at: self.collab.clock.now(),
        };
        let history = Arc::clone(&self.collab.history);
        core_async::spawn(async move {
            if let Err(err) = history.record_watch(record).await {
                warn!(error = %err, "Failed to record watch history");
            }
        });
    }

    /// Falls back to the other backend once per item on a decode failure;
    /// anything else ends the item.
    async fn handle_failure(&mut self, failure: BackendFailure) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        let alternate = self.backends.active_kind().alternate();
        if failure.is_fatal_decode() && !current.fell_back && self.backends.supports(alternate) {
            current.fell_back = true;
            warn!(
                session = %current.session,
                from = %self.backends.active_kind(),
                to = %alternate,
                error = %failure,
                "Decode failure, falling back"
            );
            self.switch_to(alternate, SwitchReason::DecodeFallback).await;
        } else {
            self.fail_current(failure.to_string()).await;
        }
    }

    async fn fail_current(&mut self, message: String) {
        self.cancel_timers();
        let Some(current) = self.current.as_mut() else {
            return;
        };
        current.state = PlaybackState::Failed;
        let video_id = current.id();
        error!(session = %current.session, video_id = %video_id, message = %message, "Playback failed");
        self.emit(CoreEvent::Playback(PlaybackEvent::Error {
            video_id: Some(video_id),
            message,
            recoverable: false,
        }));
        self.publish();
        self.stop_backend().await;
        self.advance(Advance::Failed).await;
    }

    // ------------------------------------------------------------------
    // Queue progression
    // ------------------------------------------------------------------

    async fn advance(&mut self, cause: Advance) {
        let finished = self.current.as_ref().map(|current| current.item.clone());
        let next = match (self.mode, cause) {
            (PlaybackMode::RepeatOne, Advance::Finished) => finished,
            (PlaybackMode::RepeatAll, Advance::Finished | Advance::User) => {
                match self.queue.dequeue_next() {
                    Some(next) => {
                        if let Some(finished) = finished {
                            self.enqueue(finished.without_stream());
                        }
                        Some(next)
                    }
                    None => finished,
                }
            }
            (PlaybackMode::Related, _) => match self.queue.dequeue_next() {
                Some(next) => Some(next),
                None => self.take_candidate(),
            },
            _ => self.queue.dequeue_next(),
        };

        match next {
            Some(item) => {
                debug!(cause = ?cause, mode = %self.mode, next = %item.id(), "Advancing");
                self.begin_item(item, Time::ZERO, true).await;
            }
            None => {
                debug!(cause = ?cause, mode = %self.mode, "Nothing left to play");
                self.go_idle().await;
            }
        }
    }

    async fn start_from_queue(&mut self) {
        let next = match self.queue.dequeue_next() {
            Some(next) => Some(next),
            None if self.mode == PlaybackMode::Related => self.take_candidate(),
            None => None,
        };
        if let Some(item) = next {
            self.begin_item(item, Time::ZERO, true).await;
        }
    }

    async fn go_idle(&mut self) {
        self.cancel_timers();
        self.coalescer.discard();
        self.autoplay_generation += 1;
        let previous = self.current.take();
        self.stop_backend().await;
        self.emit(CoreEvent::Playback(PlaybackEvent::Stopped {
            video_id: previous.map(|current| current.id()),
        }));
    }

    fn enqueue(&mut self, item: PlaybackItem) -> bool {
        let video_id = item.id().to_string();
        if !self.queue.enqueue(item) {
            debug!(video_id = %video_id, "Already queued");
            return false;
        }
        self.emit(CoreEvent::Queue(QueueEvent::ItemAdded {
            video_id,
            position: self.queue.len() - 1,
        }));
        true
    }

    fn restore(&mut self, videos: Vec<Video>) {
        let count = videos
            .into_iter()
            .filter(|video| self.queue.enqueue(PlaybackItem::unresolved(video.clone())))
            .count();
        info!(count, "Queue restored");
        self.emit(CoreEvent::Queue(QueueEvent::Restored { count }));
    }

    fn set_mode(&mut self, mode: PlaybackMode) {
        if self.mode == mode {
            return;
        }
        info!(from = %self.mode, to = %mode, "Playback mode changed");
        self.mode = mode;
        if mode == PlaybackMode::Related {
            self.recompute_autoplay(None);
        } else {
            self.autoplay_generation += 1;
            self.clear_candidate();
        }
    }

    // ------------------------------------------------------------------
    // Autoplay candidate
    // ------------------------------------------------------------------

    fn recompute_autoplay(&mut self, exclude: Option<VideoId>) {
        self.autoplay_generation += 1;
        let Some(current) = self.current.as_ref() else {
            return;
        };
        let generation = self.autoplay_generation;
        let for_id = current.item.id().clone();
        let selector = Arc::clone(&self.collab.selector);
        let tx = self.tx.clone();
        core_async::spawn(async move {
            let candidate = selector.select(&for_id, exclude.as_ref()).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::AutoplaySelected {
                    generation,
                    for_id,
                    candidate,
                });
            }
        });
    }

    fn on_autoplay_selected(
        &mut self,
        generation: u64,
        for_id: VideoId,
        candidate: Option<Video>,
    ) {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|current| current.item.id() == &for_id);
        if generation != self.autoplay_generation || !is_current {
            trace!(generation, "Dropping stale autoplay selection");
            return;
        }
        let unchanged = match (self.queue.autoplay_candidate(), &candidate) {
            (Some(existing), Some(video)) => existing.id() == &video.id,
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        let video_id = candidate.as_ref().map(|video| video.id.to_string());
        debug!(for_id = %for_id, candidate = ?video_id, "Autoplay candidate selected");
        self.queue
            .set_autoplay_candidate(candidate.map(PlaybackItem::unresolved));
        self.emit(CoreEvent::Queue(QueueEvent::AutoplayCandidateChanged { video_id }));
    }

    fn take_candidate(&mut self) -> Option<PlaybackItem> {
        let candidate = self.queue.take_autoplay_candidate()?;
        self.emit(CoreEvent::Queue(QueueEvent::AutoplayCandidateChanged { video_id: None }));
        Some(candidate)
    }

    fn clear_candidate(&mut self) {
        if self.queue.autoplay_candidate().is_some() {
            self.queue.clear_autoplay_candidate();
            self.emit(CoreEvent::Queue(QueueEvent::AutoplayCandidateChanged { video_id: None }));
        }
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    async fn set_playing(&mut self, playing: bool) {
        if self.current.is_none() {
            if playing {
                self.start_from_queue().await;
            }
            return;
        }
        let backend = self.addressee();
        let Some(current) = self.current.as_mut() else {
            return;
        };

        let event = match current.state {
            PlaybackState::Loading => {
                current.autoplay = playing;
                None
            }
            PlaybackState::Playing | PlaybackState::Paused => {
                let state = if playing {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Paused
                };
                if current.state == state {
                    return;
                }
                current.state = state;
                let (video_id, position_ms) = (current.id(), current.time.as_millis());
                Some(if playing {
                    PlaybackEvent::Resumed {
                        video_id,
                        position_ms,
                    }
                } else {
                    PlaybackEvent::Paused {
                        video_id,
                        position_ms,
                    }
                })
            }
            _ => return,
        };

        if let Some(backend) = backend {
            let result = if playing {
                backend.play().await
            } else {
                backend.pause().await
            };
            if let Err(err) = result {
                debug!(playing, error = %err, "Backend did not take transport command");
            }
        }
        if let Some(event) = event {
            self.emit(CoreEvent::Playback(event));
        }
    }

    async fn seek(&mut self, request: SeekRequest) {
        if request.origin == SeekOrigin::UserInteracted {
            if let Some(controls) = &self.collab.controls {
                controls.show();
            }
        }
        if self.current.is_none() {
            debug!(?request, "Seek with nothing loaded");
            return;
        }

        if request.is_coalescable() {
            if let SeekTarget::Relative(delta) = request.target {
                let tx = self.tx.clone();
                let pending = self.coalescer.push(delta, move |generation| {
                    if let Some(tx) = tx.upgrade() {
                        let _ = tx.send(Command::CoalescedSeek(generation));
                    }
                });
                trace!(pending = %pending, "Seek coalesced");
            }
            return;
        }

        if matches!(request.target, SeekTarget::Absolute(_)) {
            if let Some(dropped) = self.coalescer.discard() {
                debug!(dropped = %dropped, "Absolute seek replaces pending relative seeks");
            }
        }
        self.apply_seek(request, false).await;
    }

    /// Clamps `request` to the current item and sends it to the backend as
    /// an absolute seek.
    async fn apply_seek(&mut self, request: SeekRequest, retried: bool) {
        let backend = self.addressee();
        let Some(current) = self.current.as_ref() else {
            return;
        };
        let target = request.clamped(current.time, current.duration);
        let origin = request.origin;
        let video_id = current.id();

        let backend = match backend {
            Some(backend) if current.state.is_active() => backend,
            _ => {
                self.seek_not_ready(SeekRequest::absolute(target, origin), retried, video_id);
                return;
            }
        };

        let mut landed = target;
        let mut result = backend.seek(SeekRequest::absolute(target, origin)).await;
        if let Err(SeekError::OutOfRange { bound, .. }) = &result {
            debug!(target = %target, bound = %bound, "Seek out of range, clamping");
            landed = *bound;
            result = backend.seek(SeekRequest::absolute(landed, origin)).await;
        }

        match result {
            Ok(()) => {
                let Some(current) = self.current.as_mut() else {
                    return;
                };
                current.time = landed;
                let duration = current.duration;
                debug!(position = %landed, ?origin, "Seeked");
                self.last_position_event = Some(Instant::now());
                self.emit(CoreEvent::Playback(PlaybackEvent::PositionChanged {
                    video_id,
                    position_ms: landed.as_millis(),
                    duration_ms: duration.map(|d| d.as_millis()),
                }));
            }
            Err(SeekError::NotReady) => {
                self.seek_not_ready(SeekRequest::absolute(landed, origin), retried, video_id)
            }
            Err(err) => {
                warn!(error = %err, "Seek failed");
                self.emit(CoreEvent::Playback(PlaybackEvent::Error {
                    video_id: Some(video_id),
                    message: err.to_string(),
                    recoverable: true,
                }));
            }
        }
    }

    fn seek_not_ready(&mut self, request: SeekRequest, retried: bool, video_id: String) {
        if retried {
            warn!(video_id = %video_id, "Seek failed, backend not ready");
            self.emit(CoreEvent::Playback(PlaybackEvent::Error {
                video_id: Some(video_id),
                message: SeekError::NotReady.to_string(),
                recoverable: true,
            }));
            return;
        }
        debug!(delay = ?self.config.retry_delay, "Backend not ready, retrying seek");
        let timer = self.send_later(
            self.config.retry_delay,
            Command::Seek {
                request,
                retried: true,
            },
        );
        self.seek_retry = Some((request, timer));
    }

    // ------------------------------------------------------------------
    // Backends
    // ------------------------------------------------------------------

    /// Makes `kind` active and reloads the current item on it at the last
    /// known position. The old backend is stopped after the new load starts.
    async fn switch_to(&mut self, kind: BackendKind, reason: SwitchReason) {
        let from = self.backends.active_kind();
        if from == kind {
            return;
        }
        let previous = match self.backends.set_active(kind) {
            Ok(previous) => previous,
            Err(err) => {
                warn!(to = %kind, error = %err, "Cannot switch backend");
                self.emit(CoreEvent::Playback(PlaybackEvent::Error {
                    video_id: self.current.as_ref().map(Current::id),
                    message: err.to_string(),
                    recoverable: true,
                }));
                return;
            }
        };

        let position = self.current.as_ref().map_or(Time::ZERO, |current| current.time);
        info!(from = %from, to = %kind, position = %position, ?reason, "Switching backend");
        self.emit(CoreEvent::Backend(BackendBusEvent::Switched {
            from: from.to_string(),
            to: kind.to_string(),
            position_ms: position.as_millis(),
            reason,
        }));

        if self.current.is_some() {
            self.cancel_timers();
            self.coalescer.discard();
            let session = self.allocate_session();
            let resolved = match self.current.as_mut() {
                Some(current) => {
                    current.autoplay = current.wants_playing();
                    current.session = session;
                    current.state = PlaybackState::Loading;
                    current.start = current.time;
                    current.backend = None;
                    current.buffering = false;
                    current.load_retried = false;
                    current.item.is_resolved()
                }
                None => false,
            };
            self.arm_watchdog(session);
            if resolved {
                self.start_load().await;
            } else {
                self.spawn_resolve(session);
            }
        }

        if let Some(previous) = previous {
            if let Err(err) = previous.stop().await {
                warn!(backend = %from, error = %err, "Failed to stop previous backend");
            }
        }
    }

    /// The active backend, if it received the latest load.
    fn addressee(&self) -> Option<Arc<dyn PlaybackBackend>> {
        let kind = self.current.as_ref()?.backend?;
        if kind != self.backends.active_kind() {
            return None;
        }
        self.backends.active_if_created()
    }

    async fn stop_backend(&self) {
        if let Some(backend) = self.backends.active_if_created() {
            if let Err(err) = backend.stop().await {
                warn!(backend = %backend.kind(), error = %err, "Failed to stop backend");
            }
        }
    }

    async fn reset(&mut self, preferences: PlayerPreferences) {
        info!(?preferences, "Resetting player");
        if self.current.is_some() {
            self.go_idle().await;
        }
        self.queue.remove_all();
        self.emit(CoreEvent::Queue(QueueEvent::Cleared));
        self.clear_candidate();
        self.autoplay_generation += 1;
        self.mode = preferences.default_mode;

        let preferred = preferences.preferred_backend;
        let target = if self.backends.supports(preferred) {
            preferred
        } else {
            preferred.alternate()
        };
        if target != self.backends.active_kind() {
            self.switch_to(target, SwitchReason::Preference).await;
        }
    }

    async fn shutdown(&mut self, reply: oneshot::Sender<Vec<Video>>) {
        let videos = self.queue.videos();
        info!(queued = videos.len(), "Shutting down player");
        if self.current.is_some() {
            self.go_idle().await;
        }
        let _ = reply.send(videos);
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn allocate_session(&mut self) -> SessionId {
        self.next_session += 1;
        SessionId(self.next_session)
    }

    fn is_loading(&self, session: SessionId) -> bool {
        self.current.as_ref().is_some_and(|current| {
            current.session == session && current.state == PlaybackState::Loading
        })
    }

    fn arm_watchdog(&mut self, session: SessionId) {
        self.watchdog = Some(self.send_later(self.config.load_timeout, Command::Watchdog(session)));
    }

    fn cancel_timers(&mut self) {
        self.cancel_load_timers();
        if let Some((_, timer)) = self.seek_retry.take() {
            timer.cancel();
        }
    }

    fn cancel_load_timers(&mut self) {
        for timer in [self.watchdog.take(), self.retry.take()]
            .into_iter()
            .flatten()
        {
            timer.cancel();
        }
    }

    fn send_later(&self, delay: Duration, command: Command) -> DelayedTask {
        let tx = self.tx.clone();
        DelayedTask::schedule(delay, move || {
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(command);
            }
        })
    }

    fn post(&self, command: Command) {
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(command);
        }
    }

    fn emit(&self, event: CoreEvent) {
        if self.collab.events.emit(event).is_err() {
            trace!("No event subscribers");
        }
    }

    fn publish(&self) {
        let snapshot = match self.current.as_ref() {
            Some(current) => PlayerSnapshot {
                current: Some(current.item.video.clone()),
                state: current.state,
                time: current.time,
                duration: current.duration,
                buffering: current.buffering,
                chapter: current.item.video.chapter_at(current.time),
                ..self.idle_snapshot()
            },
            None => self.idle_snapshot(),
        };
        self.snapshot.send_if_modified(|published| {
            if *published == snapshot {
                false
            } else {
                *published = snapshot;
                true
            }
        });
    }

    fn idle_snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            queue: self.queue.videos(),
            autoplay_candidate: self
                .queue
                .autoplay_candidate()
                .map(|item| item.video.clone()),
            mode: self.mode,
            backend: Some(self.backends.active_kind()),
            ..PlayerSnapshot::default()
        }
    }
}
