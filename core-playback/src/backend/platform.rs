//! Backend over the native platform player.
//!
//! The platform player is item/rate driven. A load replaces the current item
//! and waits for `ReadyToPlay`; the start position is then applied with a seek
//! and the rate set to 1.0 when playback was requested. Notifications carry
//! the item they belong to, and anything for an item other than the current
//! one is dropped.

use async_trait::async_trait;
use bridge_traits::{
    MediaTimestamp, PlatformErrorDomain, PlatformFailure, PlatformPlayer, PlatformPlayerEvent,
    PlatformPlayerEventStream, PlayerItemId, PlayerItemSource, PlayerItemStatus, SeekTolerance,
};
use core_async::sync::mpsc;
use core_async::task::JoinHandle;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::{
    BackendEnvelope, BackendEvent, BackendEventSink, BackendKind, LoadRequest, PlaybackBackend,
    PlayingEchoes, SessionId,
};
use crate::error::{BackendError, BackendFailure, FailureKind, LoadError, SeekError};
use crate::time::{SeekOrigin, SeekRequest, Time};

/// Item notifications that arrive before `replace_current_item` returned are
/// kept until the item id is known. Bounded so a misbehaving host cannot grow it.
const MAX_EARLY_EVENTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// `replace_current_item` in flight, item id not known yet.
    AwaitingItem,
    Opening,
    /// `ReadyToPlay` seen, start position being applied.
    Preparing,
    Ready,
    Ended,
}

#[derive(Debug)]
struct PlatformState {
    session: Option<SessionId>,
    item: Option<PlayerItemId>,
    phase: Phase,
    playing: bool,
    echoes: PlayingEchoes,
    start: Time,
    time: Time,
    duration: Option<Time>,
    early: Vec<PlatformPlayerEvent>,
}

/// What the pump must do after applying a notification.
#[derive(Debug, PartialEq)]
enum Effect {
    Emit(BackendEvent),
    /// Seek to the start position, then set the rate, then report ready.
    Prepare {
        session: SessionId,
        item: PlayerItemId,
        start: Time,
    },
}

impl PlatformState {
    fn new() -> Self {
        Self {
            session: None,
            item: None,
            phase: Phase::Idle,
            playing: false,
            echoes: PlayingEchoes::default(),
            start: Time::ZERO,
            time: Time::ZERO,
            duration: None,
            early: Vec::new(),
        }
    }

    fn is_current(&self, item: PlayerItemId) -> bool {
        self.item == Some(item)
    }

    fn is_live(&self) -> bool {
        matches!(self.phase, Phase::Opening | Phase::Preparing | Phase::Ready)
    }

    fn end(&mut self) {
        self.phase = Phase::Ended;
        self.playing = false;
    }

    fn apply(&mut self, event: PlatformPlayerEvent) -> Option<Effect> {
        if self.phase == Phase::AwaitingItem && item_of(&event).is_some() {
            if self.early.len() < MAX_EARLY_EVENTS {
                self.early.push(event);
            }
            return None;
        }

        match event {
            PlatformPlayerEvent::StatusChanged { item, status } if self.is_current(item) => {
                match status {
                    PlayerItemStatus::ReadyToPlay if self.phase == Phase::Opening => {
                        self.phase = Phase::Preparing;
                        Some(Effect::Prepare {
                            session: self.session?,
                            item,
                            start: self.start,
                        })
                    }
                    PlayerItemStatus::Failed(failure) if self.is_live() => {
                        self.end();
                        Some(Effect::Emit(BackendEvent::DidFail(classify(failure))))
                    }
                    _ => None,
                }
            }
            PlatformPlayerEvent::RateChanged(rate) if self.session.is_some() => {
                let observed = rate > 0.0;
                if self.echoes.absorb(observed, self.playing) {
                    None
                } else {
                    self.playing = observed;
                    Some(Effect::Emit(BackendEvent::PlayingChanged(observed)))
                }
            }
            PlatformPlayerEvent::PeriodicTime(timestamp) if self.phase == Phase::Ready => {
                let seconds = timestamp.seconds()?;
                self.time = Time::from_secs_f64(seconds);
                Some(Effect::Emit(BackendEvent::TimeDidChange(self.time)))
            }
            PlatformPlayerEvent::DidPlayToEnd { item }
                if self.is_current(item) && self.phase == Phase::Ready =>
            {
                self.end();
                Some(Effect::Emit(BackendEvent::DidFinish))
            }
            PlatformPlayerEvent::FailedToPlayToEnd { item, failure }
                if self.is_current(item) && self.is_live() =>
            {
                self.end();
                Some(Effect::Emit(BackendEvent::DidFail(classify(failure))))
            }
            PlatformPlayerEvent::PlaybackStalled { item }
                if self.is_current(item) && self.is_live() =>
            {
                Some(Effect::Emit(BackendEvent::BufferingStateChanged(true)))
            }
            PlatformPlayerEvent::LikelyToKeepUp { item, value }
                if self.is_current(item) && self.is_live() =>
            {
                Some(Effect::Emit(BackendEvent::BufferingStateChanged(!value)))
            }
            _ => None,
        }
    }
}

fn item_of(event: &PlatformPlayerEvent) -> Option<PlayerItemId> {
    match event {
        PlatformPlayerEvent::StatusChanged { item, .. }
        | PlatformPlayerEvent::DidPlayToEnd { item }
        | PlatformPlayerEvent::FailedToPlayToEnd { item, .. }
        | PlatformPlayerEvent::PlaybackStalled { item }
        | PlatformPlayerEvent::LikelyToKeepUp { item, .. } => Some(*item),
        PlatformPlayerEvent::RateChanged(_) | PlatformPlayerEvent::PeriodicTime(_) => None,
    }
}

fn classify(failure: PlatformFailure) -> BackendFailure {
    let kind = match failure.domain {
        PlatformErrorDomain::Decoder => FailureKind::Decode,
        PlatformErrorDomain::Network => FailureKind::Network,
        PlatformErrorDomain::Unknown => FailureKind::Unknown,
    };
    BackendFailure::new(kind, failure.message)
}

fn to_timestamp(time: Time) -> MediaTimestamp {
    MediaTimestamp::from_seconds(time.as_secs_f64())
}

fn from_timestamp(timestamp: MediaTimestamp) -> Option<Time> {
    timestamp.seconds().map(Time::from_secs_f64)
}

#[derive(Clone)]
struct Shared {
    player: Arc<dyn PlatformPlayer>,
    state: Arc<Mutex<PlatformState>>,
    sink: BackendEventSink,
}

impl Shared {
    fn emit(&self, session: SessionId, event: BackendEvent) {
        self.sink.emit(BackendEnvelope {
            backend: BackendKind::Platform,
            session,
            event,
        });
    }

    fn still_current(&self, session: SessionId, item: PlayerItemId) -> bool {
        let state = self.state.lock();
        state.session == Some(session) && state.is_current(item)
    }

    async fn prepare(&self, session: SessionId, item: PlayerItemId, start: Time) {
        if start > Time::ZERO {
            match self.player.seek(to_timestamp(start), SeekTolerance::Exact).await {
                Ok(_) => {}
                Err(err) => warn!(session = %session, error = %err, "Start seek failed"),
            }
            if !self.still_current(session, item) {
                return;
            }
        }

        let duration = match self.player.item_duration().await {
            Ok(duration) => duration.and_then(from_timestamp),
            Err(err) => {
                warn!(session = %session, error = %err, "Duration unavailable");
                None
            }
        };

        let autoplay = {
            let mut state = self.state.lock();
            if state.session != Some(session) || !state.is_current(item) {
                return;
            }
            if duration.is_some() {
                state.duration = duration;
            }
            if state.playing {
                state.echoes.expect(true);
            }
            state.playing
        };

        if autoplay {
            if let Err(err) = self.player.set_rate(1.0).await {
                warn!(session = %session, error = %err, "Setting rate failed");
            }
        }

        let (duration, correction) = {
            let mut state = self.state.lock();
            if state.session != Some(session) || !state.is_current(item) {
                return;
            }
            state.phase = Phase::Ready;
            // play/pause issued while preparing only updated the flag.
            let correction = (state.playing != autoplay).then_some(state.playing);
            if let Some(playing) = correction {
                state.echoes.expect(playing);
            }
            (state.duration, correction)
        };
        if let Some(playing) = correction {
            let rate = if playing { 1.0 } else { 0.0 };
            if let Err(err) = self.player.set_rate(rate).await {
                warn!(session = %session, error = %err, "Setting rate failed");
            }
        }
        self.emit(session, BackendEvent::Ready { duration });
    }
}

/// [`PlaybackBackend`] over a [`PlatformPlayer`].
pub struct PlatformBackend {
    shared: Shared,
    replay: mpsc::UnboundedSender<PlatformPlayerEvent>,
    pump: JoinHandle<()>,
}

impl PlatformBackend {
    /// Subscribes to the player's notifications and starts forwarding them to `sink`.
    pub async fn attach(
        player: Arc<dyn PlatformPlayer>,
        sink: BackendEventSink,
    ) -> Result<Self, BackendError> {
        let events = player.subscribe_events().await?;
        let shared = Shared {
            player,
            state: Arc::new(Mutex::new(PlatformState::new())),
            sink,
        };
        let (replay, replay_rx) = mpsc::unbounded_channel();
        let pump = core_async::spawn(pump(events, replay_rx, shared.clone()));
        Ok(Self {
            shared,
            replay,
            pump,
        })
    }

    async fn set_rate(&self, playing: bool) -> Result<(), BackendError> {
        {
            let mut state = self.shared.state.lock();
            if state.session.is_none() {
                return Err(BackendError::NotReady);
            }
            if state.playing == playing {
                return Ok(());
            }
            state.playing = playing;
            // Before ready the rate is applied by the prepare step.
            if state.phase != Phase::Ready {
                return Ok(());
            }
            state.echoes.expect(playing);
        }
        let rate = if playing { 1.0 } else { 0.0 };
        self.shared.player.set_rate(rate).await?;
        Ok(())
    }
}

async fn pump(
    mut events: Box<dyn PlatformPlayerEventStream>,
    mut replay: mpsc::UnboundedReceiver<PlatformPlayerEvent>,
    shared: Shared,
) {
    loop {
        let event = core_async::select! {
            biased;
            Some(event) = replay.recv() => event,
            event = events.next() => match event {
                Some(event) => event,
                None => break,
            },
        };
        trace!(?event, "Platform player event");

        let (session, effect) = {
            let mut state = shared.state.lock();
            let Some(session) = state.session else {
                continue;
            };
            (session, state.apply(event))
        };

        match effect {
            Some(Effect::Emit(event)) => shared.emit(session, event),
            Some(Effect::Prepare {
                session,
                item,
                start,
            }) => shared.prepare(session, item, start).await,
            None => {}
        }
    }
    debug!("Platform player event stream closed");
}

impl Drop for PlatformBackend {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[async_trait]
impl PlaybackBackend for PlatformBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Platform
    }

    async fn load(&self, request: LoadRequest) -> Result<(), LoadError> {
        let stream = request
            .item
            .stream
            .clone()
            .ok_or_else(|| LoadError::NotResolved(request.item.id().clone()))?;

        {
            let mut state = self.shared.state.lock();
            state.session = Some(request.session);
            state.item = None;
            state.phase = Phase::AwaitingItem;
            state.playing = request.autoplay;
            state.echoes.clear();
            state.start = request.start;
            state.time = request.start;
            state.duration = request.item.video.length;
            state.early.clear();
        }

        debug!(
            session = %request.session,
            video_id = %request.item.id(),
            start_ms = request.start.as_millis(),
            "Platform load"
        );

        let source = PlayerItemSource {
            url: stream.url,
            http_headers: stream.http_headers,
        };
        let result = self.shared.player.replace_current_item(Some(source)).await;

        let mut state = self.shared.state.lock();
        if state.session != Some(request.session) {
            // Superseded while the host was creating the item.
            return Ok(());
        }
        match result {
            Ok(Some(item)) => {
                state.item = Some(item);
                state.phase = Phase::Opening;
                for event in state.early.drain(..) {
                    if item_of(&event) == Some(item) {
                        let _ = self.replay.send(event);
                    }
                }
                Ok(())
            }
            Ok(None) => {
                state.session = None;
                state.phase = Phase::Idle;
                Err(LoadError::SourceUnavailable(
                    "player did not create an item".to_string(),
                ))
            }
            Err(err) => {
                state.session = None;
                state.phase = Phase::Idle;
                Err(err.into())
            }
        }
    }

    async fn play(&self) -> Result<(), BackendError> {
        self.set_rate(true).await
    }

    async fn pause(&self) -> Result<(), BackendError> {
        self.set_rate(false).await
    }

    async fn seek(&self, request: SeekRequest) -> Result<(), SeekError> {
        let target = {
            let mut state = self.shared.state.lock();
            if state.session.is_none() || state.phase != Phase::Ready {
                return Err(SeekError::NotReady);
            }
            let target = request.resolve(state.time, state.duration)?;
            state.time = target;
            target
        };
        let tolerance = match request.origin {
            SeekOrigin::Programmatic => SeekTolerance::Exact,
            SeekOrigin::UserInteracted => SeekTolerance::Keyframe,
        };
        self.shared
            .player
            .seek(to_timestamp(target), tolerance)
            .await?;
        Ok(())
    }

    fn current_time(&self) -> Time {
        self.shared.state.lock().time
    }

    fn duration(&self) -> Option<Time> {
        self.shared.state.lock().duration
    }

    fn is_playing(&self) -> bool {
        self.shared.state.lock().playing
    }

    async fn stop(&self) -> Result<(), BackendError> {
        let had_session = {
            let mut state = self.shared.state.lock();
            let had_session = state.session.take().is_some();
            state.item = None;
            state.phase = Phase::Idle;
            state.playing = false;
            state.echoes.clear();
            state.early.clear();
            had_session
        };
        if had_session {
            self.shared.player.replace_current_item(None).await?;
        }
        Ok(())
    }
}
