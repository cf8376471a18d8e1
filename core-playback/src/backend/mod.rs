//! # Backend Abstraction
//!
//! One transport contract, [`PlaybackBackend`], over two structurally different
//! host engines:
//!
//! - [`EngineBackend`]: the software decode/render engine (command/property
//!   driven, positions in `f64` seconds).
//! - [`PlatformBackend`]: the native platform player (item/rate driven,
//!   rational timestamps).
//!
//! Backends report asynchronously through a [`BackendEventSink`]. Every
//! envelope carries the [`BackendKind`] that produced it and the [`SessionId`]
//! of the load it belongs to, so the orchestrator can drop anything that does
//! not belong to its current load with a single comparison.
//!
//! [`BackendSet`] owns the instances. Backends are created lazily on first use
//! and exactly one of them is active.

mod engine;
mod platform;

pub use engine::EngineBackend;
pub use platform::PlatformBackend;

use async_trait::async_trait;
use bridge_traits::{PlatformPlayer, RenderEngine};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{BackendError, BackendFailure, LoadError, SeekError};
use crate::item::PlaybackItem;
use crate::time::{SeekRequest, Time};

/// Which host engine a backend drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Software decode/render engine.
    Engine,
    /// Native platform player.
    Platform,
}

impl BackendKind {
    pub fn alternate(&self) -> BackendKind {
        match self {
            BackendKind::Engine => BackendKind::Platform,
            BackendKind::Platform => BackendKind::Engine,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Engine => "engine",
            BackendKind::Platform => "platform",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "engine" | "mpv" => Ok(BackendKind::Engine),
            "platform" | "avplayer" => Ok(BackendKind::Platform),
            other => Err(format!("unknown backend kind `{other}`")),
        }
    }
}

/// Identity of one `load` call. Issued by the orchestrator, strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub session: SessionId,
    pub item: PlaybackItem,
    pub start: Time,
    /// Start playing as soon as the first frame is ready.
    pub autoplay: bool,
}

/// Events a backend reports about its current load.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// First frame is ready. Emitted once per load.
    Ready { duration: Option<Time> },
    TimeDidChange(Time),
    DurationChanged(Option<Time>),
    BufferingStateChanged(bool),
    /// Playing state changed for a reason other than a command from the core
    /// (remote control, audio session interruption).
    PlayingChanged(bool),
    DidFinish,
    DidFail(BackendFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendEnvelope {
    pub backend: BackendKind,
    pub session: SessionId,
    pub event: BackendEvent,
}

/// Callback receiving backend events. Called from the backend's pump task.
#[derive(Clone)]
pub struct BackendEventSink(Arc<dyn Fn(BackendEnvelope) + Send + Sync>);

impl BackendEventSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(BackendEnvelope) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn emit(&self, envelope: BackendEnvelope) {
        (self.0)(envelope)
    }
}

impl fmt::Debug for BackendEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BackendEventSink")
    }
}

/// Uniform transport surface over a host media engine.
///
/// `play`/`pause` are idempotent. `is_playing` reports the state last
/// commanded (or observed from the host), so `toggle_play` flips it
/// deterministically under rapid repeated calls.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Starts preparing `request.item`. Returns once the host accepted the
    /// request; readiness is reported with [`BackendEvent::Ready`].
    async fn load(&self, request: LoadRequest) -> Result<(), LoadError>;

    async fn play(&self) -> Result<(), BackendError>;

    async fn pause(&self) -> Result<(), BackendError>;

    async fn toggle_play(&self) -> Result<(), BackendError> {
        if self.is_playing() {
            self.pause().await
        } else {
            self.play().await
        }
    }

    async fn seek(&self, request: SeekRequest) -> Result<(), SeekError>;

    /// Last known position, without a round-trip to the host.
    fn current_time(&self) -> Time;

    /// `None` when unknown or live.
    fn duration(&self) -> Option<Time>;

    fn is_playing(&self) -> bool;

    /// Stops playback and releases the loaded media. Later events of the
    /// stopped load are not reported.
    async fn stop(&self) -> Result<(), BackendError>;
}

/// Creates backends for the engines the host provided.
#[derive(Clone, Default)]
pub struct BackendFactory {
    engine: Option<Arc<dyn RenderEngine>>,
    platform: Option<Arc<dyn PlatformPlayer>>,
}

impl BackendFactory {
    pub fn new(
        engine: Option<Arc<dyn RenderEngine>>,
        platform: Option<Arc<dyn PlatformPlayer>>,
    ) -> Self {
        Self { engine, platform }
    }

    pub fn supports(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Engine => self.engine.is_some(),
            BackendKind::Platform => self.platform.is_some(),
        }
    }

    /// `preferred` if the host provides it, otherwise the other kind.
    pub fn pick(&self, preferred: BackendKind) -> BackendKind {
        if self.supports(preferred) {
            preferred
        } else {
            preferred.alternate()
        }
    }

    pub async fn create(
        &self,
        kind: BackendKind,
        sink: BackendEventSink,
    ) -> Result<Arc<dyn PlaybackBackend>, BackendError> {
        match kind {
            BackendKind::Engine => {
                let engine = self
                    .engine
                    .clone()
                    .ok_or(BackendError::Unavailable(kind))?;
                let backend = EngineBackend::attach(engine, sink).await?;
                Ok(Arc::new(backend))
            }
            BackendKind::Platform => {
                let player = self
                    .platform
                    .clone()
                    .ok_or(BackendError::Unavailable(kind))?;
                let backend = PlatformBackend::attach(player, sink).await?;
                Ok(Arc::new(backend))
            }
        }
    }
}

impl fmt::Debug for BackendFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendFactory")
            .field("engine", &self.engine.is_some())
            .field("platform", &self.platform.is_some())
            .finish()
    }
}

/// Backend instances plus the active-backend pointer.
///
/// The inactive backend may stay allocated after a switch. Only the one
/// returned by [`active`](Self::active) is given transport commands.
pub struct BackendSet {
    factory: BackendFactory,
    sink: BackendEventSink,
    active: BackendKind,
    instances: HashMap<BackendKind, Arc<dyn PlaybackBackend>>,
}

impl BackendSet {
    pub fn new(factory: BackendFactory, preferred: BackendKind, sink: BackendEventSink) -> Self {
        let active = factory.pick(preferred);
        if active != preferred {
            info!(preferred = %preferred, using = %active, "Preferred backend unavailable");
        }
        Self {
            factory,
            sink,
            active,
            instances: HashMap::new(),
        }
    }

    pub fn active_kind(&self) -> BackendKind {
        self.active
    }

    pub fn supports(&self, kind: BackendKind) -> bool {
        self.factory.supports(kind)
    }

    /// The active backend, created on first use.
    pub async fn active(&mut self) -> Result<Arc<dyn PlaybackBackend>, BackendError> {
        self.get_or_create(self.active).await
    }

    /// The active backend if it was already created.
    pub fn active_if_created(&self) -> Option<Arc<dyn PlaybackBackend>> {
        self.instances.get(&self.active).cloned()
    }

    async fn get_or_create(
        &mut self,
        kind: BackendKind,
    ) -> Result<Arc<dyn PlaybackBackend>, BackendError> {
        if let Some(backend) = self.instances.get(&kind) {
            return Ok(Arc::clone(backend));
        }
        debug!(backend = %kind, "Creating backend");
        let backend = self.factory.create(kind, self.sink.clone()).await?;
        self.instances.insert(kind, Arc::clone(&backend));
        Ok(backend)
    }

    /// Makes `kind` active and returns the previously active backend, if it
    /// was created, so the caller can stop it.
    pub fn set_active(
        &mut self,
        kind: BackendKind,
    ) -> Result<Option<Arc<dyn PlaybackBackend>>, BackendError> {
        if !self.factory.supports(kind) {
            return Err(BackendError::Unavailable(kind));
        }
        if kind == self.active {
            return Ok(None);
        }
        let previous = self.instances.get(&self.active).cloned();
        self.active = kind;
        Ok(previous)
    }
}

impl fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSet")
            .field("factory", &self.factory)
            .field("active", &self.active)
            .field("created", &self.instances.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Outcome of comparing an observed playing state with the commanded one.
///
/// Adapters remember the playing states they asked the host for. When the
/// host echoes one of them back it is swallowed; anything else is an external
/// change the orchestrator must hear about.
#[derive(Debug, Default)]
pub(crate) struct PlayingEchoes {
    expected: std::collections::VecDeque<bool>,
}

impl PlayingEchoes {
    pub(crate) fn expect(&mut self, playing: bool) {
        self.expected.push_back(playing);
    }

    pub(crate) fn clear(&mut self) {
        self.expected.clear();
    }

    /// Returns `true` when `observed` is an echo of a command and must not be
    /// reported. Hosts may coalesce notifications, so a match anywhere in the
    /// pending list consumes every older entry too.
    pub(crate) fn absorb(&mut self, observed: bool, commanded: bool) -> bool {
        if let Some(pos) = self.expected.iter().position(|&p| p == observed) {
            self.expected.drain(..=pos);
            return true;
        }
        if observed == commanded {
            self.expected.clear();
            return true;
        }
        self.expected.clear();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("engine".parse::<BackendKind>().unwrap(), BackendKind::Engine);
        assert_eq!(" AVPlayer ".parse::<BackendKind>().unwrap(), BackendKind::Platform);
        assert!("vlc".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Engine.alternate(), BackendKind::Platform);
        assert_eq!(BackendKind::Platform.to_string(), "platform");
    }

    #[test]
    fn test_factory_pick_falls_back() {
        let factory = BackendFactory::default();
        assert!(!factory.supports(BackendKind::Engine));
        assert_eq!(factory.pick(BackendKind::Engine), BackendKind::Platform);
    }

    #[test]
    fn test_echoes_swallow_own_commands() {
        let mut echoes = PlayingEchoes::default();
        echoes.expect(true);
        echoes.expect(false);
        echoes.expect(true);

        // Host coalesced the first two notifications.
        assert!(echoes.absorb(false, true));
        assert!(echoes.absorb(true, true));
        // External pause.
        assert!(!echoes.absorb(false, true));
    }

    #[test]
    fn test_echoes_accept_matching_state_without_pending() {
        let mut echoes = PlayingEchoes::default();
        assert!(echoes.absorb(true, true));
        assert!(!echoes.absorb(false, true));
    }
}
