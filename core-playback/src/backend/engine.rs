//! Backend over the software decode/render engine.
//!
//! The engine is command/property driven: `load_file` replaces the current
//! file, and progress is reported as `StartFile` → `FileLoaded` →
//! `PlaybackRestart`. An `EndFile` for the file being replaced can still
//! arrive after `load_file` returned, so a load only counts as opened once
//! its own `StartFile` was seen.

use async_trait::async_trait;
use bridge_traits::{
    EndFileReason, EngineErrorCode, EngineEvent, EngineEventStream, EngineLoadOptions,
    RenderEngine,
};
use core_async::task::JoinHandle;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::{
    BackendEnvelope, BackendEvent, BackendEventSink, BackendKind, LoadRequest, PlaybackBackend,
    PlayingEchoes, SessionId,
};
use crate::error::{BackendError, BackendFailure, FailureKind, LoadError, SeekError};
use crate::time::{SeekRequest, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// `load_file` issued, waiting for the engine's `StartFile`.
    AwaitingStart,
    Opening,
    Ready,
    Ended,
}

#[derive(Debug)]
struct EngineState {
    session: Option<SessionId>,
    phase: Phase,
    playing: bool,
    echoes: PlayingEchoes,
    time: Time,
    duration: Option<Time>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            session: None,
            phase: Phase::Idle,
            playing: false,
            echoes: PlayingEchoes::default(),
            time: Time::ZERO,
            duration: None,
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.phase, Phase::Opening | Phase::Ready)
    }

    /// Applies an engine event and returns what must be reported.
    fn apply(&mut self, event: EngineEvent) -> Option<BackendEvent> {
        match event {
            EngineEvent::StartFile => {
                if self.phase == Phase::AwaitingStart {
                    self.phase = Phase::Opening;
                }
                None
            }
            EngineEvent::FileLoaded => None,
            EngineEvent::PlaybackRestart => {
                if self.phase == Phase::Opening {
                    self.phase = Phase::Ready;
                    Some(BackendEvent::Ready {
                        duration: self.duration,
                    })
                } else {
                    None
                }
            }
            EngineEvent::TimePos(seconds) if self.is_open() => {
                self.time = Time::from_secs_f64(seconds);
                Some(BackendEvent::TimeDidChange(self.time))
            }
            EngineEvent::DurationChanged(seconds) if self.is_open() => {
                let duration = (seconds.is_finite() && seconds > 0.0)
                    .then(|| Time::from_secs_f64(seconds));
                if duration == self.duration {
                    return None;
                }
                self.duration = duration;
                Some(BackendEvent::DurationChanged(duration))
            }
            EngineEvent::PausedForCache(buffering) if self.is_open() => {
                Some(BackendEvent::BufferingStateChanged(buffering))
            }
            EngineEvent::PauseChanged(paused) if self.session.is_some() => {
                let observed = !paused;
                if self.echoes.absorb(observed, self.playing) {
                    None
                } else {
                    self.playing = observed;
                    Some(BackendEvent::PlayingChanged(observed))
                }
            }
            EngineEvent::EndFile(reason) if self.is_open() => match reason {
                EndFileReason::Eof => {
                    self.phase = Phase::Ended;
                    self.playing = false;
                    Some(BackendEvent::DidFinish)
                }
                EndFileReason::Error { code, message } => {
                    self.phase = Phase::Ended;
                    self.playing = false;
                    Some(BackendEvent::DidFail(classify(code, message)))
                }
                EndFileReason::Stop | EndFileReason::Quit | EndFileReason::Redirect => None,
            },
            _ => None,
        }
    }
}

fn classify(code: EngineErrorCode, message: String) -> BackendFailure {
    let kind = match code {
        EngineErrorCode::UnknownFormat
        | EngineErrorCode::DecodeFailed
        | EngineErrorCode::NothingToPlay => FailureKind::Decode,
        EngineErrorCode::LoadingFailed | EngineErrorCode::OutputInitFailed => FailureKind::Source,
    };
    BackendFailure::new(kind, message)
}

/// [`PlaybackBackend`] over a [`RenderEngine`].
pub struct EngineBackend {
    engine: Arc<dyn RenderEngine>,
    state: Arc<Mutex<EngineState>>,
    pump: JoinHandle<()>,
}

impl EngineBackend {
    /// Subscribes to the engine's events and starts forwarding them to `sink`.
    pub async fn attach(
        engine: Arc<dyn RenderEngine>,
        sink: BackendEventSink,
    ) -> Result<Self, BackendError> {
        let events = engine.subscribe_events().await?;
        let state = Arc::new(Mutex::new(EngineState::new()));
        let pump = core_async::spawn(pump(events, Arc::clone(&state), sink));
        Ok(Self {
            engine,
            state,
            pump,
        })
    }
}

async fn pump(
    mut events: Box<dyn EngineEventStream>,
    state: Arc<Mutex<EngineState>>,
    sink: BackendEventSink,
) {
    while let Some(event) = events.next().await {
        trace!(?event, "Engine event");
        let envelope = {
            let mut state = state.lock();
            let Some(session) = state.session else {
                continue;
            };
            state.apply(event).map(|event| BackendEnvelope {
                backend: BackendKind::Engine,
                session,
                event,
            })
        };
        if let Some(envelope) = envelope {
            sink.emit(envelope);
        }
    }
    debug!("Engine event stream closed");
}

impl Drop for EngineBackend {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[async_trait]
impl PlaybackBackend for EngineBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Engine
    }

    async fn load(&self, request: LoadRequest) -> Result<(), LoadError> {
        let stream = request
            .item
            .stream
            .clone()
            .ok_or_else(|| LoadError::NotResolved(request.item.id().clone()))?;

        {
            let mut state = self.state.lock();
            state.session = Some(request.session);
            state.phase = Phase::AwaitingStart;
            state.playing = request.autoplay;
            state.echoes.clear();
            state.time = request.start;
            state.duration = request.item.video.length;
        }

        debug!(
            session = %request.session,
            video_id = %request.item.id(),
            start_ms = request.start.as_millis(),
            "Engine load"
        );

        let options = EngineLoadOptions {
            start_seconds: request.start.as_secs_f64(),
            paused: !request.autoplay,
            http_headers: stream.http_headers,
        };
        if let Err(err) = self.engine.load_file(&stream.url, options).await {
            let mut state = self.state.lock();
            if state.session == Some(request.session) {
                state.session = None;
                state.phase = Phase::Idle;
            }
            return Err(err.into());
        }
        Ok(())
    }

    async fn play(&self) -> Result<(), BackendError> {
        {
            let mut state = self.state.lock();
            if state.session.is_none() {
                return Err(BackendError::NotReady);
            }
            if state.playing {
                return Ok(());
            }
            state.playing = true;
            state.echoes.expect(true);
        }
        self.engine.set_paused(false).await?;
        Ok(())
    }

    async fn pause(&self) -> Result<(), BackendError> {
        {
            let mut state = self.state.lock();
            if state.session.is_none() {
                return Err(BackendError::NotReady);
            }
            if !state.playing {
                return Ok(());
            }
            state.playing = false;
            state.echoes.expect(false);
        }
        self.engine.set_paused(true).await?;
        Ok(())
    }

    async fn seek(&self, request: SeekRequest) -> Result<(), SeekError> {
        let target = {
            let mut state = self.state.lock();
            if state.session.is_none() || !state.is_open() {
                return Err(SeekError::NotReady);
            }
            let target = request.resolve(state.time, state.duration)?;
            state.time = target;
            target
        };
        self.engine.seek_to(target.as_secs_f64()).await?;
        Ok(())
    }

    fn current_time(&self) -> Time {
        self.state.lock().time
    }

    fn duration(&self) -> Option<Time> {
        self.state.lock().duration
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    async fn stop(&self) -> Result<(), BackendError> {
        let had_session = {
            let mut state = self.state.lock();
            let had_session = state.session.take().is_some();
            state.phase = Phase::Idle;
            state.playing = false;
            state.echoes.clear();
            had_session
        };
        if had_session {
            if let Err(err) = self.engine.stop().await {
                warn!(error = %err, "Engine stop failed");
                return Err(err.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loading() -> EngineState {
        let mut state = EngineState::new();
        state.session = Some(SessionId(1));
        state.phase = Phase::AwaitingStart;
        state.playing = true;
        state
    }

    #[test]
    fn test_ready_after_restart_of_new_file() {
        let mut state = loading();
        // Tail of the replaced file.
        assert_eq!(state.apply(EngineEvent::EndFile(EndFileReason::Eof)), None);
        assert_eq!(state.apply(EngineEvent::PlaybackRestart), None);

        assert_eq!(state.apply(EngineEvent::StartFile), None);
        assert_eq!(state.apply(EngineEvent::FileLoaded), None);
        assert_eq!(
            state.apply(EngineEvent::PlaybackRestart),
            Some(BackendEvent::Ready { duration: None })
        );
        // Restart after a seek is not a second ready.
        assert_eq!(state.apply(EngineEvent::PlaybackRestart), None);
    }

    #[test]
    fn test_end_file_mapping() {
        let mut state = loading();
        state.apply(EngineEvent::StartFile);
        assert_eq!(state.apply(EngineEvent::EndFile(EndFileReason::Stop)), None);
        assert_eq!(
            state.apply(EngineEvent::EndFile(EndFileReason::Error {
                code: EngineErrorCode::UnknownFormat,
                message: "no demuxer".into(),
            })),
            Some(BackendEvent::DidFail(BackendFailure::new(
                FailureKind::Decode,
                "no demuxer"
            )))
        );
        // Nothing after the file ended.
        assert_eq!(state.apply(EngineEvent::EndFile(EndFileReason::Eof)), None);
    }

    #[test]
    fn test_loading_failure_is_source() {
        let failure = classify(EngineErrorCode::LoadingFailed, "403".into());
        assert_eq!(failure.kind, FailureKind::Source);
        assert!(!failure.is_fatal_decode());
    }

    #[test]
    fn test_time_and_buffering_only_while_open() {
        let mut state = loading();
        assert_eq!(state.apply(EngineEvent::TimePos(99.0)), None);
        state.apply(EngineEvent::StartFile);
        assert_eq!(
            state.apply(EngineEvent::TimePos(1.5)),
            Some(BackendEvent::TimeDidChange(Time::from_millis(1_500)))
        );
        assert_eq!(
            state.apply(EngineEvent::PausedForCache(true)),
            Some(BackendEvent::BufferingStateChanged(true))
        );
        assert_eq!(
            state.apply(EngineEvent::DurationChanged(60.0)),
            Some(BackendEvent::DurationChanged(Some(Time::from_secs(60))))
        );
        assert_eq!(state.apply(EngineEvent::DurationChanged(60.0)), None);
    }

    #[test]
    fn test_external_pause_is_reported_once() {
        let mut state = loading();
        state.apply(EngineEvent::StartFile);
        assert_eq!(state.apply(EngineEvent::PauseChanged(false)), None);
        assert_eq!(
            state.apply(EngineEvent::PauseChanged(true)),
            Some(BackendEvent::PlayingChanged(false))
        );
        assert!(!state.playing);
        assert_eq!(state.apply(EngineEvent::PauseChanged(true)), None);
    }
}
