//! Watch session lifecycle and ordered event delivery.
//!
//! A session moves through three states: unstarted, active, closed. The
//! cloneable [`SessionHandle`] is the control surface (grow or shrink the
//! watched set, close the session); [`WatchSession::run`] is the delivery
//! loop that drains the backend's channel one event at a time, so a slow
//! sink naturally backpressures the stream instead of reordering it.
//!
//! Closing is cooperative: the handle drops the backend (ending the event
//! channel) and the loop discards anything still queued once it observes
//! the closed state.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::watcher::backend::WatchBackend;
use crate::watcher::event::{Event, RawEvent};
use crate::watcher::normalizer::EventNormalizer;

/// Receives normalized events, one at a time, in arrival order.
///
/// Implemented for any `FnMut(Event) -> anyhow::Result<()>`, which covers
/// the common case of pushing into a channel or a subscriber list.
#[async_trait]
pub trait EventSink: Send {
    async fn emit(&mut self, event: Event) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> EventSink for F
where
    F: FnMut(Event) -> anyhow::Result<()> + Send,
{
    async fn emit(&mut self, event: Event) -> anyhow::Result<()> {
        self(event)
    }
}

#[derive(Default)]
enum SessionState {
    #[default]
    Unstarted,
    Active(Box<dyn WatchBackend>),
    Closed,
}

/// Cloneable control surface for a watch session.
///
/// All clones share one state: closing through any of them closes the
/// session for all.
#[derive(Clone, Default)]
pub struct SessionHandle {
    state: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.state.lock(), SessionState::Active(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), SessionState::Closed)
    }

    /// Add `path` to the watched set.
    pub fn watch(&self, path: &Path) -> Result<()> {
        match &mut *self.state.lock() {
            SessionState::Active(backend) => backend.watch(path),
            SessionState::Unstarted => Err(Error::NotStarted { op: "watch" }),
            SessionState::Closed => Err(Error::SessionClosed),
        }
    }

    /// Remove `path` from the watched set.
    pub fn unwatch(&self, path: &Path) -> Result<()> {
        match &mut *self.state.lock() {
            SessionState::Active(backend) => backend.unwatch(path),
            SessionState::Unstarted => Err(Error::NotStarted { op: "unwatch" }),
            SessionState::Closed => Err(Error::SessionClosed),
        }
    }

    /// Close the session. Idempotent, and valid in every state.
    ///
    /// Dropping the backend ends its event channel, which in turn ends the
    /// delivery loop; events still queued at that point are discarded.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if let SessionState::Active(backend) = &mut *state {
            tracing::info!("[watcher] closing watch session");
            backend.close();
        }
        *state = SessionState::Closed;
    }

    fn activate(&self, mut backend: Box<dyn WatchBackend>) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            SessionState::Unstarted => {
                *state = SessionState::Active(backend);
                Ok(())
            }
            SessionState::Active(_) => {
                // Already running; the incoming backend is surplus.
                backend.close();
                Ok(())
            }
            SessionState::Closed => Err(Error::SessionClosed),
        }
    }
}

/// The consuming half of a session: normalizes raw events and hands them
/// to the sink.
pub struct WatchSession {
    normalizer: EventNormalizer,
    events: mpsc::Receiver<RawEvent>,
    handle: SessionHandle,
}

impl WatchSession {
    /// Bind a backend and its event stream to `handle`, activating it.
    ///
    /// Fails if the handle was already closed. Starting an already-active
    /// handle keeps the running backend and closes the surplus one, so a
    /// double start degrades to a loop that ends immediately.
    pub fn start(
        handle: &SessionHandle,
        normalizer: EventNormalizer,
        backend: Box<dyn WatchBackend>,
        events: mpsc::Receiver<RawEvent>,
    ) -> Result<Self> {
        handle.activate(backend)?;
        Ok(Self {
            normalizer,
            events,
            handle: handle.clone(),
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Drain the event stream until the channel ends or the session is
    /// closed. Events are processed strictly one at a time: the next raw
    /// event is not taken until the previous one has been normalized and
    /// delivered.
    pub async fn run<S: EventSink>(mut self, mut sink: S) -> Result<()> {
        tracing::info!("[watcher] watch session running");
        while let Some(raw) = self.events.recv().await {
            if self.handle.is_closed() {
                tracing::debug!("[watcher] session closed, dropping queued events");
                break;
            }
            match self.normalizer.normalize(raw).await {
                Ok(Some(normalized)) => {
                    for path in &normalized.unwatch {
                        if let Err(e) = self.handle.unwatch(path) {
                            tracing::warn!(
                                "[watcher] failed to unwatch {}: {e}",
                                path.display()
                            );
                        }
                    }
                    self.deliver(&mut sink, normalized.event).await?;
                }
                Ok(None) => {}
                Err(e) => self.deliver(&mut sink, Event::Error(e)).await?,
            }
        }
        tracing::info!("[watcher] watch session finished");
        Ok(())
    }

    /// Hand one event to the sink.
    ///
    /// A sink failure on a normal event is redelivered to the sink as an
    /// error event; a failure while handling an error event ends the run,
    /// since the sink has nowhere left to hear about it.
    async fn deliver<S: EventSink>(&self, sink: &mut S, event: Event) -> Result<()> {
        let was_error = matches!(event, Event::Error(_));
        if let Err(e) = sink.emit(event).await {
            if was_error {
                return Err(Error::Sink(e));
            }
            tracing::warn!("[watcher] event sink failed: {e}");
            if let Err(e) = sink.emit(Event::Error(Error::Sink(e))).await {
                return Err(Error::Sink(e));
            }
        }
        Ok(())
    }
}
