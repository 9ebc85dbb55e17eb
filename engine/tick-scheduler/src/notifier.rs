//! Publish/subscribe delivery of timer notifications
//!
//! Delivery is synchronous and in registration order. The listener list is not locked while a
//! handler runs, so handlers may register, remove, or trigger further notifications.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, TimerError};

/// Named notifications emitted by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Stop,
    Pause,
    Resume,
    Tick,
    Reset,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Stop => "stop",
            EventKind::Pause => "pause",
            EventKind::Resume => "resume",
            EventKind::Tick => "tick",
            EventKind::Reset => "reset",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a registered handler so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler<E> = Arc<dyn Fn(&E) -> Result<(), HandlerError> + Send + Sync>;

struct Listener<E> {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    handler: Handler<E>,
}

/// Registry of handlers keyed by [`EventKind`]
pub struct Notifier<E> {
    listeners: Mutex<Vec<Listener<E>>>,
    next_id: AtomicU64,
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self { listeners: Mutex::new(Vec::new()), next_id: AtomicU64::new(1) }
    }
}

impl<E> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").field("listeners", &self.listeners.lock().len()).finish()
    }
}

impl<E> Notifier<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every `kind` notification
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(kind, false, Arc::new(handler))
    }

    /// Register `handler` for the next `kind` notification only
    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(kind, true, Arc::new(handler))
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    /// Number of handlers registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.lock().iter().filter(|listener| listener.kind == kind).count()
    }

    /// Deliver `event` to every handler registered for `kind`.
    ///
    /// All handlers run even if one fails; the first failure is returned. On success the
    /// number of handlers invoked is returned.
    pub fn emit(&self, kind: EventKind, event: &E) -> Result<usize, TimerError> {
        let handlers: Vec<Handler<E>> = {
            let mut listeners = self.listeners.lock();
            let handlers =
                listeners.iter().filter(|l| l.kind == kind).map(|l| l.handler.clone()).collect();
            listeners.retain(|l| !(l.once && l.kind == kind));
            handlers
        };

        let mut first_error = None;
        for handler in &handlers {
            if let Err(source) = handler(event) {
                if first_error.is_none() {
                    first_error = Some(TimerError::Handler { event: kind, source });
                } else {
                    tracing::warn!("Additional '{}' handler failed: {}", kind, source);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(handlers.len()),
        }
    }

    fn register(&self, kind: EventKind, once: bool, handler: Handler<E>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push(Listener { id, kind, once, handler });
        id
    }
}
