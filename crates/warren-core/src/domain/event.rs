//! Worker events and listeners.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::WorkerError;

/// Name of an event a worker can emit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(Cow<'static, str>);

impl EventType {
    pub const MESSAGE: EventType = EventType(Cow::Borrowed("message"));
    pub const ERROR: EventType = EventType(Cow::Borrowed("error"));
    pub const MESSAGE_ERROR: EventType = EventType(Cow::Borrowed("messageerror"));

    pub fn new(s: impl Into<String>) -> Self {
        Self(Cow::Owned(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An event dispatched by a worker to its handlers and listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A message posted back by the worker's script.
    Message(serde_json::Value),
    /// An error raised inside the worker.
    Error(WorkerError),
    /// Any other named event.
    Custom {
        event_type: EventType,
        data: serde_json::Value,
    },
}

impl WorkerEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            WorkerEvent::Message(_) => EventType::MESSAGE,
            WorkerEvent::Error(_) => EventType::ERROR,
            WorkerEvent::Custom { event_type, .. } => event_type.clone(),
        }
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            WorkerEvent::Message(data) | WorkerEvent::Custom { data, .. } => Some(data),
            WorkerEvent::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&WorkerError> {
        match self {
            WorkerEvent::Error(err) => Some(err),
            _ => None,
        }
    }
}

type Callback = dyn Fn(&WorkerEvent) + Send + Sync;

/// Event callback with identity semantics.
///
/// Clones of a `Listener` compare equal; two listeners built from separate
/// `Listener::new` calls never do, even when they wrap identical closures.
/// The same type fills a worker's single-slot `on_message` / `on_error`
/// handlers.
#[derive(Clone)]
pub struct Listener(Arc<Callback>);

impl Listener {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&WorkerEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, event: &WorkerEvent) {
        (self.0)(event)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", self.addr())
    }
}

/// Options accepted when adding or removing a listener.
///
/// Only `capture` takes part in listener identity; `wants_untrusted` is
/// passed through to the worker on add.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerOptions {
    pub capture: bool,
    pub wants_untrusted: bool,
}

impl ListenerOptions {
    pub fn capture() -> Self {
        Self {
            capture: true,
            ..Self::default()
        }
    }
}
