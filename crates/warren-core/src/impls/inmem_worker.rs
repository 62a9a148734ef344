//! InMemoryWorker - 開発用・テスト用の worker
//!
//! 何も実行しない worker です。post された message を記録し、
//! イベントはホスト（テスト）が `emit` で手動発火します。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::EventTarget;
use crate::domain::{EventType, Listener, ListenerOptions, ScriptLocator, WorkerEvent};
use crate::ports::{Worker, WorkerFactory};

#[derive(Debug)]
struct Inner {
    serial: usize,
    locator: ScriptLocator,
    events: EventTarget,
    posted: Mutex<Vec<serde_json::Value>>,
}

/// Inert worker handle. Clones share the same worker.
#[derive(Debug, Clone)]
pub struct InMemoryWorker {
    inner: Arc<Inner>,
}

impl InMemoryWorker {
    pub fn new(serial: usize, locator: ScriptLocator) -> Self {
        Self {
            inner: Arc::new(Inner {
                serial,
                locator,
                events: EventTarget::new(),
                posted: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creation order within its factory, starting at 0.
    pub fn serial(&self) -> usize {
        self.inner.serial
    }

    pub fn locator(&self) -> &ScriptLocator {
        &self.inner.locator
    }

    pub fn events(&self) -> &EventTarget {
        &self.inner.events
    }

    /// Fire `event` as if the worker had raised it.
    pub fn emit(&self, event: &WorkerEvent) -> usize {
        self.inner.events.dispatch(event)
    }

    pub fn posted(&self) -> Vec<serde_json::Value> {
        self.posted_lock().clone()
    }

    pub fn same_worker(&self, other: &InMemoryWorker) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn posted_lock(&self) -> MutexGuard<'_, Vec<serde_json::Value>> {
        self.inner.posted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Worker for InMemoryWorker {
    fn on_message(&self) -> Option<Listener> {
        self.inner.events.on_message()
    }

    fn set_on_message(&self, handler: Option<Listener>) {
        self.inner.events.set_on_message(handler);
    }

    fn on_error(&self) -> Option<Listener> {
        self.inner.events.on_error()
    }

    fn set_on_error(&self, handler: Option<Listener>) {
        self.inner.events.set_on_error(handler);
    }

    fn add_listener(&self, event_type: &EventType, listener: Listener, options: ListenerOptions) {
        self.inner.events.add_listener(event_type, listener, options);
    }

    fn remove_listener(&self, event_type: &EventType, listener: &Listener, options: ListenerOptions) {
        self.inner.events.remove_listener(event_type, listener, options);
    }

    fn post_message(&self, message: serde_json::Value) {
        self.posted_lock().push(message);
    }
}

/// Factory that keeps a handle to every worker it creates.
#[derive(Debug, Default)]
pub struct InMemoryWorkerFactory {
    next_serial: AtomicUsize,
    created: Mutex<Vec<InMemoryWorker>>,
}

impl InMemoryWorkerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every worker created so far, in creation order.
    pub fn created(&self) -> Vec<InMemoryWorker> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn created_count(&self) -> usize {
        self.next_serial.load(Ordering::SeqCst)
    }
}

impl WorkerFactory for InMemoryWorkerFactory {
    type Worker = InMemoryWorker;

    fn create(&self, locator: &ScriptLocator) -> InMemoryWorker {
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);
        let worker = InMemoryWorker::new(serial, locator.clone());
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(worker.clone());
        worker
    }
}
