//! TokioWorker - tokio タスクで Script を実行する worker
//!
//! # 実装詳細
//! - worker 1 つにつき tokio タスク 1 つ
//! - post された message は mpsc で順番にタスクへ届く
//! - Script の結果は `message` イベント、失敗は `error` イベントとして配送
//! - worker が drop されるとタスクも止まる
//! - コールバックはすべて worker タスク側で呼ばれる（呼び出し元スレッドでは呼ばない）

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::EventTarget;
use crate::domain::{
    ErrorKind, EventType, Listener, ListenerOptions, ScriptLocator, WorkerError, WorkerEvent,
};
use crate::ports::{Worker, WorkerFactory};
use crate::typed::{DynScript, ScriptRegistry};

/// Worker backed by a tokio task running one script.
pub struct TokioWorker {
    locator: ScriptLocator,
    events: Arc<EventTarget>,
    tx: mpsc::UnboundedSender<serde_json::Value>,
    handle: Handle,
    task: JoinHandle<()>,
}

impl TokioWorker {
    fn spawn(
        handle: &Handle,
        locator: ScriptLocator,
        script: Option<Arc<dyn DynScript>>,
    ) -> Self {
        let events = Arc::new(EventTarget::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let task = handle.spawn(run_script(
            locator.clone(),
            script,
            rx,
            Arc::clone(&events),
        ));

        Self {
            locator,
            events,
            tx,
            handle: handle.clone(),
            task,
        }
    }

    pub fn locator(&self) -> &ScriptLocator {
        &self.locator
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

async fn run_script(
    locator: ScriptLocator,
    script: Option<Arc<dyn DynScript>>,
    mut rx: mpsc::UnboundedReceiver<serde_json::Value>,
    events: Arc<EventTarget>,
) {
    tracing::debug!(%locator, "worker task started");

    while let Some(message) = rx.recv().await {
        let event = match &script {
            Some(script) => match script.run_dyn(message).await {
                Ok(reply) => WorkerEvent::Message(reply),
                Err(err) => WorkerEvent::Error(err),
            },
            None => WorkerEvent::Error(WorkerError::new(
                ErrorKind::NotFound,
                format!("no script registered for locator '{locator}'"),
            )),
        };

        if let WorkerEvent::Error(err) = &event {
            tracing::debug!(%locator, error = %err, "script raised an error");
        }
        events.dispatch(&event);
    }

    tracing::debug!(%locator, "worker task stopped");
}

impl Drop for TokioWorker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Worker for TokioWorker {
    fn on_message(&self) -> Option<Listener> {
        self.events.on_message()
    }

    fn set_on_message(&self, handler: Option<Listener>) {
        self.events.set_on_message(handler);
    }

    fn on_error(&self) -> Option<Listener> {
        self.events.on_error()
    }

    fn set_on_error(&self, handler: Option<Listener>) {
        self.events.set_on_error(handler);
    }

    fn add_listener(&self, event_type: &EventType, listener: Listener, options: ListenerOptions) {
        self.events.add_listener(event_type, listener, options);
    }

    fn remove_listener(&self, event_type: &EventType, listener: &Listener, options: ListenerOptions) {
        self.events.remove_listener(event_type, listener, options);
    }

    fn post_message(&self, message: serde_json::Value) {
        if self.tx.send(message).is_err() {
            tracing::warn!(locator = %self.locator, "message posted to a stopped worker");
            let events = Arc::clone(&self.events);
            self.handle.spawn(async move {
                events.dispatch(&WorkerEvent::Error(WorkerError::new(
                    ErrorKind::Terminated,
                    "worker is no longer running",
                )));
            });
        }
    }
}

/// Creates `TokioWorker`s on a fixed runtime, resolving scripts by locator.
pub struct TokioWorkerFactory {
    registry: Arc<ScriptRegistry>,
    handle: Handle,
}

impl TokioWorkerFactory {
    pub fn new(registry: Arc<ScriptRegistry>, handle: Handle) -> Self {
        Self { registry, handle }
    }

    /// Bind to the runtime the caller is running on.
    pub fn try_current(
        registry: Arc<ScriptRegistry>,
    ) -> Result<Self, tokio::runtime::TryCurrentError> {
        Ok(Self::new(registry, Handle::try_current()?))
    }
}

impl WorkerFactory for TokioWorkerFactory {
    type Worker = TokioWorker;

    fn create(&self, locator: &ScriptLocator) -> TokioWorker {
        let script = self.registry.get(locator.as_str());
        if script.is_none() {
            tracing::warn!(%locator, "no script registered; every message will raise an error");
        }
        TokioWorker::spawn(&self.handle, locator.clone(), script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::Script;
    use crate::typed::script::fixtures::{Add, AddHandler, Fail, FailHandler};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn factory() -> TokioWorkerFactory {
        let mut registry = ScriptRegistry::new();
        registry.register::<Add, _>(AddHandler).unwrap();
        registry.register::<Fail, _>(FailHandler).unwrap();
        TokioWorkerFactory::try_current(Arc::new(registry)).unwrap()
    }

    fn forward_events(worker: &TokioWorker) -> UnboundedReceiver<WorkerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let on_message = tx.clone();
        worker.set_on_message(Some(Listener::new(move |e| {
            let _ = on_message.send(e.clone());
        })));
        worker.set_on_error(Some(Listener::new(move |e| {
            let _ = tx.send(e.clone());
        })));
        rx
    }

    async fn next_event(rx: &mut UnboundedReceiver<WorkerEvent>) -> WorkerEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn script_reply_arrives_as_message_event() {
        let worker = factory().create(&Add::locator());
        let mut rx = forward_events(&worker);

        worker.post_message(json!({ "a": 1, "b": 2 }));

        assert_eq!(next_event(&mut rx).await, WorkerEvent::Message(json!(3)));
    }

    #[tokio::test]
    async fn messages_are_processed_in_post_order() {
        let worker = factory().create(&Add::locator());
        let mut rx = forward_events(&worker);

        for i in 0..5 {
            worker.post_message(json!({ "a": i, "b": 0 }));
        }

        for i in 0..5 {
            assert_eq!(next_event(&mut rx).await, WorkerEvent::Message(json!(i)));
        }
    }

    #[tokio::test]
    async fn script_failure_arrives_as_error_event() {
        let worker = factory().create(&Fail::locator());
        let mut rx = forward_events(&worker);

        worker.post_message(json!({ "reason": "disk full" }));

        let event = next_event(&mut rx).await;
        assert_eq!(event.error(), Some(&WorkerError::script("disk full")));
    }

    #[tokio::test]
    async fn unknown_locator_raises_not_found() {
        let worker = factory().create(&ScriptLocator::new("nope.v1"));
        let mut rx = forward_events(&worker);

        worker.post_message(json!({}));

        let event = next_event(&mut rx).await;
        assert_eq!(event.error().map(WorkerError::kind), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn listeners_receive_events_alongside_the_slot_handler() {
        let worker = factory().create(&Add::locator());
        let (tx, mut rx) = mpsc::unbounded_channel();
        worker.add_listener(
            &EventType::MESSAGE,
            Listener::new(move |e| {
                let _ = tx.send(e.clone());
            }),
            ListenerOptions::default(),
        );

        worker.post_message(json!({ "a": 20, "b": 22 }));

        assert_eq!(next_event(&mut rx).await, WorkerEvent::Message(json!(42)));
        assert!(worker.is_running());
    }
}
