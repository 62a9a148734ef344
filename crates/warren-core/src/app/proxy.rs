//! WorkerProxy - タスクが worker を使うための仲介オブジェクト
//!
//! # 状態
//! - `Active`: worker を保持し、proxy 経由で追加された listener を記録している
//! - `Destroyed`: release 済み。すべての操作は no-op、getter は `None`
//!
//! # release の順序
//! 1. 状態を `Destroyed` に切り替える（以降の操作は no-op）
//! 2. `on_message` / `on_error` を外し、記録した listener をすべて remove
//! 3. worker を pool に返す（busy → idle、次の登録へ）
//!
//! 2 が必ず 3 より先なので、再利用された worker に前のタスクのハンドラが残ることはない。

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::domain::{EventType, Listener, ListenerOptions, ProxyId, WorkerId};
use crate::ports::Worker;

/// Takes a worker back once its proxy has been released.
pub(crate) trait Recycle: Send + Sync {
    fn recycle(self: Arc<Self>, worker_id: WorkerId);
}

#[derive(Debug)]
struct RecordedListener {
    event_type: EventType,
    listener: Listener,
    options: ListenerOptions,
}

struct Active<W> {
    worker: Arc<W>,
    recorded: Vec<RecordedListener>,
}

impl<W: Worker> Active<W> {
    /// Detach everything this proxy attached to the worker.
    fn detach(self) {
        self.worker.set_on_message(None);
        self.worker.set_on_error(None);
        for r in &self.recorded {
            self.worker
                .remove_listener(&r.event_type, &r.listener, r.options);
        }
    }
}

enum ProxyState<W> {
    Active(Active<W>),
    Destroyed,
}

struct ProxyInner<W> {
    id: ProxyId,
    worker_id: WorkerId,
    state: Mutex<ProxyState<W>>,
    pool: Weak<dyn Recycle>,
}

/// Exclusive, time-bounded use of one pooled worker.
///
/// Handed to the callback passed to `WorkerPool::register`. Clones share
/// the same state, so a clone captured by a listener may call `release`.
/// The caller must call `release` exactly once when done; a proxy that is
/// never released keeps its worker out of the pool for good.
pub struct WorkerProxy<W> {
    inner: Arc<ProxyInner<W>>,
}

impl<W> Clone for WorkerProxy<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Worker> WorkerProxy<W> {
    pub(crate) fn new(
        id: ProxyId,
        worker_id: WorkerId,
        worker: Arc<W>,
        pool: Weak<dyn Recycle>,
    ) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                id,
                worker_id,
                state: Mutex::new(ProxyState::Active(Active {
                    worker,
                    recorded: Vec::new(),
                })),
                pool,
            }),
        }
    }

    pub fn id(&self) -> ProxyId {
        self.inner.id
    }

    /// The pooled worker this proxy was assigned. Stays readable after
    /// release so callers can correlate assignments.
    pub fn worker_id(&self) -> WorkerId {
        self.inner.worker_id
    }

    pub fn is_released(&self) -> bool {
        matches!(*self.lock(), ProxyState::Destroyed)
    }

    pub fn on_message(&self) -> Option<Listener> {
        self.with_active(|a| a.worker.on_message()).flatten()
    }

    pub fn set_on_message(&self, handler: Option<Listener>) {
        self.with_active(|a| a.worker.set_on_message(handler));
    }

    pub fn on_error(&self) -> Option<Listener> {
        self.with_active(|a| a.worker.on_error()).flatten()
    }

    pub fn set_on_error(&self, handler: Option<Listener>) {
        self.with_active(|a| a.worker.set_on_error(handler));
    }

    /// Attach `listener` to the worker and remember it for `release`.
    pub fn add_listener(&self, event_type: &EventType, listener: Listener, options: ListenerOptions) {
        self.with_active(|a| {
            a.worker.add_listener(event_type, listener.clone(), options);
            a.recorded.push(RecordedListener {
                event_type: event_type.clone(),
                listener,
                options,
            });
        });
    }

    /// Detach `listener` now. It is also still detached again on release,
    /// which the worker treats as a no-op.
    pub fn remove_listener(&self, event_type: &EventType, listener: &Listener, options: ListenerOptions) {
        self.with_active(|a| a.worker.remove_listener(event_type, listener, options));
    }

    pub fn post_message(&self, message: serde_json::Value) {
        self.with_active(|a| a.worker.post_message(message));
    }

    /// Detach every handler and listener, then return the worker to the pool.
    ///
    /// Only the first call has any effect.
    pub fn release(&self) {
        let active = match mem::replace(&mut *self.lock(), ProxyState::Destroyed) {
            ProxyState::Active(active) => active,
            ProxyState::Destroyed => return,
        };
        active.detach();

        tracing::debug!(proxy = %self.inner.id, worker = %self.inner.worker_id, "proxy released");

        if let Some(pool) = self.inner.pool.upgrade() {
            pool.recycle(self.inner.worker_id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProxyState<W>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_active<R>(&self, f: impl FnOnce(&mut Active<W>) -> R) -> Option<R> {
        match &mut *self.lock() {
            ProxyState::Active(active) => Some(f(active)),
            ProxyState::Destroyed => None,
        }
    }
}

impl<W> fmt::Debug for WorkerProxy<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerProxy")
            .field("id", &self.inner.id)
            .field("worker_id", &self.inner.worker_id)
            .finish_non_exhaustive()
    }
}
