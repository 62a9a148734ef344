//! WorkerPool - worker の生成・割り当て・回収
//!
//! # 状態
//! - `idle`: 空いている worker（古い順）
//! - `busy`: proxy に割り当て中の worker
//! - `pending`: worker を待っている登録（古い順）
//! - `created`: これまでに生成した worker 数（`capacity` を超えない）
//!
//! # 不変条件
//! - `idle ∩ busy = ∅`
//! - `|idle| + |busy| = created <= capacity`
//! - `busy` の worker はそれぞれちょうど 1 つの未 release の proxy に包まれている
//!
//! # ロック
//! 割り当て判定（worker と登録の組み合わせ）は pool 全体のロック 1 つの中で行う。
//! ユーザーのコールバック（登録ハンドラ）はロックの外で呼ぶので、
//! ハンドラの中から同期的に `release` や `register` を呼んでもデッドロックしない。

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::config::PoolConfig;
use super::proxy::{Recycle, WorkerProxy};
use super::registration::{Deregistration, Registration, Withdraw};
use super::status::PoolCounts;
use crate::domain::{ConfigError, RegistrationId, ScriptLocator, WorkerId};
use crate::ports::{IdGenerator, SystemClock, UlidGenerator, WorkerFactory};
use crate::queue::FifoSet;

struct PoolState<W> {
    workers: HashMap<WorkerId, Arc<W>>,
    idle: FifoSet<WorkerId>,
    busy: FifoSet<WorkerId>,
    pending: FifoSet<RegistrationId>,
    registrations: HashMap<RegistrationId, Registration<W>>,
    created: usize,
}

impl<W> PoolState<W> {
    fn new() -> Self {
        Self {
            workers: HashMap::new(),
            idle: FifoSet::new(),
            busy: FifoSet::new(),
            pending: FifoSet::new(),
            registrations: HashMap::new(),
            created: 0,
        }
    }

    /// Oldest registration still waiting.
    fn pop_pending(&mut self) -> Option<Registration<W>> {
        while let Some(id) = self.pending.pop_front() {
            if let Some(registration) = self.registrations.remove(&id) {
                return Some(registration);
            }
        }
        None
    }
}

/// A worker paired with the registration it will serve.
struct Assignment<W> {
    worker_id: WorkerId,
    worker: Arc<W>,
    registration: Registration<W>,
}

struct Shared<F: WorkerFactory> {
    locator: ScriptLocator,
    capacity: usize,
    factory: F,
    ids: Box<dyn IdGenerator>,
    state: Mutex<PoolState<F::Worker>>,
}

impl<F: WorkerFactory> Shared<F> {
    fn lock(&self) -> MutexGuard<'_, PoolState<F::Worker>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Match the oldest idle worker with the oldest pending registration
    /// and hand the registration a fresh proxy.
    fn execute(self: &Arc<Self>) {
        let Some(Assignment {
            worker_id,
            worker,
            registration,
        }) = self.assign_next()
        else {
            return;
        };

        let proxy_id = self.ids.generate_proxy_id();
        let pool: Weak<dyn Recycle> = Arc::downgrade(self) as Weak<dyn Recycle>;
        let proxy = WorkerProxy::new(proxy_id, worker_id, worker, pool);

        tracing::debug!(
            registration = %registration.id,
            worker = %worker_id,
            proxy = %proxy_id,
            "worker assigned"
        );

        (registration.handler)(proxy);
    }

    fn assign_next(&self) -> Option<Assignment<F::Worker>> {
        let mut state = self.lock();

        let worker_id = match state.idle.pop_front() {
            Some(id) => id,
            None => {
                self.create_worker(&mut state)?;
                state.idle.pop_front()?
            }
        };

        let worker = state.workers.get(&worker_id).cloned()?;

        let Some(registration) = state.pop_pending() else {
            // Nobody is waiting (e.g. the registration was withdrawn).
            state.idle.push_front(worker_id);
            return None;
        };
        state.busy.push_back(worker_id);

        Some(Assignment {
            worker_id,
            worker,
            registration,
        })
    }

    /// New workers enter through `idle`, the same door recycled ones use.
    fn create_worker(&self, state: &mut PoolState<F::Worker>) -> Option<WorkerId> {
        if state.created >= self.capacity {
            return None;
        }

        let worker_id = self.ids.generate_worker_id();
        let worker = self.factory.create(&self.locator);
        state.workers.insert(worker_id, Arc::new(worker));
        state.idle.push_back(worker_id);
        state.created += 1;

        tracing::debug!(
            worker = %worker_id,
            created = state.created,
            capacity = self.capacity,
            "worker created"
        );
        Some(worker_id)
    }
}

impl<F: WorkerFactory> Recycle for Shared<F> {
    fn recycle(self: Arc<Self>, worker_id: WorkerId) {
        {
            let mut state = self.lock();
            if !state.busy.remove(&worker_id) {
                return;
            }
            state.idle.push_back(worker_id);
            tracing::debug!(
                worker = %worker_id,
                pending = state.pending.len(),
                "worker returned to idle"
            );
        }
        self.execute();
    }
}

impl<F: WorkerFactory> Withdraw for Shared<F> {
    fn withdraw(&self, id: RegistrationId) -> bool {
        let registration = {
            let mut state = self.lock();
            state.pending.remove(&id);
            state.registrations.remove(&id)
        };

        let withdrawn = registration.is_some();
        if withdrawn {
            tracing::debug!(registration = %id, "registration withdrawn");
        }
        withdrawn
    }
}

/// Bounded pool of workers created lazily from one script locator.
///
/// # 使用例
/// ```ignore
/// let pool = WorkerPool::new("images.resize.v1", PoolConfig::new(4), factory)?;
///
/// pool.register(|proxy| {
///     let p = proxy.clone();
///     proxy.set_on_message(Some(Listener::new(move |event| {
///         println!("{:?}", event.data());
///         p.release();
///     })));
///     proxy.post_message(json!({ "width": 640 }));
/// });
/// ```
pub struct WorkerPool<F: WorkerFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: WorkerFactory> WorkerPool<F> {
    /// Create an empty pool; no worker exists until the first `register`.
    ///
    /// `config.max == 0` is rejected with `ConfigError::ZeroCapacity`. It does
    /// not fall back to `DEFAULT_MAX_WORKERS`; only an unset
    /// `WARREN_MAX_WORKERS` does (see `PoolConfig::from_env`).
    pub fn new(
        locator: impl Into<ScriptLocator>,
        config: PoolConfig,
        factory: F,
    ) -> Result<Self, ConfigError> {
        Self::with_id_generator(
            locator.into(),
            config,
            factory,
            Box::new(UlidGenerator::new(SystemClock)),
        )
    }

    pub(crate) fn with_id_generator(
        locator: ScriptLocator,
        config: PoolConfig,
        factory: F,
        ids: Box<dyn IdGenerator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        tracing::info!(%locator, capacity = config.max, "worker pool created");

        Ok(Self {
            shared: Arc::new(Shared {
                locator,
                capacity: config.max,
                factory,
                ids,
                state: Mutex::new(PoolState::new()),
            }),
        })
    }

    /// Ask for a worker.
    ///
    /// `handler` runs with a proxy as soon as a worker is free, which may be
    /// before `register` returns. Otherwise the registration waits in FIFO
    /// order until another task releases its proxy.
    ///
    /// The handler owns the proxy and must see it released. If the handler
    /// panics before handing the proxy off, the proxy is dropped unreleased
    /// and its worker stays busy for the life of the pool, the same leak as
    /// a forgotten `WorkerProxy::release`.
    pub fn register<H>(&self, handler: H) -> Deregistration
    where
        H: FnOnce(WorkerProxy<F::Worker>) + Send + 'static,
    {
        let id = self.shared.ids.generate_registration_id();
        {
            let mut state = self.shared.lock();
            state.pending.push_back(id);
            state.registrations.insert(
                id,
                Registration {
                    id,
                    handler: Box::new(handler),
                },
            );
            tracing::debug!(registration = %id, pending = state.pending.len(), "task registered");
        }

        self.shared.execute();

        let pool: Weak<dyn Withdraw> = Arc::downgrade(&self.shared) as Weak<dyn Withdraw>;
        Deregistration::new(id, pool)
    }

    pub fn counts(&self) -> PoolCounts {
        let state = self.shared.lock();
        PoolCounts {
            idle: state.idle.len(),
            busy: state.busy.len(),
            pending: state.pending.len(),
            created: state.created,
            capacity: self.shared.capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn locator(&self) -> &ScriptLocator {
        &self.shared.locator
    }

    pub fn factory(&self) -> &F {
        &self.shared.factory
    }

    /// Ids of idle workers, oldest first.
    pub fn idle_workers(&self) -> Vec<WorkerId> {
        self.shared.lock().idle.iter().copied().collect()
    }

    /// Ids of workers currently assigned to a proxy, in assignment order.
    pub fn busy_workers(&self) -> Vec<WorkerId> {
        self.shared.lock().busy.iter().copied().collect()
    }
}

impl<F: WorkerFactory> fmt::Debug for WorkerPool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("locator", &self.shared.locator)
            .field("counts", &self.counts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventType, Listener, ListenerOptions, WorkerEvent};
    use crate::impls::{InMemoryWorker, InMemoryWorkerFactory};
    use crate::ports::Worker;
    use rstest::rstest;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc as std_mpsc;
    use std::thread;
    use std::time::Duration;

    type Proxy = WorkerProxy<InMemoryWorker>;
    type Slot = Arc<Mutex<Option<Proxy>>>;

    fn pool(max: usize) -> WorkerPool<InMemoryWorkerFactory> {
        WorkerPool::new("test.script", PoolConfig::new(max), InMemoryWorkerFactory::new()).unwrap()
    }

    /// Register a task that parks its proxy in the returned slot.
    fn park(pool: &WorkerPool<InMemoryWorkerFactory>) -> (Slot, Deregistration) {
        let slot: Slot = Arc::new(Mutex::new(None));
        let s = Arc::clone(&slot);
        let dereg = pool.register(move |proxy| {
            *s.lock().unwrap() = Some(proxy);
        });
        (slot, dereg)
    }

    fn taken(slot: &Slot) -> Proxy {
        slot.lock().unwrap().clone().expect("handler has not run")
    }

    fn assert_invariants(pool: &WorkerPool<InMemoryWorkerFactory>) {
        let counts = pool.counts();
        assert_eq!(counts.idle + counts.busy, counts.created);
        assert!(counts.created <= counts.capacity);
        let idle = pool.idle_workers();
        assert!(pool.busy_workers().iter().all(|w| !idle.contains(w)));
    }

    #[test]
    fn zero_capacity_is_a_config_error() {
        let result = WorkerPool::new("x", PoolConfig::new(0), InMemoryWorkerFactory::new());
        assert!(matches!(result, Err(ConfigError::ZeroCapacity)));
    }

    #[test]
    fn no_worker_is_created_before_the_first_registration() {
        let pool = pool(3);
        assert_eq!(pool.counts(), PoolCounts { capacity: 3, ..PoolCounts::default() });
        assert_eq!(pool.factory().created_count(), 0);
    }

    #[test]
    fn capacity_one_hands_the_same_worker_to_the_next_registration() {
        let pool = pool(1);

        let (a, _) = park(&pool);
        let proxy_a = taken(&a);
        assert_eq!(pool.counts().created, 1);

        let (b, _) = park(&pool);
        assert!(b.lock().unwrap().is_none());
        assert_eq!(pool.counts().pending, 1);

        proxy_a.release();

        let proxy_b = taken(&b);
        assert_eq!(proxy_b.worker_id(), proxy_a.worker_id());
        assert_ne!(proxy_b.id(), proxy_a.id());
        assert_eq!(pool.factory().created_count(), 1);
        assert_invariants(&pool);
    }

    #[test]
    fn capacity_two_queues_the_third_and_reuses_the_first_worker() {
        let pool = pool(2);

        let (a, _) = park(&pool);
        let (b, _) = park(&pool);
        let proxy_a = taken(&a);
        let proxy_b = taken(&b);
        assert_ne!(proxy_a.worker_id(), proxy_b.worker_id());
        assert_eq!(pool.counts().created, 2);

        let (c, _) = park(&pool);
        assert!(c.lock().unwrap().is_none());

        proxy_a.release();

        assert_eq!(taken(&c).worker_id(), proxy_a.worker_id());
        assert_eq!(
            pool.counts(),
            PoolCounts {
                idle: 0,
                busy: 2,
                pending: 0,
                created: 2,
                capacity: 2,
            }
        );
    }

    #[test]
    fn pending_registrations_are_served_in_order() {
        let pool = pool(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        let (first, _) = park(&pool);
        for name in ["r1", "r2", "r3"] {
            let order = Arc::clone(&order);
            pool.register(move |proxy| {
                order.lock().unwrap().push(name);
                proxy.release();
            });
        }
        assert!(order.lock().unwrap().is_empty());

        taken(&first).release();

        // Each handler releases immediately, so one release drains the queue.
        assert_eq!(*order.lock().unwrap(), vec!["r1", "r2", "r3"]);
        assert_eq!(pool.counts().pending, 0);
        assert_eq!(pool.counts().idle, 1);
    }

    #[test]
    fn idle_workers_are_reused_oldest_first() {
        let pool = pool(3);
        let proxies: Vec<Proxy> = (0..3).map(|_| taken(&park(&pool).0)).collect();

        proxies[1].release();
        proxies[0].release();
        proxies[2].release();
        assert_eq!(
            pool.idle_workers(),
            vec![proxies[1].worker_id(), proxies[0].worker_id(), proxies[2].worker_id()]
        );

        let next = taken(&park(&pool).0);
        assert_eq!(next.worker_id(), proxies[1].worker_id());
        assert_eq!(
            pool.idle_workers(),
            vec![proxies[0].worker_id(), proxies[2].worker_id()]
        );
    }

    #[test]
    fn cancelled_registration_never_runs() {
        let pool = pool(1);
        let (holder, _) = park(&pool);

        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        let dereg = pool.register(move |proxy| {
            r.fetch_add(1, Ordering::SeqCst);
            proxy.release();
        });

        assert!(dereg.cancel());
        assert!(!dereg.cancel());
        assert_eq!(pool.counts().pending, 0);

        taken(&holder).release();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pool.counts().idle, 1);
        assert_invariants(&pool);
    }

    #[test]
    fn cancel_after_match_is_a_no_op() {
        let pool = pool(1);
        let (slot, dereg) = park(&pool);

        assert!(!dereg.cancel());
        assert!(!taken(&slot).is_released());
        assert_eq!(pool.counts().busy, 1);
    }

    #[test]
    fn cancel_skips_only_the_withdrawn_registration() {
        let pool = pool(1);
        let (holder, _) = park(&pool);
        let (b, dereg_b) = park(&pool);
        let (c, _) = park(&pool);

        dereg_b.cancel();
        taken(&holder).release();

        assert!(b.lock().unwrap().is_none());
        assert!(c.lock().unwrap().is_some());
    }

    #[test]
    fn double_release_does_not_free_a_worker_twice() {
        let pool = pool(1);
        let (a, _) = park(&pool);
        let proxy_a = taken(&a);
        let (b, _) = park(&pool);
        let (c, _) = park(&pool);

        proxy_a.release();
        proxy_a.release();

        assert!(b.lock().unwrap().is_some());
        assert!(c.lock().unwrap().is_none());
        assert_eq!(pool.counts().busy, 1);
        assert_invariants(&pool);
    }

    #[test]
    fn recycled_worker_carries_no_stale_listeners() {
        let pool = pool(1);
        let (a, _) = park(&pool);
        let proxy_a = taken(&a);

        let stale_hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&stale_hits);
        let stale = Listener::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        proxy_a.set_on_message(Some(stale.clone()));
        proxy_a.add_listener(&EventType::MESSAGE, stale.clone(), ListenerOptions::default());
        proxy_a.add_listener(&EventType::new("progress"), stale, ListenerOptions::capture());

        let (b, _) = park(&pool);
        proxy_a.release();
        let proxy_b = taken(&b);

        let worker = &pool.factory().created()[0];
        assert_eq!(worker.events().listener_count(), 0);
        assert!(worker.on_message().is_none());

        worker.emit(&WorkerEvent::Message(json!("for b")));
        assert_eq!(stale_hits.load(Ordering::SeqCst), 0);
        assert!(!proxy_b.is_released());
    }

    #[test]
    fn release_from_a_message_listener_unblocks_the_queue() {
        let pool = pool(1);
        let served = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let served = Arc::clone(&served);
            pool.register(move |proxy| {
                let p = proxy.clone();
                let served = Arc::clone(&served);
                proxy.set_on_message(Some(Listener::new(move |event| {
                    served.lock().unwrap().push(event.data().cloned());
                    p.release();
                })));
                proxy.post_message(json!(i));
            });
        }

        let worker = pool.factory().created()[0].clone();
        for reply in ["a", "b", "c"] {
            worker.emit(&WorkerEvent::Message(json!(reply)));
        }

        assert_eq!(
            *served.lock().unwrap(),
            vec![Some(json!("a")), Some(json!("b")), Some(json!("c"))]
        );
        assert_eq!(worker.posted(), vec![json!(0), json!(1), json!(2)]);
        assert_eq!(pool.counts().idle, 1);
    }

    #[test]
    fn release_from_on_message_silences_the_other_listeners_of_that_task() {
        let pool = pool(1);
        let stale_hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&stale_hits);
        pool.register(move |proxy| {
            let p = proxy.clone();
            proxy.set_on_message(Some(Listener::new(move |_| p.release())));
            proxy.add_listener(
                &EventType::MESSAGE,
                Listener::new(move |_| {
                    h.fetch_add(1, Ordering::SeqCst);
                }),
                ListenerOptions::default(),
            );
        });
        let (b, _) = park(&pool);
        assert!(b.lock().unwrap().is_none());

        let worker = pool.factory().created()[0].clone();
        let ran = worker.emit(&WorkerEvent::Message(json!("for a")));

        assert_eq!(ran, 1);
        assert_eq!(stale_hits.load(Ordering::SeqCst), 0);
        assert!(!taken(&b).is_released());
        assert_eq!(worker.events().listener_count(), 0);
    }

    #[test]
    fn panicking_handler_leaves_the_pool_usable_but_leaks_its_worker() {
        let pool = pool(2);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pool.register(|_proxy| panic!("handler failed"));
        }));
        assert!(result.is_err());
        assert_eq!(pool.counts().busy, 1);

        let (slot, _) = park(&pool);
        assert!(!taken(&slot).is_released());
        assert_eq!(pool.counts().created, 2);
        assert_invariants(&pool);
    }

    #[test]
    fn concurrent_register_and_release_keep_the_invariants() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 2000;
        const CAPACITY: usize = 3;

        let pool = Arc::new(pool(CAPACITY));
        let ran = Arc::new(AtomicUsize::new(0));
        let live = Arc::new(Mutex::new(HashSet::new()));
        let (tx, rx) = std_mpsc::channel::<Proxy>();

        // Proxies are released on their own thread, never inside the handler.
        let releaser = {
            let live = Arc::clone(&live);
            thread::spawn(move || {
                while let Ok(proxy) = rx.recv_timeout(Duration::from_secs(10)) {
                    live.lock().unwrap().remove(&proxy.worker_id());
                    proxy.release();
                }
            })
        };

        let registrars: Vec<_> = (0..THREADS)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let ran = Arc::clone(&ran);
                let live = Arc::clone(&live);
                let tx = tx.clone();
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        let (ran, live, tx) = (Arc::clone(&ran), Arc::clone(&live), tx.clone());
                        pool.register(move |proxy| {
                            assert!(
                                live.lock().unwrap().insert(proxy.worker_id()),
                                "worker handed to two live proxies"
                            );
                            ran.fetch_add(1, Ordering::SeqCst);
                            tx.send(proxy).unwrap();
                        });

                        let counts = pool.counts();
                        assert_eq!(counts.idle + counts.busy, counts.created);
                        assert!(counts.created <= CAPACITY);
                    }
                })
            })
            .collect();
        drop(tx);

        for registrar in registrars {
            registrar.join().unwrap();
        }
        releaser.join().unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), THREADS * PER_THREAD);
        assert_eq!(
            pool.counts(),
            PoolCounts {
                idle: CAPACITY,
                busy: 0,
                pending: 0,
                created: CAPACITY,
                capacity: CAPACITY,
            }
        );
        assert_eq!(pool.factory().created_count(), CAPACITY);
    }

    #[rstest]
    #[case(1, 5)]
    #[case(2, 7)]
    #[case(4, 4)]
    #[case(3, 10)]
    fn never_creates_more_than_capacity(#[case] capacity: usize, #[case] tasks: usize) {
        let pool = pool(capacity);
        let slots: Vec<Slot> = (0..tasks).map(|_| park(&pool).0).collect();

        assert_eq!(pool.counts().created, capacity.min(tasks));
        assert_eq!(pool.counts().pending, tasks.saturating_sub(capacity));
        assert_invariants(&pool);

        // Release in registration order until everyone has been served.
        let mut released = 0;
        while released < tasks {
            let proxy = taken(&slots[released]);
            let live: Vec<_> = slots
                .iter()
                .filter_map(|s| s.lock().unwrap().clone())
                .filter(|p| !p.is_released())
                .map(|p| p.worker_id())
                .collect();
            let mut unique = live.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), live.len(), "two live proxies share a worker");

            proxy.release();
            released += 1;
            assert_invariants(&pool);
        }

        assert_eq!(pool.factory().created_count(), capacity.min(tasks));
        assert_eq!(pool.counts().idle, capacity.min(tasks));
    }

    #[test]
    fn pools_do_not_share_workers_or_capacity() {
        let left = pool(1);
        let right = pool(1);

        let (a, _) = park(&left);
        let (b, _) = park(&right);

        assert!(a.lock().unwrap().is_some());
        assert!(b.lock().unwrap().is_some());
        assert_eq!(left.factory().created_count(), 1);
        assert_eq!(right.factory().created_count(), 1);
    }

    #[test]
    fn handler_may_register_again_from_inside() {
        let pool = Arc::new(pool(1));
        let inner_ran = Arc::new(AtomicUsize::new(0));

        let p = Arc::clone(&pool);
        let r = Arc::clone(&inner_ran);
        pool.register(move |proxy| {
            let r2 = Arc::clone(&r);
            p.register(move |inner| {
                r2.fetch_add(1, Ordering::SeqCst);
                inner.release();
            });
            assert_eq!(r.load(Ordering::SeqCst), 0);
            proxy.release();
        });

        assert_eq!(inner_ran.load(Ordering::SeqCst), 1);
        assert_invariants(&pool);
    }

    #[test]
    fn dropping_the_pool_turns_release_and_cancel_into_no_ops() {
        let pool = pool(1);
        let (a, _) = park(&pool);
        let (_, dereg) = park(&pool);
        let proxy = taken(&a);
        drop(pool);

        proxy.release();
        assert!(proxy.is_released());
        assert!(!dereg.cancel());
    }
}
