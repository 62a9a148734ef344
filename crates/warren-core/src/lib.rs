//! warren-core
//!
//! Bounded pool of reusable workers created lazily from one script locator.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, locator, event, errors）
//! - **ports**: 抽象化レイヤー（Worker, WorkerFactory, IdGenerator, Clock）
//! - **queue**: 重複なし FIFO コンテナ（FifoSet）
//! - **app**: pool 本体（WorkerPool, WorkerProxy, PoolBuilder, PoolConfig）
//! - **typed**: 型付き Script API（Script trait, Handler trait, ScriptRegistry）
//! - **impls**: 実装（InMemoryWorker はテスト用、TokioWorker は本番用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod typed;

pub use app::{Deregistration, PoolBuilder, PoolConfig, PoolCounts, WorkerPool, WorkerProxy};
pub use domain::{
    ConfigError, ErrorKind, EventType, Listener, ListenerOptions, ScriptLocator, WorkerError,
    WorkerEvent,
};
