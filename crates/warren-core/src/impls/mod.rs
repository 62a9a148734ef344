//! Impls - Worker port の実装
//!
//! # 含まれる実装
//! - **EventTarget**: ハンドラ／listener テーブル（各 worker 実装で共有）
//! - **InMemoryWorker**: 何も実行しない開発・テスト用 worker
//! - **TokioWorker**: tokio タスク上で `ScriptRegistry` の Script を実行する worker

pub mod event_target;
pub mod inmem_worker;
pub mod tokio_worker;

pub use self::event_target::EventTarget;
pub use self::inmem_worker::{InMemoryWorker, InMemoryWorkerFactory};
pub use self::tokio_worker::{TokioWorker, TokioWorkerFactory};
