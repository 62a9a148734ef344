//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて worker pool を実装します。
//!
//! # 主要コンポーネント
//! - **WorkerPool**: worker の生成・割り当て・回収
//! - **WorkerProxy**: タスクが worker を排他的に使うための仲介
//! - **PoolBuilder**: pool の構築（起動時検証つき）
//! - **PoolConfig**: 容量などの設定（環境変数からも読める）

pub mod builder;
pub mod config;
pub mod pool;
pub mod proxy;
pub mod registration;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::PoolBuilder;
pub use self::config::{DEFAULT_MAX_WORKERS, MAX_WORKERS_ENV, PoolConfig};
pub use self::pool::WorkerPool;
pub use self::proxy::WorkerProxy;
pub use self::registration::Deregistration;
pub use self::status::PoolCounts;
