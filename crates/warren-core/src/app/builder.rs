//! PoolBuilder - WorkerPool の構築
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 差し替え可能な依存（IdGenerator）

use super::config::PoolConfig;
use super::pool::WorkerPool;
use crate::domain::{ConfigError, ScriptLocator};
use crate::ports::{IdGenerator, SystemClock, UlidGenerator, WorkerFactory};

/// PoolBuilder は WorkerPool を構築
///
/// # 使用例
/// ```ignore
/// let pool = PoolBuilder::new("images.resize.v1")
///     .max(4)
///     .build(factory)?;
/// ```
///
/// # Fail-fast 設計
/// - 容量 0 は `build()` の時点で `ConfigError::ZeroCapacity`
/// - 最初の `register` まで待たずに設定ミスを報告する
pub struct PoolBuilder {
    locator: ScriptLocator,
    config: PoolConfig,
    ids: Option<Box<dyn IdGenerator>>,
}

impl PoolBuilder {
    pub fn new(locator: impl Into<ScriptLocator>) -> Self {
        Self {
            locator: locator.into(),
            config: PoolConfig::default(),
            ids: None,
        }
    }

    /// 最大 worker 数を設定
    pub fn max(mut self, max: usize) -> Self {
        self.config.max = max;
        self
    }

    /// 設定をまとめて差し替え（`PoolConfig::from_env()` の結果など）
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// ID 生成器を差し替え（テストで Clock を固定したいときなど）
    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Box::new(ids));
        self
    }

    pub fn build<F: WorkerFactory>(self, factory: F) -> Result<WorkerPool<F>, ConfigError> {
        let ids = self
            .ids
            .unwrap_or_else(|| Box::new(UlidGenerator::new(SystemClock)));
        WorkerPool::with_id_generator(self.locator, self.config, factory, ids)
    }
}
