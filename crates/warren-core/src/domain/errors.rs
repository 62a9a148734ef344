//! Errors - エラー型と分類
//!
//! pool 本体はエラーを返しません（容量切れ・空キュー・二重 release はすべて no-op）。
//! ここにあるのは worker 側で起きた失敗と、設定時の失敗だけです。

use serde::{Deserialize, Serialize};

/// ErrorKind は worker 側エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The script ran and reported a failure.
    Script,
    /// The posted message did not decode into the script's input type.
    Decode,
    /// No script is registered under the worker's locator.
    NotFound,
    /// The worker is no longer running.
    Terminated,
}

/// Error raised inside a worker and delivered through its `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("worker error (kind: {kind:?}): {message}")]
pub struct WorkerError {
    kind: ErrorKind,
    message: String,
}

impl WorkerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn script(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Script, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error type for pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("pool capacity must be at least 1")]
    ZeroCapacity,

    #[error("failed to parse {key}='{value}': {error}")]
    Parse {
        key: String,
        value: String,
        error: String,
    },
}
