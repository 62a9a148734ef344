//! Handler trait - Script を実行する Handler の定義
//!
//! # 二層構造
//! - `Handler<S>`: 型付き（S しか受け取れない）
//! - `DynScript`: object-safe（`serde_json::Value` で受け渡し）
//! - `TypedScript<S, H>` が前者を後者に型消去する

use super::script::Script;
use crate::domain::{ErrorKind, WorkerError};
use async_trait::async_trait;
use std::marker::PhantomData;

/// Handler は Script の入力を受け取って Output を返す
///
/// # 使用例
/// ```ignore
/// struct ResizeHandler;
///
/// #[async_trait]
/// impl Handler<Resize> for ResizeHandler {
///     async fn handle(&self, input: Resize) -> Result<ResizeDone, WorkerError> {
///         Ok(ResizeDone { width: input.width })
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<S: Script>: Send + Sync {
    async fn handle(&self, input: S) -> Result<S::Output, WorkerError>;
}

/// DynScript は object-safe な Handler の抽象化
#[async_trait]
pub trait DynScript: Send + Sync {
    async fn run_dyn(&self, message: serde_json::Value) -> Result<serde_json::Value, WorkerError>;
    fn locator(&self) -> &str;
}

pub struct TypedScript<S: Script, H: Handler<S>> {
    handler: H,
    _marker: PhantomData<S>,
}

impl<S: Script, H: Handler<S>> TypedScript<S, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<S: Script, H: Handler<S>> DynScript for TypedScript<S, H> {
    async fn run_dyn(&self, message: serde_json::Value) -> Result<serde_json::Value, WorkerError> {
        let input: S = serde_json::from_value(message)
            .map_err(|e| WorkerError::new(ErrorKind::Decode, format!("json decode: {e}")))?;
        let output = self.handler.handle(input).await?;
        serde_json::to_value(output)
            .map_err(|e| WorkerError::new(ErrorKind::Script, format!("json encode: {e}")))
    }

    fn locator(&self) -> &str {
        S::LOCATOR
    }
}
