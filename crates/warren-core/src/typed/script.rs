//! Script trait - worker 上で動く型付きスクリプト
//!
//! # 学習ポイント
//! - Associated Constants (`const LOCATOR`)
//! - Associated Types (`type Output`)

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::ScriptLocator;

/// Script は locator と入力型を対応付ける
///
/// 入力型そのものに実装します（worker に post される message の型）。
///
/// # 使用例
/// ```ignore
/// #[derive(Deserialize)]
/// struct Resize { width: u32 }
///
/// impl Script for Resize {
///     const LOCATOR: &'static str = "images.resize.v1";
///     type Output = ResizeDone;
/// }
/// ```
pub trait Script: DeserializeOwned + Send + Sync + 'static {
    /// Locator under which the script is registered.
    ///
    /// # 命名規約
    /// - `{namespace}.{action}.v{major}`
    const LOCATOR: &'static str;

    /// Reply posted back to the caller as a `message` event.
    type Output: Serialize + Send + 'static;

    fn locator() -> ScriptLocator {
        ScriptLocator::new(Self::LOCATOR)
    }
}
