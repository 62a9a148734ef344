//! Typed - 型付き Script API
//!
//! locator の typo を型で排除し、Handler との対応付けを静的に保証します。
//! `TokioWorker` はここで登録された Script を実行します。

pub mod handler;
pub mod registry;
pub mod script;

pub use self::handler::{DynScript, Handler, TypedScript};
pub use self::registry::{RegistryError, ScriptRegistry};
pub use self::script::Script;
