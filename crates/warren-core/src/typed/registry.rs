//! ScriptRegistry - locator と Script の対応表
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性

use super::handler::{DynScript, Handler, TypedScript};
use super::script::Script;
use std::collections::HashMap;
use std::sync::Arc;

/// ScriptRegistry は型付き Handler を locator ごとに管理
///
/// # 使用例
/// ```ignore
/// let mut registry = ScriptRegistry::new();
/// registry.register::<Resize, _>(ResizeHandler)?;
///
/// let script = registry.get("images.resize.v1");
/// ```
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, Arc<dyn DynScript>>,
}

/// RegistryError は ScriptRegistry の操作エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Script '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
        }
    }

    pub fn register<S: Script, H: Handler<S> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        let locator = S::LOCATOR.to_string();
        if self.scripts.contains_key(&locator) {
            return Err(RegistryError::AlreadyRegistered(locator));
        }
        self.scripts
            .insert(locator, Arc::new(TypedScript::<S, H>::new(handler)));
        Ok(())
    }

    pub fn get(&self, locator: &str) -> Option<Arc<dyn DynScript>> {
        self.scripts.get(locator).cloned()
    }

    pub fn registered_locators(&self) -> Vec<String> {
        let mut locators: Vec<String> = self.scripts.keys().cloned().collect();
        locators.sort();
        locators
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
