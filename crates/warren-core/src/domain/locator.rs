use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque value identifying what code a newly created worker runs.
///
/// The pool never interprets it; it is handed unchanged to every
/// `WorkerFactory::create` call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptLocator(String);

impl ScriptLocator {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ScriptLocator {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ScriptLocator {
    fn from(s: String) -> Self {
        Self(s)
    }
}
