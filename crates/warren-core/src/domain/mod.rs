//! Domain model (ids, locator, events, errors).

pub mod errors;
pub mod event;
pub mod ids;
pub mod locator;

pub use errors::{ConfigError, ErrorKind, WorkerError};
pub use event::{EventType, Listener, ListenerOptions, WorkerEvent};
pub use ids::{ProxyId, RegistrationId, WorkerId};
pub use locator::ScriptLocator;
