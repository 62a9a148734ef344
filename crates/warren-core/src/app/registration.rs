//! Registration - worker を待っているタスクの登録

use std::fmt;
use std::sync::Weak;

use super::proxy::WorkerProxy;
use crate::domain::RegistrationId;

pub(crate) type TaskHandler<W> = Box<dyn FnOnce(WorkerProxy<W>) + Send>;

/// A caller's request for a worker, owned by the pending queue until matched.
pub(crate) struct Registration<W> {
    pub(crate) id: RegistrationId,
    pub(crate) handler: TaskHandler<W>,
}

/// Removes a registration from the pending queue.
pub(crate) trait Withdraw: Send + Sync {
    fn withdraw(&self, id: RegistrationId) -> bool;
}

/// Handle returned by `WorkerPool::register`.
///
/// Dropping it does nothing; only `cancel` withdraws the registration.
pub struct Deregistration {
    id: RegistrationId,
    pool: Weak<dyn Withdraw>,
}

impl Deregistration {
    pub(crate) fn new(id: RegistrationId, pool: Weak<dyn Withdraw>) -> Self {
        Self { id, pool }
    }

    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Withdraw the registration if it is still waiting for a worker.
    ///
    /// Returns `true` only when this call removed it. Calling again, or
    /// after the registration was matched, is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        match self.pool.upgrade() {
            Some(pool) => pool.withdraw(self.id),
            None => false,
        }
    }
}

impl fmt::Debug for Deregistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deregistration").field("id", &self.id).finish()
    }
}
