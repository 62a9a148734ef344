//! Status - pool の状態スナップショット

use serde::{Deserialize, Serialize};

/// Point-in-time view of a pool's collections.
///
/// `idle + busy == created <= capacity` holds for every snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounts {
    pub idle: usize,
    pub busy: usize,
    pub pending: usize,
    pub created: usize,
    pub capacity: usize,
}

impl PoolCounts {
    /// No idle worker and no room to create one: new registrations will wait.
    pub fn is_saturated(&self) -> bool {
        self.idle == 0 && self.created >= self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturation_needs_no_idle_and_full_capacity() {
        let mut counts = PoolCounts {
            idle: 0,
            busy: 2,
            pending: 1,
            created: 2,
            capacity: 2,
        };
        assert!(counts.is_saturated());

        counts.capacity = 3;
        assert!(!counts.is_saturated());
    }
}
