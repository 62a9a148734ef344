//! Queue module: the insertion-ordered set backing every FIFO in the pool
//! (idle workers, busy workers, pending registrations).

mod fifo_set;

pub use fifo_set::{FifoSet, Iter};
