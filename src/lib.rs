//! A bounded pool of reusable worker threads for fire-and-forget tasks.
//!
//! Workers are started lazily up to the pool's capacity, parked in a LIFO
//! idle registry between tasks, and evicted by a background reaper once they
//! have been idle for longer than the configured expiry. Submitting to a
//! saturated pool blocks until a worker frees up. A panicking task is caught
//! at the worker boundary and reported, without taking the worker or the
//! pool down with it.

mod cache;
mod reaper;
mod worker;

pub mod common;
pub mod config;
pub mod error;
pub mod logging;
pub mod pool;
pub mod stats;

pub use common::{PoolResult, Task, WorkerId};
pub use config::{DEFAULT_EXPIRY, PoolConfig};
pub use error::{PoolError, TaskFault};
pub use pool::{FaultHandler, Pool, PoolBuilder};
pub use stats::PoolStats;
