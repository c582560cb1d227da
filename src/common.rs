use std::fmt::{self, Display};

use crate::error::PoolError;

pub type PoolResult<T> = std::result::Result<T, PoolError>;

/// A unit of work handed to the pool. Runs once, returns nothing.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Stable identity of a worker.
///
/// A worker keeps its id across reuse from the worker cache, so the id names
/// the worker slot rather than a single OS thread lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub(crate) u64);

impl WorkerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
