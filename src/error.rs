use std::any::Any;

use thiserror::Error;

use crate::common::WorkerId;

impl PoolError {
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        PoolError::InvalidConfig(message.into())
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        PoolError::Config(message.into())
    }

    pub fn worker_spawn<S: Into<String>>(message: S) -> Self {
        PoolError::WorkerSpawn(message.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A panic raised by a submitted task and caught at the worker boundary.
///
/// Faults never reach the submitter. They are handed to the pool's panic
/// handler, or logged at error level when none is set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Task on worker {worker} panicked: {message}")]
pub struct TaskFault {
    pub worker: WorkerId,
    pub message: String,
}

impl TaskFault {
    pub(crate) fn from_panic(worker: WorkerId, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };

        Self { worker, message }
    }
}
