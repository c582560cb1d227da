use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time view of a pool, for observability.
///
/// Each field is read independently, so a snapshot taken while tasks are
/// moving through the pool may be slightly inconsistent across fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    /// Workers currently executing a task
    pub running: usize,
    /// `capacity - running`
    pub free: usize,
    /// Workers parked in the idle registry
    pub idle: usize,
    pub workers_spawned: usize,
    pub workers_evicted: usize,
    pub tasks_completed: usize,
    pub tasks_faulted: usize,
    /// How many times a release actually took effect
    pub releases: usize,
}

impl PoolStats {
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.running as f64 / self.capacity as f64
    }

    pub fn fault_rate(&self) -> f64 {
        let total = self.tasks_completed + self.tasks_faulted;
        if total == 0 {
            return 0.0;
        }
        self.tasks_faulted as f64 / total as f64
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) workers_spawned: AtomicUsize,
    pub(crate) workers_evicted: AtomicUsize,
    pub(crate) tasks_completed: AtomicUsize,
    pub(crate) tasks_faulted: AtomicUsize,
    pub(crate) releases: AtomicUsize,
}

impl Counters {
    pub(crate) fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}
