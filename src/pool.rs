use std::{
    fmt, io,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use crate::{
    cache::{WorkerCache, WorkerShell},
    common::{PoolResult, Task},
    config::{DEFAULT_EXPIRY, PoolConfig},
    error::{PoolError, TaskFault},
    reaper::Reaper,
    stats::{Counters, PoolStats},
    worker::{self, Worker},
};

/// Called with every panic a task raises, instead of the default error log.
pub type FaultHandler = Arc<dyn Fn(&TaskFault) + Send + Sync>;

/// A bounded pool of reusable worker threads for fire-and-forget tasks.
///
/// At most `capacity` tasks execute at once. [`Pool::submit`] hands the task
/// to an idle worker, starts a new one while under capacity, and otherwise
/// blocks until a worker comes back. Workers idle for longer than the expiry
/// are evicted by a background reaper.
///
/// ```no_run
/// use std::time::Duration;
/// use workhive::Pool;
///
/// let pool = Pool::new(4, Duration::from_secs(3))?;
/// pool.submit(|| println!("running on a pooled worker"))?;
/// pool.release();
/// # Ok::<(), workhive::PoolError>(())
/// ```
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create a pool with the given capacity and idle expiry.
    ///
    /// Fails with [`PoolError::InvalidConfig`] if either is zero.
    pub fn new(capacity: usize, expiry: Duration) -> PoolResult<Self> {
        Self::builder().capacity(capacity).expiry(expiry).build()
    }

    /// Create a pool that evicts idle workers after [`DEFAULT_EXPIRY`].
    pub fn with_capacity(capacity: usize) -> PoolResult<Self> {
        Self::new(capacity, DEFAULT_EXPIRY)
    }

    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> PoolBuilder {
        PoolBuilder::default()
    }

    /// Hand `task` to a worker and return without waiting for it to run.
    ///
    /// Blocks while the pool is saturated. There is no timeout; callers that
    /// need a bounded wait must race this against their own deadline.
    /// A panic inside `task` is contained by the worker and never reaches
    /// the caller.
    pub fn submit<F>(&self, task: F) -> PoolResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.inner.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let mut task: Task = Box::new(task);
        loop {
            let worker = self.inner.acquire()?;
            match worker.assign(task) {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    debug!(worker = %worker.id(), "worker thread gone, retrying submit");
                    self.inner.discard();
                    task = returned;
                }
            }
        }
    }

    /// Close the pool and terminate its idle workers.
    ///
    /// Tasks already running are left to finish; their workers exit
    /// afterwards instead of becoming idle. Concurrent calls run the release
    /// once.
    pub fn release(&self) {
        self.inner.release();
    }

    /// Reopen a released pool. Returns `true` if the pool accepts tasks
    /// afterwards.
    ///
    /// Workers from before the release are never reused.
    pub fn restart(&self) -> bool {
        self.inner.restart()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Number of workers currently executing a task
    pub fn running(&self) -> usize {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Number of task slots not currently taken
    pub fn free(&self) -> usize {
        self.inner.capacity.saturating_sub(self.running())
    }

    /// Number of workers parked in the idle registry
    pub fn idle(&self) -> usize {
        self.inner.idle.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn expiry(&self) -> Duration {
        self.inner.expiry
    }

    pub fn stats(&self) -> PoolStats {
        let running = self.running();
        let counters = &self.inner.counters;

        PoolStats {
            capacity: self.inner.capacity,
            running,
            free: self.inner.capacity.saturating_sub(running),
            idle: self.idle(),
            workers_spawned: Counters::get(&counters.workers_spawned),
            workers_evicted: Counters::get(&counters.workers_evicted),
            tasks_completed: Counters::get(&counters.tasks_completed),
            tasks_faulted: Counters::get(&counters.tasks_faulted),
            releases: Counters::get(&counters.releases),
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.inner.capacity)
            .field("running", &self.running())
            .field("idle", &self.idle())
            .field("expiry", &self.inner.expiry)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[derive(Default)]
pub struct PoolBuilder {
    config: PoolConfig,
    fault_handler: Option<FaultHandler>,
}

impl PoolBuilder {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn expiry(mut self, expiry: Duration) -> Self {
        self.config.expiry = expiry;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default error log for panicking tasks.
    pub fn panic_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&TaskFault) + Send + Sync + 'static,
    {
        self.fault_handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> PoolResult<Pool> {
        self.config.validate()?;

        let inner = Arc::new(PoolInner {
            capacity: self.config.capacity,
            expiry: self.config.expiry,
            thread_name_prefix: self.config.thread_name_prefix,
            running: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            idle: Mutex::new(Vec::with_capacity(self.config.capacity)),
            available: Condvar::new(),
            cache: WorkerCache::new(self.config.capacity),
            fault_handler: self.fault_handler,
            reaper: Mutex::new(None),
            counters: Counters::default(),
        });

        let reaper = inner
            .start_reaper()
            .map_err(|e| PoolError::worker_spawn(e.to_string()))?;
        *inner.reaper.lock() = Some(reaper);

        Ok(Pool { inner })
    }
}

impl fmt::Debug for PoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("config", &self.config)
            .field("panic_handler", &self.fault_handler.is_some())
            .finish()
    }
}

pub(crate) struct PoolInner {
    capacity: usize,
    expiry: Duration,
    thread_name_prefix: String,
    /// Workers holding a task. Only changed while `idle` is locked, so it
    /// moves together with the idle registry; read lock-free.
    running: AtomicUsize,
    closed: AtomicBool,
    /// Bumped on every release, while `idle` is locked. Workers of an older
    /// generation are not taken back into the registry.
    generation: AtomicU64,
    /// Idle registry; the most recently returned worker is on top
    idle: Mutex<Vec<Worker>>,
    /// Signalled whenever a worker returns or a running slot frees up
    available: Condvar,
    cache: WorkerCache,
    fault_handler: Option<FaultHandler>,
    /// Also serialises release against restart
    reaper: Mutex<Option<Reaper>>,
    counters: Counters,
}

impl PoolInner {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn thread_name_prefix(&self) -> &str {
        &self.thread_name_prefix
    }

    fn start_reaper(self: &Arc<Self>) -> io::Result<Reaper> {
        Reaper::start(
            Arc::downgrade(self),
            self.expiry,
            format!("{}-reaper", self.thread_name_prefix),
        )
    }

    /// Take an idle worker, start a new one while under capacity, or wait.
    ///
    /// On success the running count already includes the returned worker.
    fn acquire(self: &Arc<Self>) -> PoolResult<Worker> {
        let mut idle = self.idle.lock();

        loop {
            if self.is_closed() {
                return Err(PoolError::PoolClosed);
            }

            if let Some(worker) = idle.pop() {
                self.running.fetch_add(1, Ordering::AcqRel);
                return Ok(worker);
            }

            if self.running.load(Ordering::Acquire) < self.capacity {
                self.running.fetch_add(1, Ordering::AcqRel);
                let generation = self.generation.load(Ordering::Acquire);
                drop(idle);
                return self.spawn_worker(generation);
            }

            self.available.wait(&mut idle);
        }
    }

    fn spawn_worker(self: &Arc<Self>, generation: u64) -> PoolResult<Worker> {
        let shell = self.cache.get(generation);

        match worker::spawn(self, shell) {
            Ok(worker) => {
                Counters::incr(&self.counters.workers_spawned);
                debug!(worker = %worker.id(), generation, "worker spawned");
                Ok(worker)
            }
            Err(err) => {
                error!(error = %err, "failed to spawn worker thread");
                self.discard();
                Err(PoolError::worker_spawn(err.to_string()))
            }
        }
    }

    /// Give back a running slot whose worker never got its task.
    fn discard(&self) {
        let _idle = self.idle.lock();
        self.running.fetch_sub(1, Ordering::AcqRel);
        self.available.notify_one();
    }

    /// Return a worker that finished its task to the idle registry.
    ///
    /// Returns `false` if the worker must exit instead: the pool is closed,
    /// or it was released and restarted since the worker was started.
    pub(crate) fn checkin(&self, mut worker: Worker) -> bool {
        let mut idle = self.idle.lock();
        self.running.fetch_sub(1, Ordering::AcqRel);

        let accepted =
            !self.is_closed() && worker.generation() == self.generation.load(Ordering::Acquire);
        if accepted {
            worker.touch(Instant::now());
            idle.push(worker);
        }

        self.available.notify_one();
        accepted
    }

    /// Called by a worker thread on its way out.
    pub(crate) fn recycle(&self, shell: WorkerShell) {
        self.cache
            .put(shell, self.generation.load(Ordering::Acquire));
    }

    pub(crate) fn record_completed(&self) {
        Counters::incr(&self.counters.tasks_completed);
    }

    pub(crate) fn report_fault(&self, fault: &TaskFault) {
        Counters::incr(&self.counters.tasks_faulted);

        match &self.fault_handler {
            Some(handler) => {
                if panic::catch_unwind(AssertUnwindSafe(|| (**handler)(fault))).is_err() {
                    error!(worker = %fault.worker, fault = %fault.message, "panic handler panicked");
                }
            }
            None => {
                error!(worker = %fault.worker, fault = %fault.message, "task panicked");
            }
        }
    }

    /// Terminate idle workers that have been idle for longer than the expiry.
    ///
    /// The registry is ordered by return time, oldest at the bottom, so the
    /// expired workers form a prefix of it.
    pub(crate) fn evict_expired(&self, now: Instant) -> usize {
        let mut idle = self.idle.lock();

        let expired = idle
            .iter()
            .take_while(|worker| worker.idle_for(now) > self.expiry)
            .count();
        for worker in idle.drain(..expired) {
            worker.terminate();
        }
        let remaining = idle.len();
        drop(idle);

        if expired > 0 {
            Counters::add(&self.counters.workers_evicted, expired);
            debug!(evicted = expired, idle = remaining, "evicted expired workers");
        }
        expired
    }

    fn release(&self) {
        let mut reaper = self.reaper.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let terminated = {
            let mut idle = self.idle.lock();
            self.generation.fetch_add(1, Ordering::AcqRel);
            for worker in idle.iter() {
                worker.terminate();
            }
            let terminated = idle.len();
            idle.clear();
            // Wake blocked submitters so they observe the closed flag
            self.available.notify_all();
            terminated
        };
        self.cache.clear();
        Counters::incr(&self.counters.releases);

        let stopped = reaper.take();
        drop(reaper);
        if let Some(stopped) = stopped {
            stopped.stop();
        }

        info!(terminated, running = self.running.load(Ordering::Acquire), "pool released");
    }

    fn restart(self: &Arc<Self>) -> bool {
        let mut reaper = self.reaper.lock();
        if !self.is_closed() {
            return true;
        }

        self.closed.store(false, Ordering::Release);
        match self.start_reaper() {
            Ok(started) => {
                *reaper = Some(started);
                info!("pool restarted");
                true
            }
            Err(err) => {
                self.closed.store(true, Ordering::Release);
                error!(error = %err, "failed to start reaper, pool stays closed");
                false
            }
        }
    }
}
