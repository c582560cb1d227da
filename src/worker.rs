use std::{
    io,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
    thread,
    time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, SendError, Sender, TrySendError};
use tracing::debug;

use crate::{
    cache::WorkerShell,
    common::{Task, WorkerId},
    error::TaskFault,
    pool::PoolInner,
};

pub(crate) enum Message {
    Run(Task),
    Terminate,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Run(_) => f.write_str("Run(..)"),
            Message::Terminate => f.write_str("Terminate"),
        }
    }
}

/// Handle to a live worker thread, as held by the idle registry.
#[derive(Debug, Clone)]
pub(crate) struct Worker {
    id: WorkerId,
    generation: u64,
    inbox: Sender<Message>,
    last_active: Instant,
}

impl Worker {
    pub(crate) fn id(&self) -> WorkerId {
        self.id
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_active = now;
    }

    pub(crate) fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_active)
    }

    /// Hand a task to the worker. Hands the task back if the worker thread
    /// is gone.
    pub(crate) fn assign(&self, task: Task) -> Result<(), Task> {
        self.inbox
            .send(Message::Run(task))
            .map_err(|SendError(message)| match message {
                Message::Run(task) => task,
                Message::Terminate => unreachable!("assign only sends Run"),
            })
    }

    /// Ask the worker thread to exit. Idle workers have an empty inbox, so
    /// this never blocks.
    pub(crate) fn terminate(&self) {
        match self.inbox.try_send(Message::Terminate) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                debug!(worker = %self.id, "terminate skipped, inbox occupied");
            }
        }
    }
}

/// Start a worker thread on `shell`.
///
/// The thread only holds a weak reference to the pool; the pool's lifetime
/// is owned by the [`crate::Pool`] handle.
pub(crate) fn spawn(pool: &Arc<PoolInner>, shell: WorkerShell) -> io::Result<Worker> {
    let handle = Worker {
        id: shell.id,
        generation: shell.generation,
        inbox: shell.inbox.clone(),
        last_active: Instant::now(),
    };

    let worker_loop = WorkerLoop {
        handle: handle.clone(),
        shell,
        pool: Arc::downgrade(pool),
    };

    thread::Builder::new()
        .name(format!("{}-{}", pool.thread_name_prefix(), handle.id))
        .spawn(move || worker_loop.run())?;

    Ok(handle)
}

struct WorkerLoop {
    handle: Worker,
    shell: WorkerShell,
    pool: Weak<PoolInner>,
}

impl WorkerLoop {
    fn run(self) {
        let id = self.handle.id;
        debug!(worker = %id, "worker started");

        loop {
            let task = match recv(&self.shell.receiver) {
                Some(task) => task,
                None => break,
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(task));

            let Some(pool) = self.pool.upgrade() else {
                break;
            };

            match outcome {
                Ok(()) => pool.record_completed(),
                Err(payload) => {
                    let fault = TaskFault::from_panic(id, payload.as_ref());
                    pool.report_fault(&fault);
                }
            }

            // Reached after success and after a caught panic alike, so the
            // running count and idle registry stay consistent either way.
            if !pool.checkin(self.handle.clone()) {
                break;
            }
        }

        debug!(worker = %id, "worker exiting");
        if let Some(pool) = self.pool.upgrade() {
            pool.recycle(self.shell);
        }
    }
}

fn recv(receiver: &Receiver<Message>) -> Option<Task> {
    match receiver.recv() {
        Ok(Message::Run(task)) => Some(task),
        Ok(Message::Terminate) | Err(_) => None,
    }
}
