use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam::{
    channel::{self, Receiver, Sender},
    queue::ArrayQueue,
};

use crate::{common::WorkerId, worker::Message};

/// The reusable parts of a worker: its identity and its single-slot inbox.
///
/// A shell outlives the thread that drove it. When a worker exits (evicted,
/// released) its shell goes back to the [`WorkerCache`] and the next worker
/// the pool needs is started on it instead of allocating a fresh inbox.
#[derive(Debug)]
pub(crate) struct WorkerShell {
    pub(crate) id: WorkerId,
    /// Pool generation the shell was handed out for
    pub(crate) generation: u64,
    pub(crate) inbox: Sender<Message>,
    pub(crate) receiver: Receiver<Message>,
}

/// Bounded free list of worker shells, keyed by worker id.
///
/// Shells are tagged with the pool generation. Releasing the pool bumps the
/// generation, after which shells from the old generation are dropped rather
/// than handed out again.
pub(crate) struct WorkerCache {
    shells: ArrayQueue<WorkerShell>,
    next_id: AtomicU64,
    /// Number of shells ever allocated by this cache
    created: AtomicUsize,
}

impl WorkerCache {
    pub(crate) fn new(max_size: usize) -> Self {
        Self {
            shells: ArrayQueue::new(max_size),
            next_id: AtomicU64::new(1),
            created: AtomicUsize::new(0),
        }
    }

    /// Take a cached shell for `generation`, or allocate a new one.
    pub(crate) fn get(&self, generation: u64) -> WorkerShell {
        while let Some(mut shell) = self.shells.pop() {
            if shell.generation > generation {
                // Only possible if a caller holds a stale generation; the
                // shell belongs to a newer epoch, so keep it.
                let _ = self.shells.push(shell);
                break;
            }
            if shell.generation < generation {
                continue;
            }

            while shell.receiver.try_recv().is_ok() {}
            shell.generation = generation;
            return shell;
        }

        self.allocate(generation)
    }

    /// Return a shell whose worker thread has exited.
    ///
    /// Shells from a previous generation, or beyond the cache bound, are
    /// dropped.
    pub(crate) fn put(&self, shell: WorkerShell, generation: u64) -> bool {
        if shell.generation != generation {
            return false;
        }
        self.shells.push(shell).is_ok()
    }

    pub(crate) fn clear(&self) {
        while self.shells.pop().is_some() {}
    }

    pub(crate) fn available(&self) -> usize {
        self.shells.len()
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn allocate(&self, generation: u64) -> WorkerShell {
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (inbox, receiver) = channel::bounded(1);
        self.created.fetch_add(1, Ordering::Relaxed);

        WorkerShell {
            id,
            generation,
            inbox,
            receiver,
        }
    }
}

impl std::fmt::Debug for WorkerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerCache")
            .field("available", &self.available())
            .field("capacity", &self.shells.capacity())
            .field("created", &self.created())
            .finish()
    }
}
