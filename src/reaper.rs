use std::{
    io,
    sync::Weak,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use tracing::debug;

use crate::pool::PoolInner;

/// Background thread that evicts workers idle for longer than the pool's
/// expiry. Ticks once per expiry interval.
#[derive(Debug)]
pub(crate) struct Reaper {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Reaper {
    pub(crate) fn start(pool: Weak<PoolInner>, interval: Duration, name: String) -> io::Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let thread = thread::Builder::new().name(name).spawn(move || {
            loop {
                match shutdown_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                let Some(pool) = pool.upgrade() else { break };
                if pool.is_closed() {
                    break;
                }
                pool.evict_expired(Instant::now());
            }

            debug!("reaper stopped");
        })?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Stop ticking and wait for the thread to exit.
    pub(crate) fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        // Dropping the sender disconnects the shutdown channel
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
