//! Callback-invocation context.
//!
//! # Design
//! Transports complete on whatever thread they like. Completion callbacks are
//! then handed to a `Dispatch` implementation that decides where they run.
//! `CallbackQueue` runs them one at a time in FIFO order, so callbacks never
//! run concurrently with each other and may touch shared caller state
//! without extra locking. The consumer side is either a dedicated thread
//! (`spawn`) or a `CallbackPump` driven from the caller's own loop (`manual`).

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, warn};

/// A callback waiting to be delivered.
pub type Job = Box<dyn FnOnce() + Send>;

pub trait Dispatch: Send + Sync {
    fn dispatch(&self, job: Job);
}

/// Runs each job directly on the thread that completed the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Dispatch for Inline {
    fn dispatch(&self, job: Job) {
        run_job(job);
    }
}

/// Serial delivery context for completion callbacks.
#[derive(Debug, Clone)]
pub struct CallbackQueue {
    sender: Sender<Job>,
}

impl CallbackQueue {
    /// Start a named thread that runs queued jobs until every handle to the
    /// queue is dropped.
    pub fn spawn(name: &str) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let name = name.to_string();
        thread::Builder::new().name(name.clone()).spawn(move || {
            for job in receiver {
                run_job(job);
            }
            debug!("callback queue {name} shut down");
        })?;
        Ok(Self { sender })
    }

    /// Queue whose jobs run wherever the returned pump is driven.
    pub fn manual() -> (Self, CallbackPump) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, CallbackPump { receiver })
    }
}

impl Dispatch for CallbackQueue {
    fn dispatch(&self, job: Job) {
        if let Err(mpsc::SendError(job)) = self.sender.send(job) {
            warn!("callback queue is gone, running callback inline");
            run_job(job);
        }
    }
}

/// Consumer side of a manual `CallbackQueue`.
#[derive(Debug)]
pub struct CallbackPump {
    receiver: Receiver<Job>,
}

impl CallbackPump {
    /// Run every job already queued without waiting. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            run_job(job);
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one job and run it. Returns whether a job ran.
    pub fn run_next(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => {
                run_job(job);
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Run jobs until every queue handle has been dropped.
    pub fn run(self) {
        for job in self.receiver {
            run_job(job);
        }
    }
}

fn run_job(job: Job) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!("completion callback panicked");
    }
}
