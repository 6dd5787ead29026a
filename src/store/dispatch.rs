//! Notification thread for the in-memory store.

use crate::error::{HandbookError, ProducerError, Result};
use crate::types::ChangeKind;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

use super::{ChildListener, ListenerId};

/// A registered listener as seen by the dispatcher.
#[derive(Clone)]
pub(crate) struct Target {
    pub id: ListenerId,
    pub listener: Arc<dyn ChildListener>,
    /// Cleared on unsubscribe, or when a queued cancel runs; checked before
    /// every call.
    pub active: Arc<AtomicBool>,
}

impl Target {
    /// A target that starts out active.
    pub fn new(id: ListenerId, listener: Arc<dyn ChildListener>) -> Self {
        Self {
            id,
            listener,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stop further calls. Returns whether the target was still active.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }
}

pub(crate) enum Job {
    Child {
        target: Target,
        kind: ChangeKind,
        key: String,
        value: Value,
    },
    Cancel {
        target: Target,
        error: ProducerError,
    },
    Flush(Sender<()>),
    Shutdown,
}

/// Runs listener callbacks on a dedicated thread, in enqueue order.
pub(crate) struct Dispatcher {
    sender: Sender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start the notification thread under `name`.
    pub fn spawn(name: &str) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(receiver))?;

        Ok(Self {
            sender,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue a job behind everything already queued.
    pub fn send(&self, job: Job) -> Result<()> {
        self.sender
            .send(job)
            .map_err(|_| HandbookError::DispatcherClosed)
    }

    /// Block until every job queued before this call has run.
    pub fn flush(&self) -> Result<()> {
        let (ack, done) = bounded(1);
        self.send(Job::Flush(ack))?;
        done.recv().map_err(|_| HandbookError::DispatcherClosed)
    }

    /// Stop the thread after it finishes the queued jobs.
    pub fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = self.sender.send(Job::Shutdown);
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                tracing::error!("dispatcher thread panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(receiver: Receiver<Job>) {
    for job in receiver.iter() {
        match job {
            Job::Child {
                target,
                kind,
                key,
                value,
            } => {
                if target.active.load(Ordering::Acquire) {
                    target.listener.on_child(kind, &key, &value);
                } else {
                    debug!(listener = ?target.id, %key, "skipping event for inactive listener");
                }
            }
            Job::Cancel { target, error } => {
                if target.deactivate() {
                    target.listener.on_cancelled(error);
                }
            }
            Job::Flush(ack) => {
                let _ = ack.send(());
            }
            Job::Shutdown => break,
        }
    }
    debug!("dispatcher stopped");
}
