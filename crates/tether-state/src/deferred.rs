//! Sequential dispatcher for deferred observers
//!
//! Deferred notifications are queued on an unbounded channel drained by a
//! single task, so they run one at a time in the order they were produced.
//! The task is spawned lazily on the ambient tokio runtime and respawned if
//! that runtime has gone away. Without any runtime, notifications run to
//! completion inline.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::stats::Counters;
use crate::subscription::{DeferredFn, SubscriptionId};

pub(crate) struct Notification {
    pub(crate) key: String,
    pub(crate) id: SubscriptionId,
    pub(crate) observer: Arc<DeferredFn>,
    pub(crate) new: Value,
    pub(crate) old: Option<Value>,
}

enum Job {
    Notify(Notification),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
pub(crate) struct DeferredQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Notify(n) => write!(f, "Notify({}, {})", n.key, n.id),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl DeferredQueue {
    pub(crate) fn new(counters: Arc<Counters>) -> Self {
        Self {
            sender: Mutex::new(None),
            counters,
        }
    }

    pub(crate) fn submit(&self, notification: Notification) {
        let mut sender = self.sender.lock();
        let mut job = Job::Notify(notification);
        if let Some(tx) = sender.as_ref() {
            match tx.send(job) {
                Ok(()) => return,
                // dispatcher died with its runtime
                Err(mpsc::error::SendError(returned)) => job = returned,
            }
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let (tx, rx) = mpsc::unbounded_channel();
                handle.spawn(drain(rx, Arc::clone(&self.counters)));
                if tx.send(job).is_err() {
                    tracing::warn!("deferred dispatcher closed before first job");
                }
                *sender = Some(tx);
            }
            Err(_) => {
                *sender = None;
                drop(sender);
                futures::executor::block_on(run(job, &self.counters));
            }
        }
    }

    /// Wait until every notification queued so far has been delivered.
    pub(crate) async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        let queued = self
            .sender
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(Job::Flush(done_tx)).is_ok());
        if queued {
            done_rx.await.ok();
        }
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<Job>, counters: Arc<Counters>) {
    while let Some(job) = rx.recv().await {
        run(job, &counters).await;
    }
}

async fn run(job: Job, counters: &Counters) {
    match job {
        Job::Notify(Notification {
            key,
            id,
            observer,
            new,
            old,
        }) => {
            let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| observer(new, old))) {
                Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
                Err(payload) => Err(payload),
            };
            counters.record(&key, id, outcome);
        }
        Job::Flush(done) => {
            let _ = done.send(());
        }
    }
}
