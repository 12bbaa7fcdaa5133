//! Notification counters

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::subscription::{ObserverError, SubscriptionId};

/// Notification statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateStats {
    /// Observer invocations that completed successfully
    pub notifications_delivered: u64,
    /// Writes suppressed because the value was structurally equal
    pub writes_deduplicated: u64,
    /// Observer invocations that returned an error or panicked
    pub observer_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    delivered: AtomicU64,
    deduplicated: AtomicU64,
    failures: AtomicU64,
}

/// Result of running one observer, with panics captured.
pub(crate) type Outcome = Result<Result<(), ObserverError>, Box<dyn Any + Send>>;

impl Counters {
    pub(crate) fn deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, key: &str, id: SubscriptionId, outcome: Outcome) {
        match outcome {
            Ok(Ok(())) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(error)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key, subscription = %id, %error, "observer failed");
            }
            Err(payload) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                tracing::error!(key, subscription = %id, %detail, "observer panicked");
            }
        }
    }

    pub(crate) fn snapshot(&self) -> StateStats {
        StateStats {
            notifications_delivered: self.delivered.load(Ordering::Relaxed),
            writes_deduplicated: self.deduplicated.load(Ordering::Relaxed),
            observer_failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
