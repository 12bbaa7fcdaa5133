//! Observers and subscription handles

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::manager::Shared;

/// Failure reported by an observer.
///
/// Observer failures are logged and counted; they never stop delivery to
/// the remaining observers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObserverError {
    /// The observer rejected the update
    #[error("observer failed: {message}")]
    Failed {
        /// Reason given by the observer
        message: String,
    },
}

impl ObserverError {
    /// Create an observer failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Synchronous callback receiving `(new, old)`.
pub type ImmediateFn = dyn Fn(&Value, Option<&Value>) -> Result<(), ObserverError> + Send + Sync;

/// Asynchronous callback receiving `(new, old)`.
pub type DeferredFn =
    dyn Fn(Value, Option<Value>) -> BoxFuture<'static, Result<(), ObserverError>> + Send + Sync;

/// A subscriber callback.
///
/// `Immediate` observers run inline, in registration order, before `set`
/// returns. `Deferred` observers are queued onto a single sequential
/// dispatcher task and run in the order their notifications were produced.
#[derive(Clone)]
pub enum Observer {
    /// Runs inline
    Immediate(Arc<ImmediateFn>),
    /// Runs on the dispatcher task
    Deferred(Arc<DeferredFn>),
}

impl Observer {
    /// Wrap a synchronous callback.
    pub fn immediate<F>(callback: F) -> Self
    where
        F: Fn(&Value, Option<&Value>) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        Self::Immediate(Arc::new(callback))
    }

    /// Wrap an asynchronous callback.
    pub fn deferred<F, Fut>(callback: F) -> Self
    where
        F: Fn(Value, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ObserverError>> + Send + 'static,
    {
        Self::Deferred(Arc::new(move |new, old| callback(new, old).boxed()))
    }

    /// Whether this observer runs on the dispatcher task.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(_) => f.write_str("Observer::Immediate"),
            Self::Deferred(_) => f.write_str("Observer::Deferred"),
        }
    }
}

/// Identifier of one subscription, unique per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub(crate) key: String,
    pub(crate) id: SubscriptionId,
}

impl SubscriptionHandle {
    /// Subscribed key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Subscription id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// Unsubscribes when dropped.
///
/// Holds only a weak reference to the manager, so a guard outliving its
/// manager is harmless.
#[derive(Debug)]
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct SubscriptionGuard {
    handle: Option<SubscriptionHandle>,
    manager: Weak<Shared>,
}

impl SubscriptionGuard {
    pub(crate) fn new(handle: SubscriptionHandle, manager: Weak<Shared>) -> Self {
        Self {
            handle: Some(handle),
            manager,
        }
    }

    /// The guarded subscription.
    pub fn handle(&self) -> Option<&SubscriptionHandle> {
        self.handle.as_ref()
    }

    /// Keep the subscription alive past the guard.
    pub fn detach(mut self) -> Option<SubscriptionHandle> {
        self.handle.take()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let (Some(handle), Some(shared)) = (self.handle.take(), self.manager.upgrade()) {
            shared.remove_subscriber(&handle);
        }
    }
}
