//! Backend capability trait
//!
//! A backend is anything that can execute named operations. The bridge never
//! inspects a backend's concrete type; it asks [`Backend::supports`] whether
//! an operation name is exposed and then executes the returned
//! [`BackendCall`] off the caller's task.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tether_core::{Origin, TetherError};

/// Raw outcome of a backend call, before normalization into an envelope.
pub type BackendResult = Result<Value, TetherError>;

/// Work produced by a backend for one call.
///
/// `Blocking` work runs on the blocking thread pool; `Deferred` work is
/// spawned as an async task. The bridge treats both identically once joined.
pub enum BackendCall {
    /// Synchronous work that may block on I/O or locks
    Blocking(Box<dyn FnOnce() -> BackendResult + Send + 'static>),
    /// Asynchronous work
    Deferred(BoxFuture<'static, BackendResult>),
}

impl BackendCall {
    /// Wrap blocking work.
    pub fn blocking<F>(work: F) -> Self
    where
        F: FnOnce() -> BackendResult + Send + 'static,
    {
        Self::Blocking(Box::new(work))
    }

    /// Wrap asynchronous work.
    pub fn deferred<F>(work: F) -> Self
    where
        F: Future<Output = BackendResult> + Send + 'static,
    {
        Self::Deferred(work.boxed())
    }

    /// An already-computed result.
    pub fn ready(result: BackendResult) -> Self {
        Self::Deferred(futures::future::ready(result).boxed())
    }
}

impl fmt::Debug for BackendCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking(_) => f.write_str("BackendCall::Blocking"),
            Self::Deferred(_) => f.write_str("BackendCall::Deferred"),
        }
    }
}

/// A target the bridge can route operations to.
pub trait Backend: Send + Sync + 'static {
    /// Short name used in logs.
    fn label(&self) -> &str;

    /// Whether the backend can currently accept calls.
    ///
    /// An unavailable backend is skipped during routing as if it were
    /// detached.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether the backend exposes `operation`.
    fn supports(&self, operation: &str) -> bool;

    /// Produce the work for one call.
    ///
    /// Only called after `supports(operation)` returned true. May panic; the
    /// bridge contains it.
    fn call(&self, operation: &str, args: Value) -> BackendCall;
}

/// Which side of the bridge handled a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The attached real backend
    Real,
    /// The simulated store
    Simulated,
}

impl Target {
    /// Origin tag carried by envelopes from this target.
    pub fn origin(self) -> Origin {
        match self {
            Self::Real => Origin::Real,
            Self::Simulated => Origin::Simulated,
        }
    }
}
