//! Delegation bridge
//!
//! Routes each named operation to the real backend when one is attached,
//! available and exposes the operation, and to the simulated store
//! otherwise. Whatever happens (success, typed failure, panic, cancellation)
//! the caller receives an [`Envelope`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tether_core::{BridgeConfig, Clock, Envelope, Origin, TetherError};
use tether_store::SimulatedStore;

use crate::backend::{Backend, BackendCall, BackendResult, Target};
use crate::simulated::SimulatedBackend;

/// Call counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Calls routed to the real backend
    pub real_calls: u64,
    /// Calls routed to the simulated store
    pub simulated_calls: u64,
    /// Calls no target supported
    pub unsupported: u64,
    /// Calls that produced a failed envelope (including unsupported and timeouts)
    pub failures: u64,
    /// Calls abandoned at a deadline
    pub timeouts: u64,
}

#[derive(Debug, Default)]
struct Counters {
    real_calls: AtomicU64,
    simulated_calls: AtomicU64,
    unsupported: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            real_calls: self.real_calls.load(Ordering::Relaxed),
            simulated_calls: self.simulated_calls.load(Ordering::Relaxed),
            unsupported: self.unsupported.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Routes named operations to the real or the simulated backend.
///
/// The bridge owns no data. It holds the simulated store adapter, an
/// optional real backend that can be attached and detached at runtime, and
/// the clock that stamps envelopes.
pub struct DelegationBridge {
    real: RwLock<Option<Arc<dyn Backend>>>,
    simulated: Arc<dyn Backend>,
    store: Arc<SimulatedStore>,
    clock: Arc<dyn Clock>,
    config: BridgeConfig,
    counters: Counters,
}

impl std::fmt::Debug for DelegationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationBridge")
            .field("real", &self.real.read().as_ref().map(|b| b.label().to_string()))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DelegationBridge {
    /// An offline bridge: every call goes to `store`.
    pub fn new(store: Arc<SimulatedStore>) -> Self {
        Self::with_config(store, BridgeConfig::default())
    }

    /// A bridge with explicit configuration. Envelopes are stamped with the
    /// store's clock.
    pub fn with_config(store: Arc<SimulatedStore>, config: BridgeConfig) -> Self {
        Self {
            real: RwLock::new(None),
            simulated: Arc::new(SimulatedBackend::new(Arc::clone(&store))),
            clock: Arc::clone(store.clock()),
            store,
            config,
            counters: Counters::default(),
        }
    }

    /// Attach (or replace) the real backend.
    pub fn attach_real(&self, backend: Arc<dyn Backend>) {
        tracing::info!(backend = backend.label(), "real backend attached");
        *self.real.write() = Some(backend);
    }

    /// Detach the real backend, returning it if one was attached.
    pub fn detach_real(&self) -> Option<Arc<dyn Backend>> {
        let previous = self.real.write().take();
        if let Some(backend) = &previous {
            tracing::info!(backend = backend.label(), "real backend detached");
        }
        previous
    }

    /// Whether a real backend is attached and reports itself available.
    pub fn is_connected(&self) -> bool {
        self.real
            .read()
            .as_ref()
            .is_some_and(|backend| backend.is_available())
    }

    /// The simulated store.
    pub fn store(&self) -> &Arc<SimulatedStore> {
        &self.store
    }

    /// The clock stamping envelopes.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Call counters so far.
    pub fn stats(&self) -> BridgeStats {
        self.counters.snapshot()
    }

    /// Which target would handle `operation` right now.
    pub fn route(&self, operation: &str) -> Option<Target> {
        self.resolve(operation).map(|(target, _)| target)
    }

    fn resolve(&self, operation: &str) -> Option<(Target, Arc<dyn Backend>)> {
        if self.config.prefer_real {
            let real = self.real.read().clone();
            if let Some(backend) = real {
                if backend.is_available() && backend.supports(operation) {
                    return Some((Target::Real, backend));
                }
            }
        }
        if self.simulated.supports(operation) {
            return Some((Target::Simulated, Arc::clone(&self.simulated)));
        }
        None
    }

    /// Execute `operation` and return its envelope.
    ///
    /// The work runs on the blocking pool or as a spawned task; the caller
    /// only awaits the join.
    pub async fn invoke(&self, operation: &str, args: Value) -> Envelope {
        let Some((target, backend)) = self.resolve(operation) else {
            Counters::bump(&self.counters.unsupported);
            Counters::bump(&self.counters.failures);
            tracing::debug!(operation, "no target supports operation");
            return Envelope::fail(
                TetherError::unsupported(operation),
                Origin::Simulated,
                self.clock.now_ms(),
            );
        };

        match target {
            Target::Real => Counters::bump(&self.counters.real_calls),
            Target::Simulated => Counters::bump(&self.counters.simulated_calls),
        }

        let started = Instant::now();
        let result = execute(target, backend, operation, args).await;
        let envelope = self.normalize(result, target.origin());
        if !envelope.is_success() {
            Counters::bump(&self.counters.failures);
        }
        tracing::debug!(
            operation,
            origin = %envelope.origin(),
            success = envelope.is_success(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bridge call completed"
        );
        envelope
    }

    /// Like [`invoke`](Self::invoke), but gives up after `deadline`.
    ///
    /// On expiry the caller gets a `Timeout` envelope. The worker is not
    /// aborted; its eventual result is discarded.
    pub async fn invoke_with_deadline(
        &self,
        operation: &str,
        args: Value,
        deadline: Duration,
    ) -> Envelope {
        match tokio::time::timeout(deadline, self.invoke(operation, args)).await {
            Ok(envelope) => envelope,
            Err(_) => {
                Counters::bump(&self.counters.timeouts);
                Counters::bump(&self.counters.failures);
                let after_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
                let origin = self
                    .route(operation)
                    .map_or(Origin::Simulated, Target::origin);
                tracing::warn!(operation, after_ms, %origin, "bridge call timed out");
                Envelope::fail(
                    TetherError::timeout(operation, after_ms),
                    origin,
                    self.clock.now_ms(),
                )
            }
        }
    }

    fn normalize(&self, result: BackendResult, origin: Origin) -> Envelope {
        let now = self.clock.now_ms();
        match result {
            Ok(value) => Envelope::from_shape(&value, origin, now)
                .unwrap_or_else(|| Envelope::ok(value, origin, now)),
            Err(err) => Envelope::fail(err, origin, now),
        }
    }
}

async fn execute(
    target: Target,
    backend: Arc<dyn Backend>,
    operation: &str,
    args: Value,
) -> BackendResult {
    let call = std::panic::catch_unwind(AssertUnwindSafe(|| backend.call(operation, args)))
        .map_err(|payload| panicked(target, operation, &*payload))?;

    let joined = match call {
        BackendCall::Blocking(work) => tokio::task::spawn_blocking(work).await,
        BackendCall::Deferred(work) => tokio::spawn(work).await,
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(panicked(target, operation, &*e.into_panic())),
        Err(e) => Err(worker_fault(
            target,
            format!("{operation} was cancelled: {e}"),
        )),
    }
}

/// Real-backend faults surface as `BackendError`, simulated ones as `Internal`.
fn worker_fault(target: Target, message: String) -> TetherError {
    match target {
        Target::Real => TetherError::backend(message),
        Target::Simulated => TetherError::internal(message),
    }
}

fn panicked(target: Target, operation: &str, payload: &(dyn Any + Send)) -> TetherError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    tracing::error!(operation, %detail, origin = %target.origin(), "backend panicked");
    worker_fault(target, format!("{operation} panicked: {detail}"))
}
