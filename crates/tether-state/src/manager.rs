//! Reactive state manager
//!
//! A keyed state table whose writes are deduplicated by structural equality
//! and propagated to subscribers exactly once, in registration order. Values
//! are normally produced by [`StateManager::run_mediated`], which routes a
//! named operation through the [`DelegationBridge`] and tracks
//! loading/error state around it.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::Value;
use tether_bridge::DelegationBridge;
use tether_core::{Clock, Envelope, EnvelopeError, StateConfig};
use tokio::sync::watch;

use crate::deferred::{DeferredQueue, Notification};
use crate::entry::{EntryStatus, Progress, StateEntry};
use crate::intents::{Intent, IntentOutcome};
use crate::stats::{Counters, StateStats};
use crate::subscription::{Observer, SubscriptionGuard, SubscriptionHandle, SubscriptionId};

// ─────────────────────────────────────────────────────────────────────────────
// Shared state
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct Shared {
    bridge: Arc<DelegationBridge>,
    clock: Arc<dyn Clock>,
    config: StateConfig,
    table: RwLock<HashMap<String, StateEntry>>,
    subscribers: RwLock<HashMap<String, IndexMap<SubscriptionId, Observer>>>,
    watchers: Mutex<HashMap<String, watch::Sender<EntryStatus>>>,
    next_id: AtomicU64,
    /// Serializes write-and-notify so notifications follow write order.
    /// Reentrant so an immediate observer may itself call `set`.
    notify_gate: ReentrantMutex<()>,
    deferred: DeferredQueue,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("keys", &self.table.read().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Shared {
    pub(crate) fn remove_subscriber(&self, handle: &SubscriptionHandle) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(observers) = subscribers.get_mut(&handle.key) else {
            return false;
        };
        let removed = observers.shift_remove(&handle.id).is_some();
        if observers.is_empty() {
            subscribers.remove(&handle.key);
        }
        removed
    }

    /// Apply `update` to the entry for `key` and publish the resulting status.
    fn update_entry<R>(&self, key: &str, update: impl FnOnce(&mut StateEntry) -> R) -> R {
        let (result, status) = {
            let mut table = self.table.write();
            let entry = table.entry(key.to_string()).or_default();
            let result = update(entry);
            (result, entry.status())
        };
        self.publish(key, status);
        result
    }

    fn publish(&self, key: &str, status: EntryStatus) {
        if let Some(sender) = self.watchers.lock().get(key) {
            sender.send_if_modified(|current| {
                if *current == status {
                    false
                } else {
                    *current = status;
                    true
                }
            });
        }
    }

    fn notify(&self, key: &str, new: &Value, old: Option<&Value>) {
        let observers: Vec<(SubscriptionId, Observer)> = self
            .subscribers
            .read()
            .get(key)
            .map(|observers| {
                observers
                    .iter()
                    .map(|(id, observer)| (*id, observer.clone()))
                    .collect()
            })
            .unwrap_or_default();

        for (id, observer) in observers {
            match observer {
                Observer::Immediate(callback) => {
                    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| callback(new, old)));
                    self.counters.record(key, id, outcome);
                }
                Observer::Deferred(callback) => self.deferred.submit(Notification {
                    key: key.to_string(),
                    id,
                    observer: callback,
                    new: new.clone(),
                    old: old.cloned(),
                }),
            }
        }
    }
}

/// Decrements the in-flight counter for a key when dropped, including when
/// the mediating future is cancelled.
struct LoadingGuard {
    shared: Arc<Shared>,
    key: String,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.shared.update_entry(&self.key, |entry| {
            entry.in_flight = entry.in_flight.saturating_sub(1);
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State Manager
// ─────────────────────────────────────────────────────────────────────────────

/// Keyed, observable state mediated through the delegation bridge.
///
/// Cheap to clone; clones share one table. Construct one per UI session and
/// pass it to whatever needs it.
#[derive(Debug, Clone)]
pub struct StateManager {
    shared: Arc<Shared>,
}

impl StateManager {
    /// A manager over `bridge` with default configuration.
    pub fn new(bridge: Arc<DelegationBridge>) -> Self {
        Self::with_config(bridge, StateConfig::default())
    }

    /// A manager with explicit configuration. Timestamps come from the
    /// bridge's clock.
    pub fn with_config(bridge: Arc<DelegationBridge>, config: StateConfig) -> Self {
        let counters = Arc::new(Counters::default());
        Self {
            shared: Arc::new(Shared {
                clock: Arc::clone(bridge.clock()),
                bridge,
                config,
                table: RwLock::new(HashMap::new()),
                subscribers: RwLock::new(HashMap::new()),
                watchers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                notify_gate: ReentrantMutex::new(()),
                deferred: DeferredQueue::new(Arc::clone(&counters)),
                counters,
            }),
        }
    }

    /// The bridge used by mediated calls.
    pub fn bridge(&self) -> &Arc<DelegationBridge> {
        &self.shared.bridge
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────────────────

    /// Register `observer` for changes to `key`.
    ///
    /// Observers of one key are notified in registration order.
    pub fn subscribe(&self, key: &str, observer: Observer) -> SubscriptionHandle {
        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared
            .subscribers
            .write()
            .entry(key.to_string())
            .or_default()
            .insert(id, observer);
        tracing::trace!(key, subscription = %id, "subscribed");
        SubscriptionHandle {
            key: key.to_string(),
            id,
        }
    }

    /// Like [`subscribe`](Self::subscribe), unsubscribing when the guard drops.
    pub fn subscribe_scoped(&self, key: &str, observer: Observer) -> SubscriptionGuard {
        let handle = self.subscribe(key, observer);
        SubscriptionGuard::new(handle, Arc::downgrade(&self.shared))
    }

    /// Remove a subscription. Returns `false` if it was already removed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.shared.remove_subscriber(handle)
    }

    /// Number of subscriptions on `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.shared
            .subscribers
            .read()
            .get(key)
            .map_or(0, IndexMap::len)
    }

    /// Receive loading/progress/error changes for `key`.
    pub fn watch_status(&self, key: &str) -> watch::Receiver<EntryStatus> {
        let current = self.entry(key).map(|e| e.status()).unwrap_or_default();
        self.shared
            .watchers
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State table
    // ─────────────────────────────────────────────────────────────────────────

    /// Write `value` under `key` and notify subscribers.
    ///
    /// A value structurally equal to the current one is ignored: nothing is
    /// written, nobody is notified, and `false` is returned.
    pub fn set(&self, key: &str, value: Value, source: impl Into<String>) -> bool {
        let _gate = self.shared.notify_gate.lock();
        let now = self.shared.clock.now_ms();
        let old = {
            let mut table = self.shared.table.write();
            let entry = table.entry(key.to_string()).or_default();
            if entry.value.as_ref() == Some(&value) {
                self.shared.counters.deduplicated();
                return false;
            }
            entry.updated_at = now;
            entry.source = Some(source.into());
            entry.value.replace(value.clone())
        };
        tracing::trace!(key, "state updated");
        self.shared.notify(key, &value, old.as_ref());
        true
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.shared.table.read().get(key).and_then(|e| e.value.clone())
    }

    /// Current value of `key`, or `default`.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Snapshot of the whole entry for `key`.
    pub fn entry(&self, key: &str) -> Option<StateEntry> {
        self.shared.table.read().get(key).cloned()
    }

    /// Whether a mediated call on `key` is in flight.
    pub fn is_loading(&self, key: &str) -> bool {
        self.shared
            .table
            .read()
            .get(key)
            .is_some_and(StateEntry::is_loading)
    }

    /// Error recorded by the last failed call on `key`.
    pub fn error(&self, key: &str) -> Option<EnvelopeError> {
        self.shared.table.read().get(key).and_then(|e| e.error.clone())
    }

    /// All keys with an entry, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.shared.table.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Notification counters.
    pub fn stats(&self) -> StateStats {
        self.shared.counters.snapshot()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Progress
    // ─────────────────────────────────────────────────────────────────────────

    /// Show progress at zero.
    pub fn start_progress(&self, key: &str) {
        self.shared
            .update_entry(key, |entry| entry.progress = Some(Progress::Fraction(0.0)));
    }

    /// Set progress; fractions are clamped to `[0, 1]`, NaN is indeterminate.
    pub fn update_progress(&self, key: &str, progress: impl Into<Progress>) {
        let progress = match progress.into() {
            Progress::Fraction(f) => Progress::fraction(f),
            Progress::Indeterminate => Progress::Indeterminate,
        };
        self.shared
            .update_entry(key, |entry| entry.progress = Some(progress));
    }

    /// Hide progress.
    pub fn clear_progress(&self, key: &str) {
        self.shared.update_entry(key, |entry| entry.progress = None);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mediation
    // ─────────────────────────────────────────────────────────────────────────

    /// Run `operation` through the bridge and fold the result into `key`.
    ///
    /// Loading is on for the duration of the call. On success the payload is
    /// written with `set` (deduplicated) and any previous error is cleared.
    /// On failure the error is recorded and the last good value is kept.
    /// Concurrent calls on one key all run; the last write wins.
    pub async fn run_mediated(&self, key: &str, operation: &str, args: Value) -> Envelope {
        let guard = self.begin(key, false);
        self.mediate(guard, key, operation, args).await
    }

    /// Like [`run_mediated`](Self::run_mediated), but returns `None` without
    /// calling the bridge when a call on `key` is already in flight.
    pub async fn try_run_mediated(
        &self,
        key: &str,
        operation: &str,
        args: Value,
    ) -> Option<Envelope> {
        let guard = self.begin(key, true)?;
        Some(self.mediate(Some(guard), key, operation, args).await)
    }

    /// Wait until every deferred notification queued so far has run.
    pub async fn flush_deferred(&self) {
        self.shared.deferred.flush().await;
    }

    /// Execute an intent: its mutation (if any), then its refreshes.
    ///
    /// Refreshes are skipped when the mutation fails.
    pub async fn dispatch(&self, intent: Intent) -> IntentOutcome {
        let plan = intent.plan();
        tracing::debug!(intent = ?intent, "dispatching intent");

        let mutation = match plan.mutation {
            Some(call) => {
                let envelope = self
                    .run_mediated(&call.key, call.operation.as_str(), call.args)
                    .await;
                if !envelope.is_success() {
                    return IntentOutcome {
                        mutation: Some(envelope),
                        refreshed: Vec::new(),
                    };
                }
                Some(envelope)
            }
            None => None,
        };

        let mut refreshed = Vec::with_capacity(plan.refresh.len());
        for call in plan.refresh {
            let envelope = self
                .run_mediated(&call.key, call.operation.as_str(), call.args)
                .await;
            refreshed.push((call.key, envelope));
        }
        IntentOutcome {
            mutation,
            refreshed,
        }
    }

    fn begin(&self, key: &str, exclusive: bool) -> Option<LoadingGuard> {
        let started = self.shared.update_entry(key, |entry| {
            if exclusive && entry.is_loading() {
                return false;
            }
            entry.in_flight += 1;
            true
        });
        started.then(|| LoadingGuard {
            shared: Arc::clone(&self.shared),
            key: key.to_string(),
        })
    }

    async fn mediate(
        &self,
        guard: Option<LoadingGuard>,
        key: &str,
        operation: &str,
        args: Value,
    ) -> Envelope {
        let bridge = &self.shared.bridge;
        let envelope = match self.shared.config.mediation_deadline_ms {
            Some(ms) => {
                bridge
                    .invoke_with_deadline(operation, args, Duration::from_millis(ms))
                    .await
            }
            None => bridge.invoke(operation, args).await,
        };

        match (envelope.data(), envelope.error()) {
            (Some(data), _) if envelope.is_success() => {
                // cleared first so observers of the new value see no stale error
                self.shared.update_entry(key, |entry| entry.error = None);
                self.set(key, data.clone(), operation);
            }
            (_, Some(error)) => {
                tracing::debug!(key, operation, %error, "mediated call failed");
                let error = error.clone();
                self.shared
                    .update_entry(key, |entry| entry.error = Some(error));
            }
            _ => {}
        }
        drop(guard);
        envelope
    }
}
