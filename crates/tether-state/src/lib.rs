//! Tether State - reactive state mediated through the delegation bridge
//!
//! The [`StateManager`] keeps a keyed table of JSON values. Writes that are
//! structurally equal to the current value are dropped; every other write
//! notifies the key's observers exactly once, in registration order.
//!
//! # Mediated calls
//!
//! [`StateManager::run_mediated`] invokes a named operation through the
//! bridge, marks the key loading while the call is in flight, stores the
//! payload on success and records the error on failure (keeping the last
//! good value). [`Intent`]s bundle a mutation with the refreshes it implies.
//!
//! # Observers
//!
//! - [`Observer::Immediate`] runs inline before `set` returns
//! - [`Observer::Deferred`] runs on a sequential dispatcher task
//!
//! Observer errors and panics are logged and counted in [`StateStats`]; they
//! never prevent delivery to other observers.

#![forbid(unsafe_code)]

mod deferred;
mod entry;
mod intents;
mod manager;
mod stats;
mod subscription;

pub use entry::{EntryStatus, Phase, Progress, StateEntry};
pub use intents::{keys, Call, Intent, IntentOutcome, IntentPlan};
pub use manager::StateManager;
pub use stats::StateStats;
pub use subscription::{
    DeferredFn, ImmediateFn, Observer, ObserverError, SubscriptionGuard, SubscriptionHandle,
    SubscriptionId,
};
