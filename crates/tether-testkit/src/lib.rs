//! Tether Testing Infrastructure
//!
//! Shared fixtures for the bridge and state manager test suites: a scripted
//! stand-in for the real backend, store and bridge factories, proptest
//! strategies for store operations and envelope/store assertions.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! tether-testkit = { workspace = true }
//! ```
//!
//! ```rust,no_run
//! use tether_testkit::*;
//!
//! # async fn demo() {
//! let (bridge, store) = offline_bridge();
//! let real = ScriptedBackend::new("real").forwarding(store.clone()).shared();
//! bridge.attach_real(real);
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod scripted;
pub mod strategies;

pub use assertions::*;
pub use fixtures::*;
pub use scripted::{CallMode, RecordedCall, ScriptedBackend};
