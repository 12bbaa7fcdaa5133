//! Tether Store - simulated backend
//!
//! An in-memory, thread-safe stand-in for the real backend with real
//! referential-integrity semantics:
//!
//! - every file is owned by an existing client; deleting a client cascades
//! - per-client `file_count` / `total_size` are maintained incrementally
//! - an append-only activity log with oldest-first retention
//! - a best-effort JSON snapshot that survives restarts
//!
//! [`SimulatedStore`] is the only entry point. The bridge wraps it as the
//! simulated backend; tests and the CLI use it directly.

#![forbid(unsafe_code)]

mod activity;
mod integrity;
mod patch;
mod seed;
pub mod snapshot;
mod store;
mod tables;

pub use activity::ActivityLog;
pub use integrity::Violation;
pub use snapshot::{SnapshotData, SNAPSHOT_VERSION};
pub use store::SimulatedStore;
