//! Tether Core - shared vocabulary for the data-mediation layer
//!
//! This crate holds the types every other Tether crate speaks in. It has no
//! runtime dependencies and performs no I/O beyond configuration loading.
//!
//! # Contents
//!
//! - [`model`]: clients (primary entities), files (dependent entities),
//!   activity log entries and the aggregate status summary
//! - [`operations`]: the fixed operation surface shared by real and
//!   simulated backends
//! - [`envelope`]: the uniform `{success, data, error, origin, timestamp}`
//!   result returned by every bridge call
//! - [`errors`]: the error taxonomy (`NotFound`, `OwnerNotFound`, ...)
//! - [`clock`]: monotonic clocks; wall-clock time is never used for
//!   timestamps or durations
//! - [`config`]: serde/TOML configuration for the whole workspace

#![forbid(unsafe_code)]

/// Monotonic clock sources
pub mod clock;

/// Workspace configuration
pub mod config;

/// Uniform result envelope
pub mod envelope;

/// Unified error handling
pub mod errors;

/// Entity model
pub mod model;

/// Named operation surface
pub mod operations;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{
    BridgeConfig, ConfigError, LoggingConfig, SeedProfile, StateConfig, StoreConfig, TetherConfig,
};
pub use envelope::{Envelope, EnvelopeError, ErrorKind, Origin};
pub use errors::{Result, TetherError};
pub use model::{
    Client, ClientStatus, Collection, FileRecord, LogEntry, NewClient, NewFile, Record, Severity,
    StatusSummary,
};
pub use operations::Operation;
