//! Tether Bridge - delegation between the real backend and the simulation
//!
//! UI code calls named operations through [`DelegationBridge::invoke`]
//! without knowing whether a live backend exists. Routing is decided per
//! call by capability lookup:
//!
//! 1. an attached, available real backend that supports the operation
//! 2. otherwise the simulated store, if it supports the operation
//! 3. otherwise an `UnsupportedOperation` envelope
//!
//! Work runs on tokio's blocking pool ([`BackendCall::Blocking`]) or as a
//! spawned task ([`BackendCall::Deferred`]); the calling task only suspends
//! on the join. Every outcome, including panics, comes back as an
//! [`Envelope`](tether_core::Envelope).

#![forbid(unsafe_code)]

mod args;
mod backend;
mod bridge;
pub mod simulated;

pub use backend::{Backend, BackendCall, BackendResult, Target};
pub use bridge::{BridgeStats, DelegationBridge};
pub use simulated::SimulatedBackend;
