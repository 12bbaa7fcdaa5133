//! CLI command handlers
//!
//! Each handler works against a [`Session`]: the store opened from
//! configuration, an offline bridge over it, and a state manager on top.

use std::sync::Arc;

use anyhow::{Context, Result};
use tether_bridge::DelegationBridge;
use tether_core::{MonotonicClock, TetherConfig};
use tether_state::StateManager;
use tether_store::SimulatedStore;

pub mod check;
pub mod demo;
pub mod persist;
pub mod status;

/// Everything a command needs.
pub struct Session {
    pub store: Arc<SimulatedStore>,
    pub bridge: Arc<DelegationBridge>,
    pub state: StateManager,
}

impl Session {
    /// Open the store described by `config` and wire the layers above it.
    pub fn open(config: &TetherConfig) -> Result<Self> {
        let store = SimulatedStore::open(config.store.clone(), Arc::new(MonotonicClock::new()))
            .context("failed to open simulated store")?;
        let store = Arc::new(store);
        let bridge = Arc::new(DelegationBridge::with_config(
            Arc::clone(&store),
            config.bridge.clone(),
        ));
        let state = StateManager::with_config(Arc::clone(&bridge), config.state.clone());
        Ok(Self {
            store,
            bridge,
            state,
        })
    }
}

/// Pretty-print a JSON value to stdout.
fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
