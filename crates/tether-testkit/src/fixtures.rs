//! Store and bridge factories

use std::sync::Arc;

use tether_bridge::DelegationBridge;
use tether_core::{Client, ManualClock, NewClient, NewFile, SeedProfile, StoreConfig};
use tether_store::SimulatedStore;

/// A manual clock starting at zero.
pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(0))
}

/// An empty store driven by `clock`.
pub fn store_with_clock(clock: Arc<ManualClock>) -> Arc<SimulatedStore> {
    Arc::new(SimulatedStore::new(StoreConfig::default(), clock).expect("empty store"))
}

/// An empty store on a fresh manual clock.
pub fn empty_store() -> Arc<SimulatedStore> {
    store_with_clock(manual_clock())
}

/// A store seeded with deterministic demo data.
pub fn demo_store(clients: u32, files_per_client: u32, seed: u64) -> Arc<SimulatedStore> {
    let config = StoreConfig {
        seed: SeedProfile::Demo {
            clients,
            files_per_client,
            seed,
        },
        ..StoreConfig::default()
    };
    Arc::new(SimulatedStore::new(config, manual_clock()).expect("demo store"))
}

/// A bridge with no real backend over an empty store.
pub fn offline_bridge() -> (Arc<DelegationBridge>, Arc<SimulatedStore>) {
    let store = empty_store();
    (Arc::new(DelegationBridge::new(Arc::clone(&store))), store)
}

/// Add the canonical "Acme" client with one 100-byte file.
pub fn acme_with_file(store: &SimulatedStore) -> Client {
    let client = store
        .add_primary(NewClient::named("Acme").with_id("acme"))
        .expect("add acme");
    store
        .add_dependent(&client.id, NewFile::sized(100).with_id("acme-file"))
        .expect("add acme file");
    store.get_primary(&client.id).expect("acme exists")
}
