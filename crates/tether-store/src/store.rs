//! Thread-safe simulated backend store

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tether_core::{
    Client, ClientStatus, Clock, Collection, FileRecord, LogEntry, MonotonicClock, NewClient,
    NewFile, Record, Result, Severity, StatusSummary, StoreConfig, TetherError,
};

use crate::integrity::Violation;
use crate::patch::{ClientPatch, FilePatch};
use crate::snapshot;
use crate::tables::Tables;

/// In-memory stand-in for the real backend.
///
/// Every public operation takes the store lock once and runs to completion
/// under it, so operations are atomic with respect to each other and no file
/// can be observed without its owner. The lock is never held across I/O.
#[derive(Debug)]
pub struct SimulatedStore {
    inner: Mutex<Tables>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
    opened_at: u64,
}

impl SimulatedStore {
    /// Create a store populated from the configured seed profile.
    ///
    /// No snapshot is read; see [`SimulatedStore::open`].
    pub fn new(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let opened_at = clock.now_ms();
        let mut tables = Tables::new(config.max_log_entries, config.log_mutations);
        crate::seed::apply(&mut tables, &config.seed, opened_at)?;
        tracing::debug!(
            clients = tables.client_count(),
            files = tables.file_count(),
            "simulated store created"
        );
        Ok(Self {
            inner: Mutex::new(tables),
            clock,
            config,
            opened_at,
        })
    }

    /// An empty store with default configuration and a monotonic clock.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Tables::new(1_000, true)),
            clock: Arc::new(MonotonicClock::new()),
            config: StoreConfig::default(),
            opened_at: 0,
        }
    }

    /// Open a store from its snapshot when one is configured and readable.
    ///
    /// The clock is resumed past the newest stored timestamp. A missing or
    /// unreadable snapshot falls back to the seed profile.
    pub fn open(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let Some(path) = config.snapshot_path.clone() else {
            return Self::new(config, clock);
        };

        let data = match snapshot::read(&path) {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(path = %path.display(), "no snapshot found, seeding store");
                return Self::new(config, clock);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable snapshot");
                return Self::new(config, clock);
            }
        };

        clock.resume_from(data.newest_timestamp());
        let opened_at = clock.now_ms();
        let (tables, dropped) =
            Tables::from_snapshot(data, config.max_log_entries, config.log_mutations);
        if dropped > 0 {
            tracing::warn!(dropped, "dropped inconsistent rows from snapshot");
        }
        tracing::info!(
            path = %path.display(),
            clients = tables.client_count(),
            files = tables.file_count(),
            "simulated store restored"
        );
        Ok(Self {
            inner: Mutex::new(tables),
            clock,
            config,
            opened_at,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Clients
    // ─────────────────────────────────────────────────────────────────────────

    /// All clients, most recently seen first.
    pub fn list_primary(&self) -> Vec<Client> {
        self.inner.lock().list_clients()
    }

    /// One client by id.
    pub fn get_primary(&self, id: &str) -> Result<Client> {
        self.inner.lock().get_client(id)
    }

    /// Create a client with zeroed counters.
    pub fn add_primary(&self, new: NewClient) -> Result<Client> {
        let mut tables = self.inner.lock();
        let client = tables.insert_client(new, self.clock.now_ms())?;
        tracing::debug!(client_id = %client.id, "client added");
        Ok(client)
    }

    /// Delete a client and every file it owns. Returns `false` when absent.
    pub fn delete_primary(&self, id: &str) -> bool {
        let mut tables = self.inner.lock();
        match tables.remove_client(id, self.clock.now_ms()) {
            Some((_, files)) => {
                tracing::debug!(client_id = %id, files, "client deleted");
                true
            }
            None => false,
        }
    }

    /// Heartbeat: refresh `last_seen` and set the status (default connected).
    pub fn touch_primary(&self, id: &str, status: Option<ClientStatus>) -> Result<Client> {
        let mut tables = self.inner.lock();
        tables.touch_client(id, status, self.clock.now_ms())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────

    /// All files, or those owned by `owner_id`. Unknown owners yield an empty list.
    pub fn list_dependents(&self, owner_id: Option<&str>) -> Vec<FileRecord> {
        self.inner.lock().list_files(owner_id)
    }

    /// One file by id.
    pub fn get_dependent(&self, id: &str) -> Result<FileRecord> {
        self.inner.lock().get_file(id)
    }

    /// Create a file owned by `owner_id`.
    ///
    /// Fails with `OwnerNotFound`, leaving the store unchanged, when the owner
    /// does not exist.
    pub fn add_dependent(&self, owner_id: &str, new: NewFile) -> Result<FileRecord> {
        let mut tables = self.inner.lock();
        let result = tables.insert_file(owner_id, new, self.clock.now_ms());
        match &result {
            Ok(file) => tracing::debug!(file_id = %file.id, owner_id, "file added"),
            Err(e) => tracing::debug!(owner_id, error = %e, "file rejected"),
        }
        result
    }

    /// Delete a file. Returns `false` when absent.
    pub fn delete_dependent(&self, id: &str) -> bool {
        let mut tables = self.inner.lock();
        tables.remove_file(id, self.clock.now_ms()).is_some()
    }

    /// Apply a partial update to a client or a file.
    ///
    /// The patch is validated in full first; an invalid patch changes nothing.
    pub fn update_field(
        &self,
        collection: Collection,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<Record> {
        let now = self.clock.now_ms();
        match collection {
            Collection::Clients => {
                let patch = ClientPatch::parse(patch)?;
                let mut tables = self.inner.lock();
                tables.patch_client(id, patch, now).map(Record::Client)
            }
            Collection::Files => {
                let patch = FilePatch::parse(patch)?;
                let mut tables = self.inner.lock();
                tables.patch_file(id, patch, now).map(Record::File)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Status, activity, integrity
    // ─────────────────────────────────────────────────────────────────────────

    /// Full scan for broken invariants. Empty in correct operation.
    pub fn integrity_check(&self) -> Vec<Violation> {
        let violations = self.inner.lock().audit();
        if !violations.is_empty() {
            tracing::warn!(count = violations.len(), "integrity violations detected");
        }
        violations
    }

    /// Aggregate counts and uptime.
    pub fn status_summary(&self) -> StatusSummary {
        let uptime = self.clock.now_ms().saturating_sub(self.opened_at);
        self.inner.lock().summary(uptime)
    }

    /// The most recent `limit` activity entries (all when `None`), oldest first.
    pub fn list_logs(&self, limit: Option<usize>) -> Vec<LogEntry> {
        self.inner.lock().recent_logs(limit)
    }

    /// Append an activity entry. Always recorded, regardless of `log_mutations`.
    pub fn append_log(
        &self,
        level: Severity,
        message: impl Into<String>,
        client_id: Option<&str>,
        file_id: Option<&str>,
    ) -> LogEntry {
        let mut tables = self.inner.lock();
        tables.append_log(self.clock.now_ms(), level, message.into(), client_id, file_id)
    }

    /// Number of clients.
    pub fn client_count(&self) -> usize {
        self.inner.lock().client_count()
    }

    /// Number of files.
    pub fn file_count(&self) -> usize {
        self.inner.lock().file_count()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Write the snapshot to the configured path and return it.
    pub fn persist(&self) -> Result<PathBuf> {
        let path = self
            .config
            .snapshot_path
            .clone()
            .ok_or_else(|| TetherError::validation("no snapshot path configured"))?;
        self.persist_to(&path)?;
        Ok(path)
    }

    /// Write the snapshot to `path`.
    pub fn persist_to(&self, path: &Path) -> Result<()> {
        let data = self.inner.lock().to_snapshot();
        snapshot::write(path, &data)?;
        tracing::info!(
            path = %path.display(),
            clients = data.clients.len(),
            files = data.files.len(),
            "snapshot written"
        );
        Ok(())
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Clock used for every timestamp.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use tether_core::{ManualClock, SeedProfile};

    fn store_at(start: u64) -> (SimulatedStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let store = SimulatedStore::new(StoreConfig::default(), clock.clone()).unwrap();
        (store, clock)
    }

    fn patch(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_add_then_cascade_delete() {
        let (store, _) = store_at(0);
        let client = store.add_primary(NewClient::named("Acme")).unwrap();
        assert!(!client.id.is_empty());
        assert_eq!(client.file_count, 0);

        store.add_dependent(&client.id, NewFile::sized(100)).unwrap();
        let owner = store.get_primary(&client.id).unwrap();
        assert_eq!(owner.file_count, 1);
        assert_eq!(owner.total_size, 100);

        assert!(store.delete_primary(&client.id));
        assert!(store.list_dependents(None).is_empty());
        assert!(store.integrity_check().is_empty());
    }

    #[test]
    fn test_missing_owner_leaves_store_unchanged() {
        let (store, _) = store_at(0);
        assert_matches!(
            store.add_dependent("nonexistent", NewFile::sized(10)),
            Err(TetherError::OwnerNotFound { owner_id }) if owner_id == "nonexistent"
        );
        assert_eq!(store.file_count(), 0);
        assert!(store.list_logs(None).is_empty());
    }

    #[test]
    fn test_deletes_are_idempotent() {
        let (store, _) = store_at(0);
        let client = store.add_primary(NewClient::named("Acme")).unwrap();
        let file = store.add_dependent(&client.id, NewFile::sized(1)).unwrap();
        assert!(store.delete_dependent(&file.id));
        assert!(!store.delete_dependent(&file.id));
        assert!(store.delete_primary(&client.id));
        assert!(!store.delete_primary(&client.id));
    }

    #[test]
    fn test_touch_refreshes_last_seen() {
        let (store, clock) = store_at(10);
        let client = store.add_primary(NewClient::named("Acme")).unwrap();
        clock.advance(25);
        let touched = store.touch_primary(&client.id, None).unwrap();
        assert_eq!(touched.last_seen, 35);
        assert_eq!(touched.status, ClientStatus::Connected);
        assert_matches!(
            store.touch_primary("ghost", None),
            Err(TetherError::NotFound { .. })
        );
    }

    #[test]
    fn test_update_field_is_all_or_nothing() {
        let (store, _) = store_at(0);
        let client = store.add_primary(NewClient::named("Acme")).unwrap();
        let result = store.update_field(
            Collection::Clients,
            &client.id,
            &patch(json!({"name": "Renamed", "file_count": 3})),
        );
        assert_matches!(result, Err(TetherError::Validation { .. }));
        assert_eq!(store.get_primary(&client.id).unwrap().name, "Acme");

        let updated = store
            .update_field(Collection::Clients, &client.id, &patch(json!({"name": "Renamed"})))
            .unwrap();
        assert_matches!(updated, Record::Client(c) if c.name == "Renamed");
    }

    #[test]
    fn test_update_file_size_adjusts_owner() {
        let (store, _) = store_at(0);
        let client = store.add_primary(NewClient::named("Acme")).unwrap();
        let file = store.add_dependent(&client.id, NewFile::sized(100)).unwrap();
        store
            .update_field(Collection::Files, &file.id, &patch(json!({"size": 250})))
            .unwrap();
        assert_eq!(store.get_primary(&client.id).unwrap().total_size, 250);
        assert_matches!(
            store.update_field(Collection::Files, "ghost", &patch(json!({"size": 1}))),
            Err(TetherError::NotFound { .. })
        );
    }

    #[test]
    fn test_connect_status_refreshes_last_seen() {
        let (store, clock) = store_at(0);
        let client = store.add_primary(NewClient::named("Acme")).unwrap();
        clock.advance(50);
        let Record::Client(updated) = store
            .update_field(
                Collection::Clients,
                &client.id,
                &patch(json!({"status": "connected"})),
            )
            .unwrap()
        else {
            panic!("expected client record");
        };
        assert_eq!(updated.last_seen, 50);
    }

    #[test]
    fn test_status_summary_counts() {
        let (store, clock) = store_at(100);
        let a = store
            .add_primary(NewClient::named("A").with_status(ClientStatus::Connected))
            .unwrap();
        store.add_primary(NewClient::named("B")).unwrap();
        store.add_dependent(&a.id, NewFile::sized(10).verified()).unwrap();
        store.add_dependent(&a.id, NewFile::sized(5)).unwrap();
        clock.advance(40);

        let summary = store.status_summary();
        assert_eq!(summary.clients, 2);
        assert_eq!(summary.connected, 1);
        assert_eq!(summary.registered, 1);
        assert_eq!(summary.files, 2);
        assert_eq!(summary.verified_files, 1);
        assert_eq!(summary.total_size, 15);
        assert_eq!(summary.uptime_ms, 40);
        assert_eq!(summary.log_entries, 4);
    }

    #[test]
    fn test_append_log_respects_retention() {
        let clock = Arc::new(ManualClock::new(0));
        let config = StoreConfig {
            max_log_entries: 2,
            ..StoreConfig::default()
        };
        let store = SimulatedStore::new(config, clock).unwrap();
        for i in 0..3 {
            store.append_log(Severity::Info, format!("entry {i}"), None, None);
        }
        let messages: Vec<String> = store.list_logs(None).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["entry 1", "entry 2"]);
    }

    #[test]
    fn test_demo_seed() {
        let clock = Arc::new(ManualClock::new(0));
        let config = StoreConfig {
            seed: SeedProfile::Demo {
                clients: 2,
                files_per_client: 2,
                seed: 1,
            },
            ..StoreConfig::default()
        };
        let store = SimulatedStore::new(config, clock).unwrap();
        assert_eq!(store.client_count(), 2);
        assert_eq!(store.list_dependents(Some("demo-client-1")).len(), 2);
    }

    #[test]
    fn test_persist_without_path() {
        let (store, _) = store_at(0);
        assert_matches!(store.persist(), Err(TetherError::Validation { .. }));
    }
}
