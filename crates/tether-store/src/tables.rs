//! Lock-free store state
//!
//! [`Tables`] holds the client and file tables, the per-owner index and the
//! activity log. Every method is a complete operation: it either applies all
//! of its changes or returns an error having changed nothing. Callers supply
//! the timestamp, so the tables never read a clock and never take a lock.

use std::collections::{BTreeSet, HashMap};

use tether_core::{
    Client, ClientStatus, FileRecord, LogEntry, NewClient, NewFile, Result, Severity,
    StatusSummary, TetherError,
};

use crate::activity::ActivityLog;
use crate::integrity::Violation;
use crate::patch::{ClientPatch, FilePatch};
use crate::snapshot::{SnapshotData, SNAPSHOT_VERSION};

/// Client and file tables with incrementally maintained counters.
#[derive(Debug, Clone)]
pub(crate) struct Tables {
    clients: HashMap<String, Client>,
    files: HashMap<String, FileRecord>,
    files_by_owner: HashMap<String, BTreeSet<String>>,
    activity: ActivityLog,
    log_mutations: bool,
}

impl Tables {
    pub(crate) fn new(max_log_entries: usize, log_mutations: bool) -> Self {
        Self {
            clients: HashMap::new(),
            files: HashMap::new(),
            files_by_owner: HashMap::new(),
            activity: ActivityLog::new(max_log_entries),
            log_mutations,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Clients
    // ─────────────────────────────────────────────────────────────────────────

    /// Most recently seen first, ties broken by id.
    pub(crate) fn list_clients(&self) -> Vec<Client> {
        let mut clients: Vec<Client> = self.clients.values().cloned().collect();
        clients.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.id.cmp(&b.id)));
        clients
    }

    pub(crate) fn get_client(&self, id: &str) -> Result<Client> {
        self.clients
            .get(id)
            .cloned()
            .ok_or_else(|| TetherError::not_found(format!("client {id}")))
    }

    pub(crate) fn insert_client(&mut self, new: NewClient, now: u64) -> Result<Client> {
        if new.name.trim().is_empty() {
            return Err(TetherError::validation("client name must not be blank"));
        }
        let id = match new.id {
            Some(id) if id.trim().is_empty() => {
                return Err(TetherError::validation("client id must not be blank"));
            }
            Some(id) if self.clients.contains_key(&id) => {
                return Err(TetherError::validation(format!("client {id} already exists")));
            }
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };

        let client = Client {
            id: id.clone(),
            name: new.name,
            status: new.status.unwrap_or_default(),
            last_seen: now,
            file_count: 0,
            total_size: 0,
        };
        self.clients.insert(id.clone(), client.clone());
        self.record(now, Severity::Info, format!("client {} added", client.name), Some(&id), None);
        Ok(client)
    }

    /// Remove a client and every file it owns. Returns the removed client and
    /// the number of files removed with it.
    pub(crate) fn remove_client(&mut self, id: &str, now: u64) -> Option<(Client, usize)> {
        let client = self.clients.remove(id)?;
        let owned = self.files_by_owner.remove(id).unwrap_or_default();
        for file_id in &owned {
            self.files.remove(file_id);
        }
        self.record(
            now,
            Severity::Info,
            format!("client {} deleted with {} files", client.name, owned.len()),
            Some(id),
            None,
        );
        Some((client, owned.len()))
    }

    pub(crate) fn touch_client(
        &mut self,
        id: &str,
        status: Option<ClientStatus>,
        now: u64,
    ) -> Result<Client> {
        let client = self
            .clients
            .get_mut(id)
            .ok_or_else(|| TetherError::not_found(format!("client {id}")))?;
        client.last_seen = now;
        client.status = status.unwrap_or(ClientStatus::Connected);
        let touched = client.clone();
        self.record(
            now,
            Severity::Debug,
            format!("client {} seen ({})", touched.name, touched.status),
            Some(id),
            None,
        );
        Ok(touched)
    }

    pub(crate) fn patch_client(&mut self, id: &str, patch: ClientPatch, now: u64) -> Result<Client> {
        let client = self
            .clients
            .get_mut(id)
            .ok_or_else(|| TetherError::not_found(format!("client {id}")))?;
        if let Some(name) = patch.name {
            client.name = name;
        }
        if let Some(status) = patch.status {
            client.status = status;
            if status == ClientStatus::Connected {
                client.last_seen = now;
            }
        }
        let updated = client.clone();
        self.record(now, Severity::Info, format!("client {id} updated"), Some(id), None);
        Ok(updated)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────

    /// All files, or one owner's, ordered by creation time then id.
    pub(crate) fn list_files(&self, owner_id: Option<&str>) -> Vec<FileRecord> {
        let mut files: Vec<FileRecord> = match owner_id {
            Some(owner) => self
                .files_by_owner
                .get(owner)
                .into_iter()
                .flatten()
                .filter_map(|file_id| self.files.get(file_id).cloned())
                .collect(),
            None => self.files.values().cloned().collect(),
        };
        files.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        files
    }

    pub(crate) fn get_file(&self, id: &str) -> Result<FileRecord> {
        self.files
            .get(id)
            .cloned()
            .ok_or_else(|| TetherError::not_found(format!("file {id}")))
    }

    pub(crate) fn insert_file(&mut self, owner_id: &str, new: NewFile, now: u64) -> Result<FileRecord> {
        let Some(owner) = self.clients.get(owner_id) else {
            return Err(TetherError::owner_not_found(owner_id));
        };
        let total_size = owner.total_size.checked_add(new.size).ok_or_else(|| {
            TetherError::validation(format!("total size of client {owner_id} would overflow"))
        })?;

        let id = match new.id {
            Some(id) if id.trim().is_empty() => {
                return Err(TetherError::validation("file id must not be blank"));
            }
            Some(id) if self.files.contains_key(&id) => {
                return Err(TetherError::validation(format!("file {id} already exists")));
            }
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };
        let checksum = new
            .checksum
            .unwrap_or_else(|| derive_checksum(&id, owner_id, new.size));
        let file = FileRecord {
            name: new.name.unwrap_or_else(|| id.clone()),
            id: id.clone(),
            owner_id: owner_id.to_string(),
            size: new.size,
            created_at: now,
            verified: new.verified,
            checksum,
        };

        if let Some(owner) = self.clients.get_mut(owner_id) {
            owner.file_count += 1;
            owner.total_size = total_size;
        }
        self.files_by_owner
            .entry(owner_id.to_string())
            .or_default()
            .insert(id.clone());
        self.files.insert(id.clone(), file.clone());
        self.record(
            now,
            Severity::Info,
            format!("file {} added ({} bytes)", file.name, file.size),
            Some(owner_id),
            Some(&id),
        );
        Ok(file)
    }

    pub(crate) fn remove_file(&mut self, id: &str, now: u64) -> Option<FileRecord> {
        let file = self.files.remove(id)?;
        if let Some(owner) = self.clients.get_mut(&file.owner_id) {
            owner.file_count = owner.file_count.saturating_sub(1);
            owner.total_size = owner.total_size.saturating_sub(file.size);
        }
        if let Some(index) = self.files_by_owner.get_mut(&file.owner_id) {
            index.remove(id);
            if index.is_empty() {
                self.files_by_owner.remove(&file.owner_id);
            }
        }
        self.record(
            now,
            Severity::Info,
            format!("file {} deleted", file.name),
            Some(&file.owner_id),
            Some(id),
        );
        Some(file)
    }

    pub(crate) fn patch_file(&mut self, id: &str, patch: FilePatch, now: u64) -> Result<FileRecord> {
        let file = self
            .files
            .get(id)
            .ok_or_else(|| TetherError::not_found(format!("file {id}")))?;
        let owner_id = file.owner_id.clone();

        let resized_total = match patch.size {
            Some(size) => {
                let owner = self.clients.get(&owner_id).ok_or_else(|| {
                    TetherError::internal(format!("file {id} has no owner {owner_id}"))
                })?;
                let total = owner
                    .total_size
                    .saturating_sub(file.size)
                    .checked_add(size)
                    .ok_or_else(|| {
                        TetherError::validation(format!(
                            "total size of client {owner_id} would overflow"
                        ))
                    })?;
                Some(total)
            }
            None => None,
        };

        let Some(file) = self.files.get_mut(id) else {
            return Err(TetherError::not_found(format!("file {id}")));
        };
        if let Some(name) = patch.name {
            file.name = name;
        }
        if let Some(size) = patch.size {
            file.size = size;
        }
        if let Some(verified) = patch.verified {
            file.verified = verified;
        }
        if let Some(checksum) = patch.checksum {
            file.checksum = checksum;
        }
        let updated = file.clone();

        if let (Some(total), Some(owner)) = (resized_total, self.clients.get_mut(&owner_id)) {
            owner.total_size = total;
        }
        self.record(
            now,
            Severity::Info,
            format!("file {id} updated"),
            Some(&owner_id),
            Some(id),
        );
        Ok(updated)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Activity, status, audit
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn append_log(
        &mut self,
        at: u64,
        level: Severity,
        message: String,
        client_id: Option<&str>,
        file_id: Option<&str>,
    ) -> LogEntry {
        self.activity.append(at, level, message, client_id, file_id)
    }

    pub(crate) fn recent_logs(&self, limit: Option<usize>) -> Vec<LogEntry> {
        self.activity.recent(limit)
    }

    pub(crate) fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub(crate) fn file_count(&self) -> usize {
        self.files.len()
    }

    pub(crate) fn summary(&self, uptime_ms: u64) -> StatusSummary {
        let mut summary = StatusSummary {
            clients: self.clients.len() as u64,
            files: self.files.len() as u64,
            log_entries: self.activity.len() as u64,
            uptime_ms,
            ..StatusSummary::default()
        };
        for client in self.clients.values() {
            match client.status {
                ClientStatus::Registered => summary.registered += 1,
                ClientStatus::Connected => summary.connected += 1,
                ClientStatus::Offline => summary.offline += 1,
            }
        }
        for file in self.files.values() {
            if file.verified {
                summary.verified_files += 1;
            }
            summary.total_size = summary.total_size.saturating_add(file.size);
        }
        summary
    }

    /// Full scan for orphans, counter drift and index drift.
    pub(crate) fn audit(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut recount: HashMap<&str, (u64, u64)> = HashMap::new();

        for file in self.files.values() {
            if !self.clients.contains_key(&file.owner_id) {
                violations.push(Violation::OrphanFile {
                    file_id: file.id.clone(),
                    owner_id: file.owner_id.clone(),
                });
            }
            let indexed = self
                .files_by_owner
                .get(&file.owner_id)
                .is_some_and(|index| index.contains(&file.id));
            if !indexed {
                violations.push(Violation::IndexDrift {
                    owner_id: file.owner_id.clone(),
                    file_id: file.id.clone(),
                });
            }
            let counts = recount.entry(file.owner_id.as_str()).or_default();
            counts.0 += 1;
            counts.1 = counts.1.saturating_add(file.size);
        }

        for (owner_id, index) in &self.files_by_owner {
            for file_id in index {
                let consistent = self
                    .files
                    .get(file_id)
                    .is_some_and(|file| &file.owner_id == owner_id);
                if !consistent {
                    violations.push(Violation::IndexDrift {
                        owner_id: owner_id.clone(),
                        file_id: file_id.clone(),
                    });
                }
            }
        }

        for client in self.clients.values() {
            let (actual_count, actual_size) =
                recount.get(client.id.as_str()).copied().unwrap_or_default();
            if client.file_count != actual_count || client.total_size != actual_size {
                violations.push(Violation::CounterDrift {
                    client_id: client.id.clone(),
                    recorded_count: client.file_count,
                    actual_count,
                    recorded_size: client.total_size,
                    actual_size,
                });
            }
        }

        violations.sort();
        violations
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshot conversion
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn to_snapshot(&self) -> SnapshotData {
        let mut clients: Vec<Client> = self.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        SnapshotData {
            version: SNAPSHOT_VERSION,
            clients,
            files: self.list_files(None),
            logs: self.activity.recent(None),
            next_seq: self.activity.next_seq(),
        }
    }

    /// Rebuild tables from a snapshot.
    ///
    /// Counters are recomputed from the file rows. Files whose owner is
    /// missing, whose id repeats, or whose size would overflow the owner's
    /// total are dropped; the number of dropped rows is returned.
    pub(crate) fn from_snapshot(
        data: SnapshotData,
        max_log_entries: usize,
        log_mutations: bool,
    ) -> (Self, usize) {
        let mut tables = Self::new(max_log_entries, log_mutations);
        tables.activity = ActivityLog::restore(data.logs, data.next_seq, max_log_entries);

        for mut client in data.clients {
            client.file_count = 0;
            client.total_size = 0;
            tables.clients.insert(client.id.clone(), client);
        }

        let mut dropped = 0;
        for file in data.files {
            if tables.files.contains_key(&file.id) {
                dropped += 1;
                continue;
            }
            let Some(owner) = tables.clients.get_mut(&file.owner_id) else {
                dropped += 1;
                continue;
            };
            let Some(total) = owner.total_size.checked_add(file.size) else {
                dropped += 1;
                continue;
            };
            owner.file_count += 1;
            owner.total_size = total;
            tables
                .files_by_owner
                .entry(file.owner_id.clone())
                .or_default()
                .insert(file.id.clone());
            tables.files.insert(file.id.clone(), file);
        }
        (tables, dropped)
    }

    fn record(
        &mut self,
        at: u64,
        level: Severity,
        message: String,
        client_id: Option<&str>,
        file_id: Option<&str>,
    ) {
        if self.log_mutations {
            self.activity.append(at, level, message, client_id, file_id);
        }
    }
}

/// BLAKE3 digest over the file's identity, used when no checksum is supplied.
pub(crate) fn derive_checksum(id: &str, owner_id: &str, size: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(id.as_bytes());
    hasher.update(&[0]);
    hasher.update(owner_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(&size.to_le_bytes());
    hex::encode(hasher.finalize().as_bytes())
}
