//! Best-effort JSON snapshot of the store
//!
//! The snapshot is a single JSON document written atomically (temp file then
//! rename). Derived counters are stored for readability but are recomputed on
//! load, so a hand-edited snapshot cannot introduce counter drift.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tether_core::{Client, FileRecord, LogEntry, Result, TetherError};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk representation of the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Format version; must equal [`SNAPSHOT_VERSION`]
    pub version: u32,
    /// All clients
    pub clients: Vec<Client>,
    /// All files
    pub files: Vec<FileRecord>,
    /// Retained activity log
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Next activity sequence id
    #[serde(default)]
    pub next_seq: u64,
}

impl SnapshotData {
    /// Largest timestamp stored anywhere in the snapshot.
    pub fn newest_timestamp(&self) -> u64 {
        let clients = self.clients.iter().map(|c| c.last_seen);
        let files = self.files.iter().map(|f| f.created_at);
        let logs = self.logs.iter().map(|l| l.at);
        clients.chain(files).chain(logs).max().unwrap_or(0)
    }
}

/// Read a snapshot.
///
/// Returns `Ok(None)` when the file does not exist, and an error when it
/// exists but cannot be parsed or has an unknown version.
pub fn read(path: &Path) -> Result<Option<SnapshotData>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(TetherError::storage(format!("{}: {e}", path.display()))),
    };
    let data: SnapshotData = serde_json::from_slice(&raw)?;
    if data.version != SNAPSHOT_VERSION {
        return Err(TetherError::storage(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            data.version
        )));
    }
    let exhausted = data.next_seq == u64::MAX || data.logs.iter().any(|e| e.seq == u64::MAX);
    if exhausted {
        return Err(TetherError::storage(format!(
            "{}: activity log sequence exhausted",
            path.display()
        )));
    }
    Ok(Some(data))
}

/// Write a snapshot, creating parent directories as needed.
pub fn write(path: &Path, data: &SnapshotData) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
