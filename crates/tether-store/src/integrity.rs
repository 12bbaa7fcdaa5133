//! Integrity audit results

use serde::Serialize;

/// A broken invariant found by a full scan of the store.
///
/// In correct operation no violation is ever reported; the audit exists so
/// tests and operators can prove that.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    /// A file whose owner does not resolve
    OrphanFile {
        /// The orphaned file
        file_id: String,
        /// The unresolved owner id
        owner_id: String,
    },

    /// A client whose stored counters disagree with a recount
    CounterDrift {
        /// The affected client
        client_id: String,
        /// Stored `file_count`
        recorded_count: u64,
        /// Recounted number of files
        actual_count: u64,
        /// Stored `total_size`
        recorded_size: u64,
        /// Recounted sum of file sizes
        actual_size: u64,
    },

    /// The per-owner index disagrees with the file table
    IndexDrift {
        /// The affected owner id
        owner_id: String,
        /// The file present in one structure but not the other
        file_id: String,
    },
}

impl Violation {
    /// Short human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Self::OrphanFile { file_id, owner_id } => {
                format!("file {file_id} references missing client {owner_id}")
            }
            Self::CounterDrift {
                client_id,
                recorded_count,
                actual_count,
                recorded_size,
                actual_size,
            } => format!(
                "client {client_id} records {recorded_count} files / {recorded_size} bytes, \
                 actual {actual_count} files / {actual_size} bytes"
            ),
            Self::IndexDrift { owner_id, file_id } => {
                format!("owner index for {owner_id} disagrees about file {file_id}")
            }
        }
    }
}
