//! Entity model
//!
//! Two linked collections: clients (primary entities, carrying derived
//! counters) and files (dependent entities, each owned by exactly one
//! client). Plus the append-only activity log and the aggregate status
//! summary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::TetherError;

// ============================================================================
// Clients
// ============================================================================

/// Connection status of a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    /// Known to the backend but never connected
    #[default]
    Registered,
    /// Currently connected
    Connected,
    /// Previously connected, now unreachable
    Offline,
}

impl ClientStatus {
    /// Wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Connected => "connected",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientStatus {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(Self::Registered),
            "connected" => Ok(Self::Connected),
            "offline" => Ok(Self::Offline),
            other => Err(TetherError::validation(format!(
                "unknown client status {other:?}"
            ))),
        }
    }
}

/// A primary entity.
///
/// `file_count` and `total_size` are derived from the files that reference
/// this client and are never set directly by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Connection status
    pub status: ClientStatus,
    /// Monotonic timestamp (ms) of the last heartbeat or creation
    pub last_seen: u64,
    /// Number of files owned by this client
    pub file_count: u64,
    /// Sum of the sizes of files owned by this client, in bytes
    pub total_size: u64,
}

/// Fields accepted when creating a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewClient {
    /// Explicit id; a fresh one is assigned when absent
    #[serde(default)]
    pub id: Option<String>,
    /// Display name
    pub name: String,
    /// Initial status (defaults to `registered`)
    #[serde(default)]
    pub status: Option<ClientStatus>,
}

impl NewClient {
    /// A new client with the given display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Use an explicit id instead of a generated one.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the initial status.
    #[must_use]
    pub fn with_status(mut self, status: ClientStatus) -> Self {
        self.status = Some(status);
        self
    }
}

// ============================================================================
// Files
// ============================================================================

/// A dependent entity, owned by exactly one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique identifier
    pub id: String,
    /// Owning client id; always resolves while the file exists
    pub owner_id: String,
    /// File name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Monotonic creation timestamp (ms)
    pub created_at: u64,
    /// Whether the file passed verification
    pub verified: bool,
    /// Opaque integrity checksum
    pub checksum: String,
}

/// Fields accepted when creating a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewFile {
    /// Explicit id; a fresh one is assigned when absent
    #[serde(default)]
    pub id: Option<String>,
    /// File name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Verification flag
    #[serde(default)]
    pub verified: bool,
    /// Opaque checksum; derived from id, owner and size when absent
    #[serde(default)]
    pub checksum: Option<String>,
}

impl NewFile {
    /// A new file of the given size.
    pub fn sized(size: u64) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Use an explicit id instead of a generated one.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the file name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the file as verified.
    #[must_use]
    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    /// Supply a checksum.
    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }
}

// ============================================================================
// Collections & records
// ============================================================================

/// The two entity collections addressable by `update_field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Primary entities
    Clients,
    /// Dependent entities
    Files,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clients => write!(f, "clients"),
            Self::Files => write!(f, "files"),
        }
    }
}

impl FromStr for Collection {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clients" | "client" | "primary" => Ok(Self::Clients),
            "files" | "file" | "dependent" | "dependents" => Ok(Self::Files),
            other => Err(TetherError::validation(format!(
                "unknown collection {other:?}"
            ))),
        }
    }
}

/// Either kind of entity, as returned by `update_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    /// An updated client
    Client(Client),
    /// An updated file
    File(FileRecord),
}

// ============================================================================
// Activity log
// ============================================================================

/// Severity of an activity log entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Diagnostic detail
    Debug,
    /// Normal activity
    #[default]
    Info,
    /// Something worth attention
    Warning,
    /// A failure
    Error,
}

impl FromStr for Severity {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(TetherError::validation(format!("unknown severity {other:?}"))),
        }
    }
}

/// Append-only activity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Strictly increasing sequence id
    pub seq: u64,
    /// Monotonic timestamp (ms)
    pub at: u64,
    /// Severity
    pub level: Severity,
    /// Free-text message
    pub message: String,
    /// Related client, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Related file, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

// ============================================================================
// Aggregate status
// ============================================================================

/// Aggregate status of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    /// Total clients
    pub clients: u64,
    /// Clients in `registered`
    pub registered: u64,
    /// Clients in `connected`
    pub connected: u64,
    /// Clients in `offline`
    pub offline: u64,
    /// Total files
    pub files: u64,
    /// Files with the verification flag set
    pub verified_files: u64,
    /// Sum of all file sizes, in bytes
    pub total_size: u64,
    /// Retained activity log entries
    pub log_entries: u64,
    /// Milliseconds since the store was opened
    pub uptime_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_parse_and_display() {
        for status in [
            ClientStatus::Registered,
            ClientStatus::Connected,
            ClientStatus::Offline,
        ] {
            assert_eq!(status.as_str().parse::<ClientStatus>().unwrap(), status);
        }
        assert!("online".parse::<ClientStatus>().is_err());
    }

    #[test]
    fn test_collection_aliases() {
        assert_eq!("primary".parse::<Collection>().unwrap(), Collection::Clients);
        assert_eq!("dependent".parse::<Collection>().unwrap(), Collection::Files);
        assert!("widgets".parse::<Collection>().is_err());
    }

    #[test]
    fn test_new_file_deserializes_with_defaults() {
        let file: NewFile = serde_json::from_value(json!({"size": 100})).unwrap();
        assert_eq!(file, NewFile::sized(100));
    }

    #[test]
    fn test_log_entry_omits_empty_refs() {
        let entry = LogEntry {
            seq: 1,
            at: 0,
            level: Severity::Info,
            message: "hello".into(),
            client_id: None,
            file_id: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("client_id").is_none());
        assert_eq!(value["level"], json!("info"));
    }
}
