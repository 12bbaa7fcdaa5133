//! Named operation surface
//!
//! Real and simulated backends are addressed by operation name. [`Operation`]
//! enumerates the names the simulated store understands; real backends may
//! support any subset (or extra names) and advertise that through
//! capability lookup.

use std::fmt;
use std::str::FromStr;

use crate::errors::TetherError;

/// Operations understood by the simulated backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list_primary` - all clients, most recently seen first
    ListPrimary,
    /// `get_primary {id}`
    GetPrimary,
    /// `add_primary {id?, name, status?}`
    AddPrimary,
    /// `delete_primary {id}` - cascades to owned files
    DeletePrimary,
    /// `touch_primary {id, status?}` - heartbeat
    TouchPrimary,
    /// `list_dependents {owner_id?}`
    ListDependents,
    /// `get_dependent {id}`
    GetDependent,
    /// `add_dependent {owner_id, id?, name?, size, verified?, checksum?}`
    AddDependent,
    /// `delete_dependent {id}`
    DeleteDependent,
    /// `update_field {collection, id, patch}`
    UpdateField,
    /// `integrity_check`
    IntegrityCheck,
    /// `status_summary`
    StatusSummary,
    /// `list_logs {limit?}`
    ListLogs,
    /// `append_log {level?, message, client_id?, file_id?}`
    AppendLog,
    /// `persist` - write the snapshot, if one is configured
    Persist,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 15] = [
        Self::ListPrimary,
        Self::GetPrimary,
        Self::AddPrimary,
        Self::DeletePrimary,
        Self::TouchPrimary,
        Self::ListDependents,
        Self::GetDependent,
        Self::AddDependent,
        Self::DeleteDependent,
        Self::UpdateField,
        Self::IntegrityCheck,
        Self::StatusSummary,
        Self::ListLogs,
        Self::AppendLog,
        Self::Persist,
    ];

    /// Wire name of the operation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListPrimary => "list_primary",
            Self::GetPrimary => "get_primary",
            Self::AddPrimary => "add_primary",
            Self::DeletePrimary => "delete_primary",
            Self::TouchPrimary => "touch_primary",
            Self::ListDependents => "list_dependents",
            Self::GetDependent => "get_dependent",
            Self::AddDependent => "add_dependent",
            Self::DeleteDependent => "delete_dependent",
            Self::UpdateField => "update_field",
            Self::IntegrityCheck => "integrity_check",
            Self::StatusSummary => "status_summary",
            Self::ListLogs => "list_logs",
            Self::AppendLog => "append_log",
            Self::Persist => "persist",
        }
    }

    /// Whether the operation changes store state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::AddPrimary
                | Self::DeletePrimary
                | Self::TouchPrimary
                | Self::AddDependent
                | Self::DeleteDependent
                | Self::UpdateField
                | Self::AppendLog
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| TetherError::unsupported(s))
    }
}
