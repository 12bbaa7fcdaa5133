//! User intents
//!
//! An [`Intent`] names something the UI wants done. Each intent plans into at
//! most one mutation followed by the refreshes that bring the affected keys
//! back in line with the backend. [`StateManager::dispatch`] executes the
//! plan.
//!
//! [`StateManager::dispatch`]: crate::StateManager::dispatch

use serde_json::{json, Map, Value};
use tether_core::{Envelope, NewClient, NewFile, Operation};

/// Well-known state keys.
pub mod keys {
    /// All clients
    pub const CLIENTS: &str = "clients";
    /// All files
    pub const FILES: &str = "files";
    /// Aggregate status summary
    pub const STATUS: &str = "status";
    /// Recent activity log
    pub const LOGS: &str = "logs";
    /// Result of the most recent mutation
    pub const LAST_MUTATION: &str = "last_mutation";

    /// Files of one owner.
    pub fn files_key(owner_id: &str) -> String {
        format!("{FILES}:{owner_id}")
    }
}

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Reload the client list
    RefreshClients,
    /// Reload files, optionally of one owner
    RefreshFiles {
        /// Owner filter
        owner_id: Option<String>,
    },
    /// Reload the status summary
    RefreshStatus,
    /// Reload recent log entries
    RefreshLogs {
        /// Maximum entries, newest first
        limit: Option<usize>,
    },
    /// Register a client
    AddClient(NewClient),
    /// Remove a client and its files
    DeleteClient {
        /// Client id
        id: String,
    },
    /// Add a file to a client
    AddFile {
        /// Owning client
        owner_id: String,
        /// File fields
        file: NewFile,
    },
    /// Remove a file
    DeleteFile {
        /// File id
        id: String,
    },
    /// Mark a file verified
    VerifyFile {
        /// File id
        id: String,
    },
    /// Patch client fields
    UpdateClient {
        /// Client id
        id: String,
        /// Fields to change
        patch: Map<String, Value>,
    },
}

/// One bridge call and the key its result lands in.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Target state key
    pub key: String,
    /// Operation to invoke
    pub operation: Operation,
    /// Operation arguments
    pub args: Value,
}

impl Call {
    fn new(key: impl Into<String>, operation: Operation, args: Value) -> Self {
        Self {
            key: key.into(),
            operation,
            args,
        }
    }
}

/// The calls an intent expands to.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentPlan {
    /// Mutation run first, its result stored under [`keys::LAST_MUTATION`]
    pub mutation: Option<Call>,
    /// Reads run in order after a successful mutation
    pub refresh: Vec<Call>,
}

/// Envelopes produced by a dispatched intent.
#[derive(Debug, Clone)]
pub struct IntentOutcome {
    /// Envelope of the mutation, if the intent had one
    pub mutation: Option<Envelope>,
    /// `(key, envelope)` per refresh that ran
    pub refreshed: Vec<(String, Envelope)>,
}

impl IntentOutcome {
    /// Whether every call that ran succeeded.
    pub fn is_success(&self) -> bool {
        self.mutation.as_ref().map_or(true, Envelope::is_success)
            && self.refreshed.iter().all(|(_, e)| e.is_success())
    }
}

fn refresh_clients() -> Call {
    Call::new(keys::CLIENTS, Operation::ListPrimary, Value::Null)
}

fn refresh_files(owner_id: Option<&str>) -> Call {
    match owner_id {
        Some(owner) => Call::new(
            keys::files_key(owner),
            Operation::ListDependents,
            json!({ "owner_id": owner }),
        ),
        None => Call::new(keys::FILES, Operation::ListDependents, Value::Null),
    }
}

fn refresh_status() -> Call {
    Call::new(keys::STATUS, Operation::StatusSummary, Value::Null)
}

fn mutation(operation: Operation, args: Value) -> Option<Call> {
    Some(Call::new(keys::LAST_MUTATION, operation, args))
}

impl Intent {
    /// Expand into bridge calls.
    pub fn plan(&self) -> IntentPlan {
        match self {
            Self::RefreshClients => IntentPlan {
                mutation: None,
                refresh: vec![refresh_clients()],
            },
            Self::RefreshFiles { owner_id } => IntentPlan {
                mutation: None,
                refresh: vec![refresh_files(owner_id.as_deref())],
            },
            Self::RefreshStatus => IntentPlan {
                mutation: None,
                refresh: vec![refresh_status()],
            },
            Self::RefreshLogs { limit } => IntentPlan {
                mutation: None,
                refresh: vec![Call::new(
                    keys::LOGS,
                    Operation::ListLogs,
                    json!({ "limit": limit }),
                )],
            },
            Self::AddClient(client) => IntentPlan {
                mutation: mutation(
                    Operation::AddPrimary,
                    json!({ "id": client.id, "name": client.name, "status": client.status }),
                ),
                refresh: vec![refresh_clients(), refresh_status()],
            },
            Self::DeleteClient { id } => IntentPlan {
                mutation: mutation(Operation::DeletePrimary, json!({ "id": id })),
                refresh: vec![refresh_clients(), refresh_files(None), refresh_status()],
            },
            Self::AddFile { owner_id, file } => IntentPlan {
                mutation: mutation(
                    Operation::AddDependent,
                    json!({
                        "owner_id": owner_id,
                        "id": file.id,
                        "name": file.name,
                        "size": file.size,
                        "verified": file.verified,
                        "checksum": file.checksum,
                    }),
                ),
                refresh: vec![
                    refresh_files(Some(owner_id)),
                    refresh_clients(),
                    refresh_status(),
                ],
            },
            Self::DeleteFile { id } => IntentPlan {
                mutation: mutation(Operation::DeleteDependent, json!({ "id": id })),
                refresh: vec![refresh_files(None), refresh_clients(), refresh_status()],
            },
            Self::VerifyFile { id } => IntentPlan {
                mutation: mutation(
                    Operation::UpdateField,
                    json!({ "collection": "files", "id": id, "patch": { "verified": true } }),
                ),
                refresh: vec![refresh_files(None), refresh_status()],
            },
            Self::UpdateClient { id, patch } => IntentPlan {
                mutation: mutation(
                    Operation::UpdateField,
                    json!({ "collection": "clients", "id": id, "patch": patch }),
                ),
                refresh: vec![refresh_clients()],
            },
        }
    }
}
