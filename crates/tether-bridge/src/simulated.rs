//! Simulated backend adapter
//!
//! Exposes [`SimulatedStore`] through the [`Backend`] trait. Every store
//! operation takes a lock, so calls are issued as blocking work.

use std::sync::Arc;

use serde_json::Value;
use tether_core::{Collection, NewClient, NewFile, Operation, Result, Severity, TetherError};
use tether_store::SimulatedStore;

use crate::args;
use crate::backend::{Backend, BackendCall};

/// [`Backend`] implementation backed by the simulated store.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    store: Arc<SimulatedStore>,
}

impl SimulatedBackend {
    /// Wrap a store.
    pub fn new(store: Arc<SimulatedStore>) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn store(&self) -> &Arc<SimulatedStore> {
        &self.store
    }
}

impl Backend for SimulatedBackend {
    fn label(&self) -> &str {
        "simulated"
    }

    fn supports(&self, operation: &str) -> bool {
        operation.parse::<Operation>().is_ok()
    }

    fn call(&self, operation: &str, args: Value) -> BackendCall {
        let store = Arc::clone(&self.store);
        let operation = operation.to_string();
        BackendCall::blocking(move || dispatch(&store, &operation, &args))
    }
}

/// Execute a named operation against `store`.
///
/// Results are serialized to JSON: entities and lists as their serde form,
/// deletes as a boolean, `persist` as `{"path": ...}`.
pub fn dispatch(store: &SimulatedStore, operation: &str, args: &Value) -> Result<Value> {
    let op: Operation = operation.parse()?;
    args::fields(args)?;
    tracing::trace!(operation = %op, "simulated dispatch");

    let value = match op {
        Operation::ListPrimary => serde_json::to_value(store.list_primary())?,
        Operation::GetPrimary => {
            serde_json::to_value(store.get_primary(args::required_str(args, "id")?)?)?
        }
        Operation::AddPrimary => {
            let new: NewClient = args::decode(args)?;
            serde_json::to_value(store.add_primary(new)?)?
        }
        Operation::DeletePrimary => {
            Value::Bool(store.delete_primary(args::required_str(args, "id")?))
        }
        Operation::TouchPrimary => {
            let id = args::required_str(args, "id")?;
            let status = args::parsed(args, "status")?;
            serde_json::to_value(store.touch_primary(id, status)?)?
        }
        Operation::ListDependents => {
            let owner = args::optional_str(args, "owner_id")?;
            serde_json::to_value(store.list_dependents(owner))?
        }
        Operation::GetDependent => {
            serde_json::to_value(store.get_dependent(args::required_str(args, "id")?)?)?
        }
        Operation::AddDependent => {
            let owner = args::required_str(args, "owner_id")?;
            let new: NewFile = args::decode_without(args, &["owner_id"])?;
            serde_json::to_value(store.add_dependent(owner, new)?)?
        }
        Operation::DeleteDependent => {
            Value::Bool(store.delete_dependent(args::required_str(args, "id")?))
        }
        Operation::UpdateField => {
            let collection: Collection = args::parsed(args, "collection")?
                .ok_or_else(|| TetherError::validation("missing argument collection"))?;
            let id = args::required_str(args, "id")?;
            let patch = args::required_object(args, "patch")?;
            serde_json::to_value(store.update_field(collection, id, patch)?)?
        }
        Operation::IntegrityCheck => serde_json::to_value(store.integrity_check())?,
        Operation::StatusSummary => serde_json::to_value(store.status_summary())?,
        Operation::ListLogs => {
            serde_json::to_value(store.list_logs(args::optional_usize(args, "limit")?))?
        }
        Operation::AppendLog => {
            let level: Severity = args::parsed(args, "level")?.unwrap_or_default();
            let message = args::required_str(args, "message")?;
            let entry = store.append_log(
                level,
                message,
                args::optional_str(args, "client_id")?,
                args::optional_str(args, "file_id")?,
            );
            serde_json::to_value(entry)?
        }
        Operation::Persist => {
            let path = store.persist()?;
            serde_json::json!({ "path": path.display().to_string() })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_add_and_list() {
        let store = SimulatedStore::in_memory();
        let client = dispatch(&store, "add_primary", &json!({"name": "Acme", "id": "c1"})).unwrap();
        assert_eq!(client["id"], json!("c1"));
        assert_eq!(client["file_count"], json!(0));

        dispatch(&store, "add_dependent", &json!({"owner_id": "c1", "size": 100})).unwrap();
        let files = dispatch(&store, "list_dependents", &json!({"owner_id": "c1"})).unwrap();
        assert_eq!(files.as_array().map(Vec::len), Some(1));

        let listed = dispatch(&store, "list_primary", &Value::Null).unwrap();
        assert_eq!(listed[0]["total_size"], json!(100));
    }

    #[test]
    fn test_dispatch_errors() {
        let store = SimulatedStore::in_memory();
        assert!(matches!(
            dispatch(&store, "add_dependent", &json!({"owner_id": "ghost", "size": 1})),
            Err(TetherError::OwnerNotFound { .. })
        ));
        assert!(matches!(
            dispatch(&store, "get_primary", &json!({})),
            Err(TetherError::Validation { .. })
        ));
        assert!(matches!(
            dispatch(&store, "reticulate_splines", &Value::Null),
            Err(TetherError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_dispatch_update_field_and_delete() {
        let store = SimulatedStore::in_memory();
        dispatch(&store, "add_primary", &json!({"name": "Acme", "id": "c1"})).unwrap();
        let updated = dispatch(
            &store,
            "update_field",
            &json!({"collection": "clients", "id": "c1", "patch": {"status": "offline"}}),
        )
        .unwrap();
        assert_eq!(updated["status"], json!("offline"));

        assert_eq!(dispatch(&store, "delete_primary", &json!({"id": "c1"})).unwrap(), json!(true));
        assert_eq!(dispatch(&store, "delete_primary", &json!({"id": "c1"})).unwrap(), json!(false));
    }

    #[test]
    fn test_supports_only_known_operations() {
        let backend = SimulatedBackend::new(Arc::new(SimulatedStore::in_memory()));
        assert!(backend.supports("integrity_check"));
        assert!(!backend.supports("launch"));
    }
}
