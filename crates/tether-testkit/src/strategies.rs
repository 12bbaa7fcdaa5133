//! Property test strategies for store operations
//!
//! Ids are drawn from small pools so generated sequences collide often:
//! deletes hit existing rows, files land on existing (and deleted) owners.

use proptest::prelude::*;
use serde_json::{json, Value};

pub use proptest;

/// One bridge-level store operation.
#[derive(Debug, Clone)]
pub enum StoreOp {
    /// `add_primary`
    AddClient(u8),
    /// `delete_primary`
    DeleteClient(u8),
    /// `add_dependent`
    AddFile {
        /// Owner pool index
        owner: u8,
        /// File pool index
        file: u8,
        /// Size in bytes
        size: u32,
    },
    /// `delete_dependent`
    DeleteFile(u8),
    /// `update_field` on a file's size
    ResizeFile {
        /// File pool index
        file: u8,
        /// New size in bytes
        size: u32,
    },
}

impl StoreOp {
    /// Operation name and arguments for the bridge.
    pub fn to_call(&self) -> (&'static str, Value) {
        match self {
            Self::AddClient(n) => ("add_primary", json!({"id": client_id(*n), "name": "client"})),
            Self::DeleteClient(n) => ("delete_primary", json!({"id": client_id(*n)})),
            Self::AddFile { owner, file, size } => (
                "add_dependent",
                json!({"owner_id": client_id(*owner), "id": file_id(*file), "size": size}),
            ),
            Self::DeleteFile(n) => ("delete_dependent", json!({"id": file_id(*n)})),
            Self::ResizeFile { file, size } => (
                "update_field",
                json!({"collection": "files", "id": file_id(*file), "patch": {"size": size}}),
            ),
        }
    }
}

/// Client id for pool index `n`.
pub fn client_id(n: u8) -> String {
    format!("client-{n}")
}

/// File id for pool index `n`.
pub fn file_id(n: u8) -> String {
    format!("file-{n}")
}

/// Strategy for a single store operation.
pub fn arb_store_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        3 => (0u8..5).prop_map(StoreOp::AddClient),
        1 => (0u8..5).prop_map(StoreOp::DeleteClient),
        4 => (0u8..5, 0u8..20, 0u32..50_000)
            .prop_map(|(owner, file, size)| StoreOp::AddFile { owner, file, size }),
        2 => (0u8..20).prop_map(StoreOp::DeleteFile),
        1 => (0u8..20, 0u32..50_000).prop_map(|(file, size)| StoreOp::ResizeFile { file, size }),
    ]
}

/// Strategy for a sequence of store operations.
pub fn arb_store_ops(max_len: usize) -> impl Strategy<Value = Vec<StoreOp>> {
    prop::collection::vec(arb_store_op(), 1..max_len.max(2))
}
