//! Partial-update validation
//!
//! A patch is parsed in full before anything is written, so an invalid key
//! anywhere in the patch leaves the entity untouched.

use serde_json::{Map, Value};

use tether_core::{ClientStatus, Collection, Result, TetherError};

const CLIENT_READ_ONLY: &[&str] = &["id", "last_seen", "file_count", "total_size"];
const FILE_READ_ONLY: &[&str] = &["id", "owner_id", "created_at"];

/// Validated changes to a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ClientPatch {
    pub(crate) name: Option<String>,
    pub(crate) status: Option<ClientStatus>,
}

/// Validated changes to a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FilePatch {
    pub(crate) name: Option<String>,
    pub(crate) size: Option<u64>,
    pub(crate) verified: Option<bool>,
    pub(crate) checksum: Option<String>,
}

impl ClientPatch {
    pub(crate) fn parse(patch: &Map<String, Value>) -> Result<Self> {
        ensure_not_empty(patch)?;
        let mut parsed = Self::default();
        for (key, value) in patch {
            match key.as_str() {
                "name" => parsed.name = Some(non_blank_string(key, value)?),
                "status" => parsed.status = Some(string(key, value)?.parse()?),
                other => return Err(rejected(Collection::Clients, other, CLIENT_READ_ONLY)),
            }
        }
        Ok(parsed)
    }
}

impl FilePatch {
    pub(crate) fn parse(patch: &Map<String, Value>) -> Result<Self> {
        ensure_not_empty(patch)?;
        let mut parsed = Self::default();
        for (key, value) in patch {
            match key.as_str() {
                "name" => parsed.name = Some(non_blank_string(key, value)?),
                "size" => {
                    parsed.size = Some(value.as_u64().ok_or_else(|| {
                        TetherError::validation(format!(
                            "field size must be a non-negative integer, got {value}"
                        ))
                    })?);
                }
                "verified" => {
                    parsed.verified = Some(value.as_bool().ok_or_else(|| {
                        TetherError::validation(format!(
                            "field verified must be a boolean, got {value}"
                        ))
                    })?);
                }
                "checksum" => parsed.checksum = Some(string(key, value)?),
                other => return Err(rejected(Collection::Files, other, FILE_READ_ONLY)),
            }
        }
        Ok(parsed)
    }
}

fn ensure_not_empty(patch: &Map<String, Value>) -> Result<()> {
    if patch.is_empty() {
        return Err(TetherError::validation(
            "patch must contain at least one field",
        ));
    }
    Ok(())
}

fn rejected(collection: Collection, key: &str, read_only: &[&str]) -> TetherError {
    if read_only.contains(&key) {
        TetherError::validation(format!("field {key} of {collection} is read-only"))
    } else {
        TetherError::validation(format!("unknown field {key} for {collection}"))
    }
}

fn string(key: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| TetherError::validation(format!("field {key} must be a string, got {value}")))
}

fn non_blank_string(key: &str, value: &Value) -> Result<String> {
    let s = string(key, value)?;
    if s.trim().is_empty() {
        return Err(TetherError::validation(format!("field {key} must not be blank")));
    }
    Ok(s)
}
