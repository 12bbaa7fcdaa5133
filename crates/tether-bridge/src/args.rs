//! Named-argument extraction
//!
//! Operation arguments are JSON objects. `null` is accepted as "no
//! arguments". Anything malformed is a validation error, never a panic.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tether_core::{Result, TetherError};

static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();

pub(crate) fn fields(args: &Value) -> Result<&Map<String, Value>> {
    match args {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(EMPTY.get_or_init(Map::new)),
        other => Err(TetherError::validation(format!(
            "arguments must be an object, got {other}"
        ))),
    }
}

pub(crate) fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str> {
    optional_str(args, field)?
        .ok_or_else(|| TetherError::validation(format!("missing argument {field}")))
}

pub(crate) fn optional_str<'a>(args: &'a Value, field: &str) -> Result<Option<&'a str>> {
    match fields(args)?.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(TetherError::validation(format!(
            "argument {field} must be a string, got {other}"
        ))),
    }
}

pub(crate) fn optional_usize(args: &Value, field: &str) -> Result<Option<usize>> {
    match fields(args)?.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                TetherError::validation(format!(
                    "argument {field} must be a non-negative integer, got {value}"
                ))
            }),
    }
}

pub(crate) fn required_object<'a>(args: &'a Value, field: &str) -> Result<&'a Map<String, Value>> {
    match fields(args)?.get(field) {
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(TetherError::validation(format!(
            "argument {field} must be an object, got {other}"
        ))),
        None => Err(TetherError::validation(format!("missing argument {field}"))),
    }
}

pub(crate) fn parsed<T>(args: &Value, field: &str) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = TetherError>,
{
    optional_str(args, field)?.map(str::parse).transpose()
}

/// Deserialize the whole argument object into `T`.
pub(crate) fn decode<T: DeserializeOwned>(args: &Value) -> Result<T> {
    decode_without(args, &[])
}

/// Deserialize the argument object into `T`, minus the routing fields in `skip`.
pub(crate) fn decode_without<T: DeserializeOwned>(args: &Value, skip: &[&str]) -> Result<T> {
    let mut map = fields(args)?.clone();
    for field in skip {
        map.remove(*field);
    }
    serde_json::from_value(Value::Object(map))
        .map_err(|e| TetherError::validation(format!("invalid arguments: {e}")))
}
