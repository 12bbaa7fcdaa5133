//! Operation result envelope
//!
//! Every bridge call returns an [`Envelope`]: exactly one of a payload or an
//! error, tagged with the origin that produced it. The fields are private so
//! the "exactly one of" invariant holds by construction.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::TetherError;

/// Which target produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The live backend handle
    Real,
    /// The in-process simulated store
    Simulated,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// Error taxonomy carried inside failed envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Requested id does not exist
    NotFound,
    /// Referential integrity violation attempt
    OwnerNotFound,
    /// Operation missing on both real and simulated targets
    UnsupportedOperation,
    /// Real backend raised or returned failure
    BackendError,
    /// Patch/arguments contained unknown or malformed fields
    ValidationError,
    /// Caller deadline expired
    Timeout,
    /// Unexpected condition (worker panic, snapshot I/O)
    Internal,
}

impl ErrorKind {
    /// Stable name used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::OwnerNotFound => "OwnerNotFound",
            Self::UnsupportedOperation => "UnsupportedOperation",
            Self::BackendError => "BackendError",
            Self::ValidationError => "ValidationError",
            Self::Timeout => "Timeout",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotFound" => Ok(Self::NotFound),
            "OwnerNotFound" => Ok(Self::OwnerNotFound),
            "UnsupportedOperation" => Ok(Self::UnsupportedOperation),
            "BackendError" => Ok(Self::BackendError),
            "ValidationError" => Ok(Self::ValidationError),
            "Timeout" => Ok(Self::Timeout),
            "Internal" => Ok(Self::Internal),
            other => Err(TetherError::validation(format!("unknown error kind {other}"))),
        }
    }
}

/// Error descriptor: kind plus human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    /// Error category
    pub kind: ErrorKind,
    /// Message, preserved from the original failure
    pub message: String,
}

impl EnvelopeError {
    /// Create a new error descriptor.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Turn the descriptor back into a typed error.
    #[must_use]
    pub fn into_error(self) -> TetherError {
        match self.kind {
            ErrorKind::NotFound => TetherError::not_found(self.message),
            ErrorKind::OwnerNotFound => TetherError::owner_not_found(self.message),
            ErrorKind::UnsupportedOperation => TetherError::unsupported(self.message),
            ErrorKind::BackendError => TetherError::backend(self.message),
            ErrorKind::ValidationError => TetherError::validation(self.message),
            ErrorKind::Timeout => TetherError::internal(self.message),
            ErrorKind::Internal => TetherError::internal(self.message),
        }
    }
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Uniform success/data/error result wrapper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    success: bool,
    data: Option<Value>,
    error: Option<EnvelopeError>,
    origin: Origin,
    timestamp: u64,
}

impl Envelope {
    /// A successful envelope carrying `data`.
    pub fn ok(data: Value, origin: Origin, timestamp: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            origin,
            timestamp,
        }
    }

    /// A failed envelope carrying `error`.
    pub fn fail(error: impl Into<EnvelopeError>, origin: Origin, timestamp: u64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            origin,
            timestamp,
        }
    }

    /// Build an envelope from a typed result.
    pub fn from_result(result: Result<Value, TetherError>, origin: Origin, timestamp: u64) -> Self {
        match result {
            Ok(data) => Self::ok(data, origin, timestamp),
            Err(err) => Self::fail(err, origin, timestamp),
        }
    }

    /// Recognize a value that already has the envelope shape.
    ///
    /// A value qualifies when it is an object with a boolean `success` and,
    /// for successes, a `data` member with no non-null `error`; for failures,
    /// a non-null `error`. Error objects with an unknown `kind` are treated as
    /// `BackendError`, keeping the original message.
    pub fn from_shape(value: &Value, origin: Origin, timestamp: u64) -> Option<Self> {
        let object = value.as_object()?;
        let success = object.get("success")?.as_bool()?;
        let error = object.get("error").filter(|e| !e.is_null());

        if success {
            if error.is_some() {
                return None;
            }
            let data = object.get("data")?.clone();
            return Some(Self::ok(data, origin, timestamp));
        }

        let descriptor = match error? {
            Value::Object(fields) => {
                let kind = fields
                    .get("kind")
                    .and_then(Value::as_str)
                    .and_then(|k| k.parse().ok())
                    .unwrap_or(ErrorKind::BackendError);
                let message = fields
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_else(|| Value::Object(fields.clone()).to_string());
                EnvelopeError::new(kind, message)
            }
            Value::String(message) => EnvelopeError::new(ErrorKind::BackendError, message.clone()),
            other => EnvelopeError::new(ErrorKind::BackendError, other.to_string()),
        };
        Some(Self::fail(descriptor, origin, timestamp))
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Payload, present only on success.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Error descriptor, present only on failure.
    pub fn error(&self) -> Option<&EnvelopeError> {
        self.error.as_ref()
    }

    /// Which target produced this result.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Monotonic timestamp (ms) at which the result was normalized.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Re-tag the origin, keeping everything else.
    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Exactly one of {success with data, failure with error}.
    pub fn is_well_formed(&self) -> bool {
        if self.success {
            self.data.is_some() && self.error.is_none()
        } else {
            self.data.is_none() && self.error.is_some()
        }
    }

    /// Convert into a plain result.
    pub fn into_result(self) -> Result<Value, EnvelopeError> {
        match (self.data, self.error) {
            (Some(data), None) if self.success => Ok(data),
            (_, Some(error)) => Err(error),
            _ => Err(EnvelopeError::new(
                ErrorKind::Internal,
                "malformed envelope",
            )),
        }
    }

    /// Decode the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, TetherError> {
        let data = self.into_result().map_err(EnvelopeError::into_error)?;
        serde_json::from_value(data).map_err(TetherError::from)
    }
}
