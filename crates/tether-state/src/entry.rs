//! State table entries

use serde::Serialize;
use serde_json::Value;
use tether_core::EnvelopeError;

/// Lifecycle phase of a key: `Idle → Loading → (Idle | Error)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No call in flight and the last call (if any) succeeded
    #[default]
    Idle,
    /// At least one mediated call is in flight
    Loading,
    /// No call in flight and the last call failed
    Error,
}

/// Progress indicator, independent of the loading flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Progress {
    /// Completed fraction in `[0, 1]`
    Fraction(f64),
    /// Work in progress with unknown extent
    Indeterminate,
}

impl Progress {
    /// Clamp `fraction` into `[0, 1]`; NaN becomes [`Progress::Indeterminate`].
    pub fn fraction(fraction: f64) -> Self {
        if fraction.is_nan() {
            Self::Indeterminate
        } else {
            Self::Fraction(fraction.clamp(0.0, 1.0))
        }
    }

    /// The fraction, when determinate.
    pub fn as_fraction(&self) -> Option<f64> {
        match self {
            Self::Fraction(f) => Some(*f),
            Self::Indeterminate => None,
        }
    }
}

impl From<f64> for Progress {
    fn from(fraction: f64) -> Self {
        Self::fraction(fraction)
    }
}

/// One key of the state table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateEntry {
    /// Last good value
    pub value: Option<Value>,
    /// Monotonic timestamp (ms) of the last value change
    pub updated_at: u64,
    /// Producer of the current value (operation name or caller tag)
    pub source: Option<String>,
    /// Mediated calls currently in flight
    pub in_flight: u32,
    /// Progress indicator
    pub progress: Option<Progress>,
    /// Error from the most recent failed call, cleared on success
    pub error: Option<EnvelopeError>,
}

impl StateEntry {
    /// Whether any mediated call is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Derived lifecycle phase.
    pub fn phase(&self) -> Phase {
        if self.is_loading() {
            Phase::Loading
        } else if self.error.is_some() {
            Phase::Error
        } else {
            Phase::Idle
        }
    }

    /// Loading/progress/error view published to status watchers.
    pub fn status(&self) -> EntryStatus {
        EntryStatus {
            phase: self.phase(),
            loading: self.is_loading(),
            progress: self.progress,
            error: self.error.clone(),
        }
    }
}

/// Status of a key without its value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryStatus {
    /// Derived phase
    pub phase: Phase,
    /// Loading flag
    pub loading: bool,
    /// Progress indicator
    pub progress: Option<Progress>,
    /// Recorded error
    pub error: Option<EnvelopeError>,
}
