//! Scripted real backend
//!
//! [`ScriptedBackend`] plays the part of the live backend in tests. Each
//! operation can be scripted to return a value, fail, or panic; unscripted
//! operations can be forwarded to a simulated store so the "real" backend
//! behaves like a remote copy of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tether_bridge::simulated::dispatch;
use tether_bridge::{Backend, BackendCall};
use tether_core::{Operation, TetherError};
use tether_store::SimulatedStore;

/// How scripted work is handed to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Produce [`BackendCall::Blocking`] work
    Blocking,
    /// Produce [`BackendCall::Deferred`] work
    Deferred,
}

type WorkResult = Result<Value, TetherError>;
type Work = Box<dyn FnOnce() -> WorkResult + Send>;

#[derive(Debug, Clone)]
enum Script {
    Respond(Value),
    Fail(TetherError),
    Panic(String),
}

/// One call received by a [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Operation name
    pub operation: String,
    /// Arguments as received
    pub args: Value,
}

/// Test double for the real backend.
#[derive(Debug)]
pub struct ScriptedBackend {
    label: String,
    mode: CallMode,
    latency: Option<Duration>,
    available: AtomicBool,
    scripts: Mutex<HashMap<String, Script>>,
    forward_to: Option<Arc<SimulatedStore>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    /// An available backend that supports nothing until scripted.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            mode: CallMode::Blocking,
            latency: None,
            available: AtomicBool::new(true),
            scripts: Mutex::new(HashMap::new()),
            forward_to: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer `operation` with `value`.
    #[must_use]
    pub fn respond(self, operation: &str, value: Value) -> Self {
        self.script(operation, Script::Respond(value))
    }

    /// Fail `operation` with `error`.
    #[must_use]
    pub fn fail(self, operation: &str, error: TetherError) -> Self {
        self.script(operation, Script::Fail(error))
    }

    /// Panic inside the worker when `operation` runs.
    #[must_use]
    pub fn panic_on(self, operation: &str, message: impl Into<String>) -> Self {
        self.script(operation, Script::Panic(message.into()))
    }

    /// Serve every known operation that is not scripted from `store`.
    #[must_use]
    pub fn forwarding(mut self, store: Arc<SimulatedStore>) -> Self {
        self.forward_to = Some(store);
        self
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Produce deferred (async) work instead of blocking work.
    #[must_use]
    pub fn deferred(mut self) -> Self {
        self.mode = CallMode::Deferred;
        self
    }

    /// Start unavailable.
    #[must_use]
    pub fn unavailable(self) -> Self {
        self.set_available(false);
        self
    }

    /// Wrap in an `Arc` for [`DelegationBridge::attach_real`](tether_bridge::DelegationBridge::attach_real).
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Flip availability at runtime.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of calls received for `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    fn script(self, operation: &str, script: Script) -> Self {
        self.scripts.lock().insert(operation.to_string(), script);
        self
    }

    fn work(&self, operation: &str, args: Value) -> Work {
        let script = self.scripts.lock().get(operation).cloned();
        match script {
            Some(Script::Respond(value)) => Box::new(move || -> WorkResult { Ok(value) }),
            Some(Script::Fail(error)) => Box::new(move || -> WorkResult { Err(error) }),
            Some(Script::Panic(message)) => {
                Box::new(move || -> WorkResult { panic!("{message}") })
            }
            None => {
                let store = self.forward_to.clone();
                let operation = operation.to_string();
                Box::new(move || -> WorkResult {
                    match store {
                        Some(store) => dispatch(&store, &operation, &args),
                        None => Err(TetherError::unsupported(operation)),
                    }
                })
            }
        }
    }
}

impl Backend for ScriptedBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn supports(&self, operation: &str) -> bool {
        self.scripts.lock().contains_key(operation)
            || (self.forward_to.is_some() && operation.parse::<Operation>().is_ok())
    }

    fn call(&self, operation: &str, args: Value) -> BackendCall {
        self.calls.lock().push(RecordedCall {
            operation: operation.to_string(),
            args: args.clone(),
        });
        let work = self.work(operation, args);
        let latency = self.latency;
        match self.mode {
            CallMode::Blocking => BackendCall::blocking(move || {
                if let Some(latency) = latency {
                    std::thread::sleep(latency);
                }
                work()
            }),
            CallMode::Deferred => BackendCall::deferred(async move {
                if let Some(latency) = latency {
                    tokio::time::sleep(latency).await;
                }
                work()
            }),
        }
    }
}
