//! Mock handlers and rollback hooks for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::ExecutionContext;
use crate::core::Outcome;
use crate::operations::{Handler, RollbackHook};

/// A handler that records calls and returns a configurable outcome.
///
/// Published keys are written into the context on every successful call.
#[derive(Debug)]
pub struct RecordingHandler {
    name: String,
    outcome: Mutex<Outcome>,
    publishes: Vec<(String, serde_json::Value)>,
    calls: AtomicUsize,
    contexts: Mutex<Vec<ExecutionContext>>,
}

impl RecordingHandler {
    /// Creates a handler that succeeds with `{"step": name}`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            outcome: Mutex::new(Outcome::ok_value("step", serde_json::json!(name))),
            name,
            publishes: Vec::new(),
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Publishes `key` into the context on each call.
    #[must_use]
    pub fn publishing(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.publishes.push((key.into(), value));
        self
    }

    /// Sets the outcome to return.
    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock() = outcome;
    }

    /// Returns the number of times the handler was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the context each call observed, before publishing.
    #[must_use]
    pub fn recorded_contexts(&self) -> Vec<ExecutionContext> {
        self.contexts.lock().clone()
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Handler for RecordingHandler {
    async fn handle(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Outcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().push(ctx.clone());

        let outcome = self.outcome.lock().clone();
        if outcome.is_success() {
            for (key, value) in &self.publishes {
                ctx.insert(key.clone(), value.clone());
            }
        }
        Ok(outcome)
    }
}

/// A handler that returns an ordinary failed outcome.
#[derive(Debug)]
pub struct FailingHandler {
    name: String,
    error: String,
    calls: AtomicUsize,
}

impl FailingHandler {
    /// Creates a new failing handler.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of times the handler was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler for FailingHandler {
    async fn handle(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<Outcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Outcome::fail(&self.error))
    }
}

/// A handler that returns `Err`.
#[derive(Debug)]
pub struct FaultingHandler {
    name: String,
    message: String,
}

impl FaultingHandler {
    /// Creates a new faulting handler.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Handler for FaultingHandler {
    async fn handle(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<Outcome> {
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// A handler that panics.
#[derive(Debug)]
pub struct PanickingHandler {
    name: String,
    message: String,
}

impl PanickingHandler {
    /// Creates a new panicking handler.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Handler for PanickingHandler {
    async fn handle(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<Outcome> {
        panic!("{}", self.message);
    }
}

/// A handler that sleeps before succeeding.
#[derive(Debug)]
pub struct SlowHandler {
    name: String,
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowHandler {
    /// Creates a new slow handler.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a slow handler with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self::new(name, Duration::from_millis(ms))
    }

    /// Returns the number of times the handler was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler for SlowHandler {
    async fn handle(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<Outcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Outcome::ok_value("step", serde_json::json!(self.name)))
    }
}

/// Shared, ordered log of rollback invocations.
pub type RollbackLog = Arc<Mutex<Vec<String>>>;

/// A rollback hook that appends its name to a shared log.
#[derive(Debug)]
pub struct RecordingRollback {
    name: String,
    log: RollbackLog,
    error: Option<String>,
}

impl RecordingRollback {
    /// Creates a hook that records and succeeds.
    #[must_use]
    pub fn new(name: impl Into<String>, log: RollbackLog) -> Self {
        Self {
            name: name.into(),
            log,
            error: None,
        }
    }

    /// Creates a hook that records and then fails with `error`.
    #[must_use]
    pub fn failing(name: impl Into<String>, log: RollbackLog, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
impl RollbackHook for RecordingRollback {
    async fn rollback(&self, _ctx: &ExecutionContext, _outcome: &Outcome) -> anyhow::Result<()> {
        self.log.lock().push(self.name.clone());
        match &self.error {
            Some(error) => Err(anyhow::anyhow!("{error}")),
            None => Ok(()),
        }
    }
}
