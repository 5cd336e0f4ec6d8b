//! Handler and rollback hook contracts.

use crate::context::ExecutionContext;
use crate::core::Outcome;
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;

/// Trait every registered operation implements.
///
/// A handler returns `Ok(outcome)` for both successful and ordinary failed
/// runs. `Err` values and panics are faults; the registry converts them into
/// failed outcomes, so they never cross the engine boundary.
///
/// Handlers of cacheable operations must be idempotent for identical
/// parameters. The engine trusts that declaration and does not verify it.
#[async_trait]
pub trait Handler: Send + Sync + Debug {
    /// Runs the operation against the execution context.
    ///
    /// The handler may read any key and publish new ones.
    async fn handle(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Outcome>;
}

/// Compensating action run when a later critical step fails.
#[async_trait]
pub trait RollbackHook: Send + Sync + Debug {
    /// Undoes the effects of a step that completed with `outcome`.
    async fn rollback(&self, ctx: &ExecutionContext, outcome: &Outcome) -> anyhow::Result<()>;
}

/// A simple function-based handler.
pub struct FnHandler<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<Outcome> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<Outcome> + Send + Sync,
{
    /// Creates a new function-based handler.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnHandler<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<Outcome> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<Outcome> + Send + Sync,
{
    async fn handle(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Outcome> {
        (self.func)(ctx)
    }
}

/// An async function-based handler.
///
/// The closure receives a clone of the context, so it can read inputs and
/// await collaborators but cannot publish keys. Implement `Handler` directly
/// for operations that publish.
pub struct AsyncFnHandler<F, Fut>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    name: String,
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnHandler<F, Fut>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    /// Creates a new async function-based handler.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnHandler<F, Fut>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnHandler")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> Handler for AsyncFnHandler<F, Fut>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    async fn handle(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Outcome> {
        (self.func)(ctx.clone()).await
    }
}

/// A function-based rollback hook.
pub struct FnRollback<F>
where
    F: Fn(&ExecutionContext, &Outcome) -> anyhow::Result<()> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnRollback<F>
where
    F: Fn(&ExecutionContext, &Outcome) -> anyhow::Result<()> + Send + Sync,
{
    /// Creates a new function-based rollback hook.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnRollback<F>
where
    F: Fn(&ExecutionContext, &Outcome) -> anyhow::Result<()> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnRollback").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> RollbackHook for FnRollback<F>
where
    F: Fn(&ExecutionContext, &Outcome) -> anyhow::Result<()> + Send + Sync,
{
    async fn rollback(&self, ctx: &ExecutionContext, outcome: &Outcome) -> anyhow::Result<()> {
        (self.func)(ctx, outcome)
    }
}
