//! Ambient tenant identity, scoped to exactly one execution unit at a time
//! (spec §4.1).
//!
//! Every data access in the engine resolves its `TenantStore` handle through
//! [`TenantContext`] rather than threading it through every call explicitly.
//! Binding lives in a [`tokio::task_local!`] cell: Tokio tasks, unlike OS
//! threads, can migrate between worker threads between `.await` points, so
//! a plain thread-local would silently lose the binding. `task_local!`'s
//! `scope` future restores whatever was bound before it on every exit path
//! — normal return, early `?`, or an unwinding panic — which is the
//! "guaranteed to restore prior binding" half of the contract.
//!
//! [`TenantContext::run`] is the primitive: bind for the duration of a
//! future. [`TenantContext::initialize`] is the same primitive under the
//! name the spec uses for binding "for the current execution scope" at the
//! top of a request/task — in async Rust there is no sound way to bind
//! ambient state for "the rest of the task" without wrapping the
//! remainder in a scope, so `initialize` is `run` under another name,
//! intended for callers that structure their top-level handler as the
//! future passed in.

use std::future::Future;
use std::sync::Arc;

use docflow_core::id::TenantId;
use docflow_core::store::TenantStore;

tokio::task_local! {
    static CURRENT: Bound;
}

#[derive(Clone)]
struct Bound {
    tenant_id: TenantId,
    store: Arc<dyn TenantStore>,
}

#[derive(Debug, thiserror::Error)]
pub enum TenantContextError {
    /// No tenant bound to the current execution scope (spec §4.1
    /// "Failure semantics": fail fast and loudly, never silently
    /// cross-tenant).
    #[error("no tenant context bound to current execution scope")]
    NoTenantContext,
}

pub struct TenantContext;

impl TenantContext {
    /// Bind `store` for the duration of `fut`, restoring the prior binding
    /// (if any) on every exit path. Parallel callers each get their own
    /// binding (spec §4.1 "Concurrency": "per execution unit ... never
    /// global").
    pub async fn run<F, T>(store: Arc<dyn TenantStore>, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let bound = Bound {
            tenant_id: store.tenant_id(),
            store,
        };
        CURRENT.scope(bound, fut).await
    }

    /// Alias for [`Self::run`] — see module docs for why this is not a
    /// separate non-scoped primitive.
    pub async fn initialize<F, T>(store: Arc<dyn TenantStore>, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        Self::run(store, fut).await
    }

    /// The tenant id bound to the current execution scope, or
    /// `NoTenantContext` if none is bound.
    pub fn current_tenant_id() -> Result<TenantId, TenantContextError> {
        CURRENT
            .try_with(|b| b.tenant_id)
            .map_err(|_| TenantContextError::NoTenantContext)
    }

    /// The tenant store handle bound to the current execution scope. This
    /// is the *only* supported way application code obtains a
    /// `TenantStore` handle — there is no global registry lookup exposed
    /// outside this crate, which is what makes cross-tenant access
    /// impossible by construction (spec §5 "Isolation").
    pub fn current() -> Result<Arc<dyn TenantStore>, TenantContextError> {
        CURRENT
            .try_with(|b| b.store.clone())
            .map_err(|_| TenantContextError::NoTenantContext)
    }
}
