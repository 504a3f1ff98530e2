//! Persistence traits for the two database scopes (spec §3, §5, §6).
//!
//! `CentralStore` fronts the single logical database shared across all
//! tenants (tenant catalog + callback routing). `TenantStore` fronts one
//! tenant's database; a concrete instance is never shared across tenants —
//! `docflow_tenant::TenantContext` is the only supported way to obtain one,
//! which is what makes cross-tenant reads structurally impossible (spec
//! §4.1, §5 "Isolation").
//!
//! The in-memory implementations here back the test suite and the CLI's
//! `--in-memory` mode; a real deployment swaps them for a Postgres-backed
//! implementation behind the same trait without touching any caller.

pub mod central;
pub mod tenant;

pub use central::{CentralStore, CentralStoreError, InMemoryCentralStore};
pub use tenant::{InMemoryTenantStore, TenantStore};
