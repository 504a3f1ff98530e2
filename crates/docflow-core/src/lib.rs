//! Domain types for the multi-tenant document pipeline execution engine:
//! sortable ids, entities, state machines, and the shared error taxonomy.
//!
//! This crate has no I/O of its own — every other crate in the workspace
//! (`docflow-tenant`, `docflow-vault`, `docflow-registry`, `docflow-storage`,
//! `docflow-workflow`, `docflow-callback`) builds on these types.

pub mod error;
pub mod id;
pub mod model;
pub mod state;
pub mod store;

pub use error::{ErrorLogEntry, PipelineError};
