//! Storage adapters: document original bytes and execution artifacts
//! (spec §4.8).

pub mod artifact;
pub mod blob;

pub use artifact::{ArtifactStore, ArtifactStoreError};
pub use blob::{BlobStore, BlobStoreError, InMemoryBlobStore, LocalBlobStore};
