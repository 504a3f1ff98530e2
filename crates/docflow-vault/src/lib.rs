//! Hierarchical, encrypted credential resolution (spec §4.2).

pub mod cipher;
pub mod vault;

pub use cipher::{CipherError, CredentialCipher};
pub use vault::{CredentialVault, ResolveScope, VaultError};
