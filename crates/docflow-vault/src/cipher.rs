//! AES-256-GCM encryption at rest for credential values (spec §4.2).
//!
//! Mirrors `adaptive_pipeline`'s encryption adapter: `aes-gcm` for
//! authenticated encryption, `zeroize` so key material and any decrypted
//! plaintext are wiped from memory on drop rather than lingering in the
//! process's address space.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("encryption failed")]
    EncryptFailed,
    #[error("decryption failed: ciphertext is invalid or was encrypted under a different key")]
    DecryptFailed,
    #[error("ciphertext is shorter than the nonce prefix")]
    Truncated,
    #[error("decrypted value is not valid utf-8")]
    InvalidUtf8,
}

/// The process-wide encryption key (spec §4.2 "Invariant": "Encryption key
/// is process-wide; key rotation is out of scope for the core"). Held in a
/// `Zeroizing` wrapper so it never survives a second longer than it has to.
pub struct CredentialCipher {
    key: Zeroizing<[u8; 32]>,
}

impl CredentialCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    fn aead(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_ref()))
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext`. A fresh random
    /// nonce is drawn per call — AES-GCM is only safe under key reuse if
    /// the nonce never repeats.
    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, CipherError> {
        let cipher = self.aead();
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::EncryptFailed)?;
        let mut out = nonce.to_vec();
        out.append(&mut ciphertext);
        Ok(out)
    }

    /// Decrypt a value produced by [`Self::encrypt`]. The plaintext is
    /// returned as an owned `Zeroizing<String>` so callers can drop it
    /// promptly; `CredentialVault` never logs it (spec §4.2 "Values never
    /// appear in log lines or error messages").
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<String>, CipherError> {
        if ciphertext.len() < NONCE_LEN {
            return Err(CipherError::Truncated);
        }
        let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .aead()
            .decrypt(nonce, body)
            .map_err(|_| CipherError::DecryptFailed)?;
        let plaintext = String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)?;
        Ok(Zeroizing::new(plaintext))
    }
}
