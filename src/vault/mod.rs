// src/vault/mod.rs
//! Vaulted key derivation and signing capability.
//!
//! The vault owns an encrypted seed and performs all key derivation and
//! signing. Derivation is a pure function of (seed, derivation path,
//! encryption password), so the same inputs always yield the same key pair.
//! Private key bytes never leave the vault except as the transient result of
//! an explicit [`VaultedKeyProvider::get_private_key`] call.

pub mod software_provider;

use async_trait::async_trait;

use crate::error::Error;
use crate::utils::crypto::Digestable;

pub use software_provider::SoftwareKeyProvider;

/// Derivation path reserved for the device identity key.
pub const IDENTITY_KEY_PATH: &str = "m/73'/0'/0'/0";

/// Derivation path reserved for the anchoring / commit key. Must never equal
/// [`IDENTITY_KEY_PATH`]: a single compromised path must not control both
/// identity and anchoring.
pub const ANCHOR_KEY_PATH: &str = "m/44'/60'/0'/0/0";

/// Arguments unlocking a single vault operation. Never persisted; held only
/// transiently for the duration of the call.
#[derive(Debug, Clone)]
pub struct KeyDerivationArgs {
    /// Hierarchical derivation path, e.g. `m/73'/0'/0'/0`
    pub derivation_path: String,
    /// Password decrypting the vault seed
    pub encryption_pass: String,
}

impl KeyDerivationArgs {
    /// Convenience constructor.
    pub fn new(derivation_path: &str, encryption_pass: &str) -> Self {
        KeyDerivationArgs {
            derivation_path: derivation_path.to_string(),
            encryption_pass: encryption_pass.to_string(),
        }
    }
}

/// Capability contract for HD-style key derivation and ES256K signing.
///
/// Derivation and signing are CPU-bound and safe to issue concurrently; the
/// async variants exist so callers on a cooperative scheduler can treat them
/// as suspension points.
#[async_trait]
pub trait VaultedKeyProvider: Send + Sync {
    /// Derives the compressed SEC1 public key for the given path.
    ///
    /// # Errors
    /// [`Error::VaultAccess`] if the password does not decrypt the seed.
    fn get_public_key(&self, args: &KeyDerivationArgs) -> Result<Vec<u8>, Error>;

    /// Derives the raw private key for the given path.
    ///
    /// The returned bytes must not be retained beyond the immediate use.
    ///
    /// # Errors
    /// [`Error::VaultAccess`] if the password does not decrypt the seed.
    fn get_private_key(&self, args: &KeyDerivationArgs) -> Result<Vec<u8>, Error>;

    /// Signs a precomputed 32-byte digest with the derived key, returning the
    /// raw 64-byte ECDSA signature (R || S).
    ///
    /// # Errors
    /// [`Error::VaultAccess`] on a bad password, [`Error::Encoding`] if
    /// signing fails.
    fn sign(&self, args: &KeyDerivationArgs, digest: &[u8; 32]) -> Result<Vec<u8>, Error>;

    /// Async variant of [`get_public_key`](Self::get_public_key).
    async fn get_public_key_async(&self, args: &KeyDerivationArgs) -> Result<Vec<u8>, Error> {
        self.get_public_key(args)
    }

    /// Async variant of [`get_private_key`](Self::get_private_key).
    async fn get_private_key_async(&self, args: &KeyDerivationArgs) -> Result<Vec<u8>, Error> {
        self.get_private_key(args)
    }

    /// Async variant of [`sign`](Self::sign).
    async fn sign_async(&self, args: &KeyDerivationArgs, digest: &[u8; 32]) -> Result<Vec<u8>, Error> {
        self.sign(args, digest)
    }

    /// Hashes the canonical representation of `signable` and signs the
    /// resulting digest.
    fn sign_digestable(
        &self,
        args: &KeyDerivationArgs,
        signable: &dyn Digestable,
    ) -> Result<Vec<u8>, Error> {
        let digest = signable.digest()?;
        self.sign(args, &digest)
    }
}
