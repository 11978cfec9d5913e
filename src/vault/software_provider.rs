// src/vault/software_provider.rs
//! Software vault implementation backed by an AES-GCM-sealed seed.
//!
//! The seed is sealed at construction time under a key stretched from the
//! encryption password with PBKDF2-HMAC-SHA256. Every vault operation
//! re-derives the sealing key from the supplied password, so a wrong password
//! surfaces as [`Error::VaultAccess`] without ever exposing seed material.

use std::num::NonZeroU32;

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::{hmac, pbkdf2};

use crate::error::Error;
use crate::vault::{KeyDerivationArgs, VaultedKeyProvider};

/// PBKDF2 iteration count for seed-key stretching.
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Software key provider holding a password-encrypted seed.
pub struct SoftwareKeyProvider {
    /// PBKDF2 salt, random per vault
    salt: [u8; 16],
    /// AES-GCM nonce used for the one-time seal of the seed
    nonce: [u8; 12],
    /// Seed ciphertext with appended GCM tag
    sealed_seed: Vec<u8>,
}

impl SoftwareKeyProvider {
    /// Seals `seed` under `encryption_pass` and returns the vault.
    ///
    /// # Arguments
    /// * `seed` - Master seed bytes (32 bytes recommended)
    /// * `encryption_pass` - Password protecting the seed
    ///
    /// # Errors
    /// Returns [`Error::Encoding`] if sealing fails.
    pub fn new(seed: &[u8], encryption_pass: &str) -> Result<Self, Error> {
        let mut salt = [0u8; 16];
        let mut nonce = [0u8; 12];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let key = Self::stretch_password(encryption_pass, &salt);
        let sealing_key = LessSafeKey::new(
            UnboundKey::new(&AES_256_GCM, &key)
                .map_err(|_| Error::Encoding("failed to initialize seed cipher".to_string()))?,
        );

        let mut sealed_seed = seed.to_vec();
        sealing_key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::empty(),
                &mut sealed_seed,
            )
            .map_err(|_| Error::Encoding("failed to seal vault seed".to_string()))?;

        Ok(SoftwareKeyProvider {
            salt,
            nonce,
            sealed_seed,
        })
    }

    /// Stretches the password into an AES-256 key.
    fn stretch_password(encryption_pass: &str, salt: &[u8]) -> [u8; 32] {
        let mut key = [0u8; 32];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            NonZeroU32::new(PBKDF2_ITERATIONS).unwrap(),
            salt,
            encryption_pass.as_bytes(),
            &mut key,
        );
        key
    }

    /// Decrypts the sealed seed with the supplied password.
    ///
    /// # Errors
    /// Returns [`Error::VaultAccess`] when the password does not decrypt the
    /// seed.
    fn unseal(&self, encryption_pass: &str) -> Result<Vec<u8>, Error> {
        let key = Self::stretch_password(encryption_pass, &self.salt);
        let opening_key = LessSafeKey::new(
            UnboundKey::new(&AES_256_GCM, &key)
                .map_err(|_| Error::Encoding("failed to initialize seed cipher".to_string()))?,
        );

        let mut buffer = self.sealed_seed.clone();
        let seed = opening_key
            .open_in_place(
                Nonce::assume_unique_for_key(self.nonce),
                Aad::empty(),
                &mut buffer,
            )
            .map_err(|_| {
                Error::VaultAccess("encryption password does not decrypt the seed".to_string())
            })?;
        Ok(seed.to_vec())
    }

    /// Deterministically maps (seed, derivation path) to a secp256k1 signing
    /// key: HMAC-SHA256(seed, path), re-hashed until the candidate is a valid
    /// scalar.
    fn derive_signing_key(seed: &[u8], derivation_path: &str) -> SigningKey {
        let hmac_key = hmac::Key::new(hmac::HMAC_SHA256, seed);
        let mut candidate: Vec<u8> = hmac::sign(&hmac_key, derivation_path.as_bytes())
            .as_ref()
            .to_vec();
        loop {
            match SigningKey::from_slice(&candidate) {
                Ok(signing_key) => return signing_key,
                Err(_) => candidate = crate::utils::crypto::sha256(&candidate).to_vec(),
            }
        }
    }

    /// Unseals the seed and derives the signing key for `args`.
    fn signing_key(&self, args: &KeyDerivationArgs) -> Result<SigningKey, Error> {
        let seed = self.unseal(&args.encryption_pass)?;
        Ok(Self::derive_signing_key(&seed, &args.derivation_path))
    }
}

impl VaultedKeyProvider for SoftwareKeyProvider {
    fn get_public_key(&self, args: &KeyDerivationArgs) -> Result<Vec<u8>, Error> {
        let signing_key = self.signing_key(args)?;
        Ok(signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec())
    }

    fn get_private_key(&self, args: &KeyDerivationArgs) -> Result<Vec<u8>, Error> {
        let signing_key = self.signing_key(args)?;
        Ok(signing_key.to_bytes().to_vec())
    }

    fn sign(&self, args: &KeyDerivationArgs, digest: &[u8; 32]) -> Result<Vec<u8>, Error> {
        let signing_key = self.signing_key(args)?;
        let signature: Signature = signing_key
            .sign_prehash(digest)
            .map_err(|e| Error::Encoding(format!("signing failed: {}", e)))?;
        Ok(signature.to_vec())
    }
}
