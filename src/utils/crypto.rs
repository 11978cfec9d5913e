// src/utils/crypto.rs
//! Cryptographic utilities for DID derivation and signature verification.
//!
//! All hashing uses SHA-256 and all signatures are ECDSA over secp256k1
//! (ES256K). The DID suffix is a multihash of the canonically serialized
//! genesis DID Document, so every helper here must be bit-for-bit
//! deterministic.

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::models::did::DidDocument;

/// Method prefix for all DIDs produced by this crate.
pub const DID_PREFIX: &str = "did:ion:";

/// Multihash function code for sha2-256. Fixed so all implementations agree
/// bit-for-bit on derived DIDs.
const MULTIHASH_SHA2_256_CODE: u8 = 0x12;

/// Digest length byte for a sha2-256 multihash.
const MULTIHASH_SHA2_256_SIZE: u8 = 0x20;

/// Anything that can produce a stable 32-byte digest of its canonical form,
/// suitable as an ECDSA signing input.
pub trait Digestable {
    /// Computes the canonical digest of the value.
    fn digest(&self) -> Result<[u8; 32], Error>;
}

/// Computes the SHA-256 hash of the provided input.
///
/// # Arguments
/// * `data` - Data to be hashed
///
/// # Returns
/// Fixed-size 32-byte array containing the digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Encodes binary data as base64url without padding.
///
/// This is the data encoding scheme used for every encoded binary field on
/// the wire: DID suffixes, sidetree operation payloads, and token segments.
pub fn encode_base64url(data: &[u8]) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}

/// Decodes base64url data (no padding).
///
/// # Errors
/// Returns [`Error::Encoding`] if the input is not valid base64url.
pub fn decode_base64url(data: &str) -> Result<Vec<u8>, Error> {
    base64::decode_config(data, base64::URL_SAFE_NO_PAD)
        .map_err(|e| Error::Encoding(format!("invalid base64url data: {}", e)))
}

/// Wraps a SHA-256 digest in a multihash envelope (function code + length).
fn multihash_sha256(digest: &[u8; 32]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(2 + digest.len());
    encoded.push(MULTIHASH_SHA2_256_CODE);
    encoded.push(MULTIHASH_SHA2_256_SIZE);
    encoded.extend_from_slice(digest);
    encoded
}

/// Derives the DID bound to a DID Document's content.
///
/// The suffix is `base64url(multihash(sha256(base64url(canonical JSON))))`,
/// so two documents with identical canonical content always yield the same
/// DID.
///
/// # Errors
/// Returns [`Error::Encoding`] if the document cannot be serialized.
pub fn document_to_did(did_document: &DidDocument) -> Result<String, Error> {
    let canonical = crate::utils::serialization::to_canonical_json(did_document)?;
    let encoded = encode_base64url(canonical.as_bytes());
    let digest = sha256(encoded.as_bytes());
    let suffix = encode_base64url(&multihash_sha256(&digest));
    Ok(format!("{}{}", DID_PREFIX, suffix))
}

/// Converts a public key to the corresponding DID.
///
/// Builds the deterministic single-key genesis DID Document for the key and
/// derives the DID from its content via [`document_to_did`].
///
/// # Arguments
/// * `public_key` - Compressed SEC1 secp256k1 public key (33 bytes)
///
/// # Errors
/// Returns [`Error::Encoding`] if the public key is malformed.
pub fn public_key_to_did(public_key: &[u8]) -> Result<String, Error> {
    let did_document = DidDocument::from_public_key(public_key)?;
    document_to_did(&did_document)
}

/// Verifies an ES256K signature over a precomputed 32-byte digest.
///
/// # Arguments
/// * `digest` - The 32-byte message digest the signature covers
/// * `public_key` - Compressed or uncompressed SEC1 secp256k1 public key
/// * `signature` - Raw 64-byte signature (R || S)
///
/// # Returns
/// - `Ok(true)` when the signature is cryptographically valid
/// - `Ok(false)` when it is well-formed but does not verify
///
/// # Errors
/// Returns [`Error::Encoding`] if the key or signature bytes are malformed.
pub fn verify_prehash_signature(
    digest: &[u8; 32],
    public_key: &[u8],
    signature: &[u8],
) -> Result<bool, Error> {
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| Error::Encoding(format!("invalid secp256k1 public key: {}", e)))?;
    let signature = Signature::from_slice(signature)
        .map_err(|e| Error::Encoding(format!("invalid ECDSA signature encoding: {}", e)))?;
    Ok(verifying_key.verify_prehash(digest, &signature).is_ok())
}

/// Generates a random hex identifier of `n_bytes` bytes.
///
/// Used for token ids and proof nonces.
pub fn generate_random_id(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::SigningKey;

    fn test_public_key() -> Vec<u8> {
        let signing_key = SigningKey::from_slice(&[7u8; 32]).unwrap();
        signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn sha256_matches_known_vector() {
        // sha256("hello")
        let digest = sha256(b"hello");
        assert_eq!(
            hex::encode(digest),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn did_derivation_is_deterministic() {
        let public_key = test_public_key();
        let first = public_key_to_did(&public_key).unwrap();
        let second = public_key_to_did(&public_key).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with(DID_PREFIX));
    }

    #[test]
    fn did_derivation_rejects_malformed_key() {
        let err = public_key_to_did(&[0u8; 5]).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn multihash_envelope_uses_fixed_code() {
        let encoded = multihash_sha256(&sha256(b"content"));
        assert_eq!(encoded[0], 0x12);
        assert_eq!(encoded[1], 0x20);
        assert_eq!(encoded.len(), 34);
    }

    #[test]
    fn base64url_round_trip_has_no_padding() {
        let encoded = encode_base64url(b"a");
        assert!(!encoded.contains('='));
        assert_eq!(decode_base64url(&encoded).unwrap(), b"a");
    }

    #[test]
    fn decode_base64url_rejects_garbage() {
        assert!(decode_base64url("not base64url!!!").is_err());
    }

    #[test]
    fn prehash_verification_detects_tampered_digest() {
        let signing_key = SigningKey::from_slice(&[9u8; 32]).unwrap();
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();

        let mut artifact = b"firmware image".to_vec();
        let digest = sha256(&artifact);
        let signature: Signature = signing_key.sign_prehash(&digest).unwrap();
        let signature = signature.to_vec();

        assert!(verify_prehash_signature(&digest, &public_key, &signature).unwrap());

        // Flip a single byte of the artifact and the check must fail.
        artifact[0] ^= 0x01;
        let tampered = sha256(&artifact);
        assert!(!verify_prehash_signature(&tampered, &public_key, &signature).unwrap());
    }
}
