// src/sidetree/mod.rs
//! Sidetree ledger gateway protocol types and capability contract.
//!
//! The gateway is a client-facing create/resolve surface only: anchoring
//! batching and consensus stay on the gateway side. The wire unit is a
//! [`SidetreeOperation`], which must be self-verifying: its signature covers
//! `"." + payload` and validates against the key named by `header.kid` inside
//! the decoded payload document.

pub mod connector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::models::did::DidDocument;
use crate::utils::crypto::{decode_base64url, sha256, verify_prehash_signature};
use crate::utils::serialization::from_json;

pub use connector::{HttpSidetreeConnector, SidetreeConfig};

/// Kind of anchoring operation, validated at the decode boundary.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Anchor a new DID Document
    Create,
    /// Replace an anchored DID Document
    Update,
}

/// Header of an anchoring operation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SidetreeOpHeader {
    /// Operation kind
    pub operation: OperationKind,

    /// Signing algorithm; always `ES256K`
    pub alg: String,

    /// Id of the signing key, as listed in the payload document
    pub kid: String,

    /// Opaque proof-of-work field. The client includes it but never computes
    /// it; its semantics belong to the gateway.
    pub proof_of_work: Value,
}

/// The wire unit submitted to the ledger gateway.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SidetreeOperation {
    /// Operation header
    pub header: SidetreeOpHeader,

    /// base64url of the canonical DID Document JSON
    pub payload: String,

    /// base64url of the raw 64-byte ECDSA signature over `"." + payload`
    pub signature: String,
}

impl SidetreeOperation {
    /// Decodes the payload back into a DID Document.
    ///
    /// # Errors
    /// Returns [`Error::Encoding`] if the payload is not base64url-wrapped
    /// canonical JSON.
    pub fn decode_payload(&self) -> Result<DidDocument, Error> {
        let bytes = decode_base64url(&self.payload)?;
        let json = String::from_utf8(bytes)
            .map_err(|e| Error::Encoding(format!("payload is not valid UTF-8: {}", e)))?;
        from_json(&json)
    }

    /// Checks that the operation is self-verifying: the signature over
    /// `"." + payload` validates against the key named by `header.kid` in the
    /// decoded payload document.
    ///
    /// # Errors
    /// - [`Error::RejectedOperation`] if `kid` names no key in the payload
    /// - [`Error::SignatureVerification`] if the signature does not verify
    /// - [`Error::Encoding`] on malformed payload, key, or signature bytes
    pub fn verify(&self) -> Result<(), Error> {
        let document = self.decode_payload()?;
        let key_section = document
            .public_key
            .iter()
            .find(|section| section.id == self.header.kid)
            .ok_or_else(|| {
                Error::RejectedOperation(format!(
                    "kid {} names no key in the operation payload",
                    self.header.kid
                ))
            })?;

        let public_key = hex::decode(&key_section.public_key_hex)
            .map_err(|e| Error::Encoding(format!("invalid public key hex: {}", e)))?;
        let signature = decode_base64url(&self.signature)?;
        let digest = sha256(format!(".{}", self.payload).as_bytes());

        if verify_prehash_signature(&digest, &public_key, &signature)? {
            Ok(())
        } else {
            Err(Error::SignatureVerification(
                "operation signature does not verify against the kid key".to_string(),
            ))
        }
    }
}

/// Capability contract for anchoring and resolving DID Documents against a
/// remote ledger gateway.
///
/// The connector is a pure protocol client: no retry or backoff logic lives
/// here. Application-level absence and transport failure are distinct error
/// kinds.
#[async_trait]
pub trait SidetreeConnector: Send + Sync {
    /// Resolves a DID to its anchored document.
    ///
    /// # Errors
    /// - [`Error::DidNotFound`] when the gateway holds no record
    /// - [`Error::Network`] on transport failure
    async fn resolve_did(&self, did: &str) -> Result<DidDocument, Error>;

    /// Submits an anchoring operation and returns the gateway's confirmed
    /// document.
    ///
    /// # Errors
    /// - [`Error::RejectedOperation`] when the gateway refuses the operation
    /// - [`Error::Network`] on transport failure
    async fn create_did_record(&self, operation: &SidetreeOperation) -> Result<DidDocument, Error>;
}
