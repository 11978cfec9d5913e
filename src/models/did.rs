// src/models/did.rs
//! DID Document data model.
//!
//! The document structure follows the
//! [DID Core Specification](https://www.w3.org/TR/did-core/) subset needed by
//! the sidetree anchoring flow: public key sections, service endpoints, and
//! authentication references. Field order is fixed by declaration order
//! because the DID is derived from the canonical serialization of this
//! structure.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::utils::crypto::{sha256, Digestable};
use crate::utils::serialization::to_canonical_json;

/// JSON-LD context emitted on every DID Document.
pub const DID_CONTEXT: &str = "https://w3id.org/did/v1";

/// Verification key type for secp256k1 keys.
pub const KEY_TYPE_SECP256K1: &str = "Secp256k1VerificationKey2018";

/// Fragment identifier of the genesis identity key.
pub const GENESIS_KEY_ID: &str = "#keys-1";

/// Service endpoint type referencing a public profile credential.
pub const PUBLIC_PROFILE_SERVICE_TYPE: &str = "IonPublicProfile";

/// A public key entry within a DID Document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeySection {
    /// Key identifier, unique within the document. Example: `#keys-1`
    pub id: String,

    /// Verification key type. Example: `Secp256k1VerificationKey2018`
    #[serde(rename = "type")]
    pub key_type: String,

    /// Controller of the key. Empty in the genesis document, since the DID
    /// does not exist until the document is hashed.
    pub controller: String,

    /// Hex-encoded compressed SEC1 public key
    pub public_key_hex: String,
}

/// A service endpoint entry within a DID Document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpointSection {
    /// Endpoint identifier
    pub id: String,

    /// Endpoint type. Example: `IonPublicProfile`
    #[serde(rename = "type")]
    pub endpoint_type: String,

    /// Endpoint locator, e.g. a content-addressed handle
    pub service_endpoint: String,

    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A DID Document representing a decentralized identity.
///
/// # Invariants
/// - At least one public key entry
/// - Each entry id is unique within the document
/// - Canonical serialization is stable, because the DID is derived from the
///   document's content hash
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    /// JSON-LD context
    #[serde(rename = "@context")]
    pub context: String,

    /// The DID owning this document. Absent in the genesis document: the DID
    /// is a function of the document content and cannot appear inside it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Ordered public key sections
    pub public_key: Vec<PublicKeySection>,

    /// Service endpoints
    pub service: Vec<ServiceEndpointSection>,

    /// References to public key ids usable for authentication
    pub authentication: Vec<String>,
}

impl DidDocument {
    /// Builds the deterministic single-key genesis document for a public key.
    ///
    /// # Arguments
    /// * `public_key` - Compressed SEC1 secp256k1 public key (33 bytes)
    ///
    /// # Errors
    /// Returns [`Error::Encoding`] if the key is not a valid secp256k1 point.
    pub fn from_public_key(public_key: &[u8]) -> Result<Self, Error> {
        k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
            .map_err(|e| Error::Encoding(format!("invalid secp256k1 public key: {}", e)))?;

        Ok(DidDocument {
            context: DID_CONTEXT.to_string(),
            id: None,
            public_key: vec![PublicKeySection {
                id: GENESIS_KEY_ID.to_string(),
                key_type: KEY_TYPE_SECP256K1.to_string(),
                controller: String::new(),
                public_key_hex: hex::encode(public_key),
            }],
            service: Vec::new(),
            authentication: vec![GENESIS_KEY_ID.to_string()],
        })
    }

    /// Appends a service endpoint section to the document.
    pub fn add_service_endpoint(&mut self, endpoint: ServiceEndpointSection) {
        self.service.push(endpoint);
    }

    /// Finds the public-profile service endpoint, if one is present.
    pub fn public_profile_endpoint(&self) -> Option<&ServiceEndpointSection> {
        self.service
            .iter()
            .find(|endpoint| endpoint.endpoint_type == PUBLIC_PROFILE_SERVICE_TYPE)
    }

    /// The JWS signing input for this document: `"." + base64url(canonical)`.
    ///
    /// The anchoring operation signature covers exactly this input, so the
    /// operation stays self-verifying against the key listed in its payload.
    pub fn signing_input(&self) -> Result<String, Error> {
        let canonical = to_canonical_json(self)?;
        Ok(format!(
            ".{}",
            crate::utils::crypto::encode_base64url(canonical.as_bytes())
        ))
    }
}

impl Digestable for DidDocument {
    fn digest(&self) -> Result<[u8; 32], Error> {
        Ok(sha256(self.signing_input()?.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    fn test_public_key() -> Vec<u8> {
        SigningKey::from_slice(&[3u8; 32])
            .unwrap()
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn genesis_document_holds_single_key() {
        let public_key = test_public_key();
        let document = DidDocument::from_public_key(&public_key).unwrap();

        assert_eq!(document.public_key.len(), 1);
        assert_eq!(document.public_key[0].id, GENESIS_KEY_ID);
        assert_eq!(document.public_key[0].public_key_hex, hex::encode(&public_key));
        assert_eq!(document.authentication, vec![GENESIS_KEY_ID.to_string()]);
        assert!(document.id.is_none());
    }

    #[test]
    fn genesis_document_is_deterministic() {
        let public_key = test_public_key();
        let first = to_canonical_json(&DidDocument::from_public_key(&public_key).unwrap()).unwrap();
        let second = to_canonical_json(&DidDocument::from_public_key(&public_key).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn from_public_key_rejects_invalid_point() {
        // 33 bytes but not a valid curve point.
        let err = DidDocument::from_public_key(&[0xffu8; 33]).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn document_round_trips_through_json() {
        let document = DidDocument::from_public_key(&test_public_key()).unwrap();
        let json = to_canonical_json(&document).unwrap();
        let back: DidDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, document);
    }

    #[test]
    fn public_profile_endpoint_lookup() {
        let mut document = DidDocument::from_public_key(&test_public_key()).unwrap();
        assert!(document.public_profile_endpoint().is_none());

        document.add_service_endpoint(ServiceEndpointSection {
            id: "#profile".to_string(),
            endpoint_type: PUBLIC_PROFILE_SERVICE_TYPE.to_string(),
            service_endpoint: "handle-123".to_string(),
            description: Some("public profile".to_string()),
        });
        let endpoint = document.public_profile_endpoint().unwrap();
        assert_eq!(endpoint.service_endpoint, "handle-123");
    }
}
