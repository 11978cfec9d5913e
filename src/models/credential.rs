// src/models/credential.rs
//! Signed (verifiable) credential data model.
//!
//! A credential is a claim set signed by its issuer's identity key, carried
//! as a linked-data signature block. The `proof` must verify against the
//! issuer's resolved public key before any claim is trusted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::identity::Identity;
use crate::utils::crypto::{generate_random_id, sha256, verify_prehash_signature, Digestable};
use crate::utils::serialization::to_canonical_json;

/// JSON-LD context emitted on every credential.
pub const CREDENTIAL_CONTEXT: &str = "https://w3id.org/credentials/v1";

/// Signature suite used for all credential proofs.
pub const PROOF_TYPE_ECDSA_KOBLITZ: &str = "EcdsaKoblitzSignature2016";

/// Base credential type present on every issued credential.
pub const BASE_CREDENTIAL_TYPE: &str = "Credential";

/// Linked-data signature block attached to a credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedDataProof {
    /// Signature suite. Example: `EcdsaKoblitzSignature2016`
    #[serde(rename = "type")]
    pub proof_type: String,

    /// Creation timestamp of the proof
    pub created: DateTime<Utc>,

    /// Key id of the signing key. Example: `did:ion:...#keys-1`
    pub creator: String,

    /// Random nonce binding this proof instance
    pub nonce: String,

    /// Hex-encoded raw 64-byte ECDSA signature
    pub signature_value: String,
}

/// Parameters for issuing a new credential.
#[derive(Debug, Clone)]
pub struct CredentialParams {
    /// Full type list, e.g. `["Credential", "ProofOfAccessCredential"]`
    pub credential_type: Vec<String>,
    /// Human-readable credential name
    pub name: String,
    /// Claim key/value pairs (the subject id is added automatically)
    pub claim: Map<String, Value>,
    /// DID of the credential subject
    pub subject: String,
    /// Optional expiry
    pub expires: Option<DateTime<Utc>>,
}

/// A signed verifiable credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignedCredential {
    /// JSON-LD context
    #[serde(rename = "@context")]
    pub context: String,

    /// Unique credential identifier
    pub id: String,

    /// Full type list of the credential
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,

    /// Human-readable credential name
    pub name: String,

    /// DID of the issuing identity
    pub issuer: String,

    /// Issuance timestamp
    pub issuance_date: DateTime<Utc>,

    /// Optional expiry timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,

    /// Claim section; `claim["id"]` names the subject DID
    pub claim: Map<String, Value>,

    /// Linked-data signature block
    pub proof: LinkedDataProof,
}

impl SignedCredential {
    /// Builds an unsigned credential skeleton for the given issuer.
    ///
    /// The proof block carries an empty `signatureValue` until
    /// [`attach_signature`](Self::attach_signature) is called; the digest is
    /// computed over exactly this blanked form.
    pub fn new_unsigned(params: CredentialParams, issuer_did: &str, key_id: &str) -> Self {
        let mut claim = params.claim;
        claim.insert("id".to_string(), Value::String(params.subject));

        SignedCredential {
            context: CREDENTIAL_CONTEXT.to_string(),
            id: format!("claimId:{}", generate_random_id(8)),
            credential_type: params.credential_type,
            name: params.name,
            issuer: issuer_did.to_string(),
            issuance_date: Utc::now(),
            expiration_date: params.expires,
            claim,
            proof: LinkedDataProof {
                proof_type: PROOF_TYPE_ECDSA_KOBLITZ.to_string(),
                created: Utc::now(),
                creator: key_id.to_string(),
                nonce: generate_random_id(8),
                signature_value: String::new(),
            },
        }
    }

    /// Attaches a raw 64-byte signature produced over [`Digestable::digest`].
    pub fn attach_signature(&mut self, signature: &[u8]) {
        self.proof.signature_value = hex::encode(signature);
    }

    /// DID of the credential subject, taken from the claim section.
    pub fn subject(&self) -> Option<&str> {
        self.claim.get("id").and_then(Value::as_str)
    }

    /// Verifies the credential proof against an explicit public key.
    ///
    /// # Errors
    /// - [`Error::SignatureVerification`] if the credential is expired or the
    ///   signature does not match
    /// - [`Error::Encoding`] if key or signature bytes are malformed
    pub fn verify_with_key(&self, public_key: &[u8]) -> Result<(), Error> {
        if let Some(expiry) = self.expiration_date {
            if expiry < Utc::now() {
                return Err(Error::SignatureVerification(format!(
                    "credential {} expired at {}",
                    self.id, expiry
                )));
            }
        }

        let signature = hex::decode(&self.proof.signature_value)
            .map_err(|e| Error::Encoding(format!("invalid proof signature hex: {}", e)))?;
        let digest = self.digest()?;

        if verify_prehash_signature(&digest, public_key, &signature)? {
            Ok(())
        } else {
            Err(Error::SignatureVerification(format!(
                "credential {} proof does not verify against issuer key",
                self.id
            )))
        }
    }

    /// Verifies the credential proof against the resolved issuer identity.
    ///
    /// # Errors
    /// Same as [`verify_with_key`](Self::verify_with_key), plus
    /// [`Error::SignatureVerification`] if the resolved identity does not
    /// match the declared `issuer`.
    pub fn verify(&self, issuer: &Identity) -> Result<(), Error> {
        if issuer.did() != self.issuer {
            return Err(Error::SignatureVerification(format!(
                "credential {} issuer {} does not match resolved identity {}",
                self.id,
                self.issuer,
                issuer.did()
            )));
        }

        let key_section = issuer.public_key_section();
        let public_key = hex::decode(&key_section.public_key_hex)
            .map_err(|e| Error::Encoding(format!("invalid issuer public key hex: {}", e)))?;
        self.verify_with_key(&public_key)
    }
}

impl Digestable for SignedCredential {
    /// Canonical digest: the credential with `signatureValue` blanked,
    /// canonically serialized and hashed.
    fn digest(&self) -> Result<[u8; 32], Error> {
        let mut unsigned = self.clone();
        unsigned.proof.signature_value = String::new();
        let canonical = to_canonical_json(&unsigned)?;
        Ok(sha256(canonical.as_bytes()))
    }
}
