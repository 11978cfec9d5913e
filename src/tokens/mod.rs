// src/tokens/mod.rs
//! Interaction token protocol: credential share requests and responses.
//!
//! Tokens travel as compact three-segment strings
//! (`base64url(header).base64url(payload).base64url(signature)`), signed with
//! the sender's identity key. Decoding and verification fail closed: a token
//! that cannot be decoded or whose signature does not verify never yields
//! usable claims, and the two failures are distinct error kinds so callers
//! can tell garbage input from a forgery.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::models::credential::SignedCredential;
use crate::utils::crypto::{
    decode_base64url, encode_base64url, generate_random_id, sha256, verify_prehash_signature,
    Digestable,
};
use crate::utils::serialization::to_canonical_json;

/// Signing algorithm named in every token header.
pub const TOKEN_ALG: &str = "ES256K";

/// Token type named in every token header.
pub const TOKEN_TYP: &str = "JWT";

/// Token validity window in milliseconds.
const TOKEN_VALIDITY_MS: i64 = 3_600_000;

/// A single credential requirement in a share request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequirement {
    /// Required credential type list, e.g.
    /// `["Credential", "ProofOfAccessCredential"]`
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,

    /// Additional constraints; opaque to the protocol
    pub constraints: Vec<Value>,
}

impl CredentialRequirement {
    /// A credential satisfies a requirement when every required type appears
    /// in the credential's type list.
    pub fn satisfied_by(&self, credential: &SignedCredential) -> bool {
        self.credential_type
            .iter()
            .all(|required| credential.credential_type.contains(required))
    }
}

/// Payload of a credential share request: the requester declares which
/// credential types it needs and where the response should be sent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    /// Where the responder posts its share response
    #[serde(rename = "callbackURL")]
    pub callback_url: String,

    /// Required credential types and constraints
    pub credential_requirements: Vec<CredentialRequirement>,
}

impl CredentialRequest {
    /// Checks a supplied credential against the request's requirements.
    pub fn satisfied_by(&self, credential: &SignedCredential) -> bool {
        self.credential_requirements
            .iter()
            .any(|requirement| requirement.satisfied_by(credential))
    }
}

/// Payload of a credential share response: the holder supplies matching
/// signed credentials.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialResponse {
    /// Echo of the request's callback URL (may be empty for direct posts)
    #[serde(rename = "callbackURL")]
    pub callback_url: String,

    /// Signed credentials supplied by the holder
    pub supplied_credentials: Vec<SignedCredential>,
}

/// Interaction payload, typed by interaction kind and validated at the
/// decode boundary before any field is trusted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "typ", content = "interactionToken")]
pub enum InteractionPayload {
    /// Credential share request
    #[serde(rename = "credentialRequest")]
    CredentialRequest(CredentialRequest),

    /// Credential share response
    #[serde(rename = "credentialResponse")]
    CredentialResponse(CredentialResponse),
}

/// Token envelope header.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JwtHeader {
    /// Always `JWT`
    pub typ: String,
    /// Always `ES256K`
    pub alg: String,
}

/// Token envelope payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JwtPayload {
    /// Key id of the issuing identity, e.g. `did:ion:...#keys-1`
    pub iss: String,

    /// Issued-at, milliseconds since epoch
    pub iat: i64,

    /// Expiry, milliseconds since epoch
    pub exp: i64,

    /// Random token id
    pub jti: String,

    /// The typed interaction payload
    #[serde(flatten)]
    pub interaction: InteractionPayload,
}

/// A signed, encoded interaction token.
///
/// Lifecycle: created, signed and encoded by the sender; decoded,
/// signature-checked, and payload-typed-extracted by the receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonWebToken {
    /// Envelope header
    pub header: JwtHeader,
    /// Envelope payload
    pub payload: JwtPayload,
    /// base64url of the raw 64-byte signature
    pub signature: String,
}

impl JsonWebToken {
    /// Creates an unsigned token for the given interaction payload.
    ///
    /// # Arguments
    /// * `interaction` - Typed request or response payload
    /// * `issuer_key_id` - Fully qualified signing key id
    pub fn new(interaction: InteractionPayload, issuer_key_id: &str) -> Self {
        let now = Utc::now().timestamp_millis();
        JsonWebToken {
            header: JwtHeader {
                typ: TOKEN_TYP.to_string(),
                alg: TOKEN_ALG.to_string(),
            },
            payload: JwtPayload {
                iss: issuer_key_id.to_string(),
                iat: now,
                exp: now + TOKEN_VALIDITY_MS,
                jti: generate_random_id(8),
                interaction,
            },
            signature: String::new(),
        }
    }

    /// Attaches a raw 64-byte signature produced over [`Digestable::digest`].
    pub fn attach_signature(&mut self, signature: &[u8]) {
        self.signature = encode_base64url(signature);
    }

    /// The signing input: `base64url(header).base64url(payload)`.
    pub fn signing_input(&self) -> Result<String, Error> {
        let header = encode_base64url(to_canonical_json(&self.header)?.as_bytes());
        let payload = encode_base64url(to_canonical_json(&self.payload)?.as_bytes());
        Ok(format!("{}.{}", header, payload))
    }

    /// Encodes the token to its transportable string form.
    pub fn encode(&self) -> Result<String, Error> {
        Ok(format!("{}.{}", self.signing_input()?, self.signature))
    }

    /// Decodes a transportable token string.
    ///
    /// # Errors
    /// Returns [`Error::TokenDecode`] on any structural defect: wrong segment
    /// count, invalid base64url, invalid JSON, unknown interaction kind, or
    /// an unsupported algorithm.
    pub fn decode(token: &str) -> Result<Self, Error> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(Error::TokenDecode(format!(
                "expected 3 token segments, found {}",
                segments.len()
            )));
        }

        let header: JwtHeader = Self::decode_segment(segments[0])?;
        if header.alg != TOKEN_ALG {
            return Err(Error::TokenDecode(format!(
                "unsupported token algorithm: {}",
                header.alg
            )));
        }

        let payload: JwtPayload = Self::decode_segment(segments[1])?;

        // The signature segment must at least be well-formed base64url, even
        // though verification happens separately.
        decode_base64url(segments[2])
            .map_err(|_| Error::TokenDecode("signature segment is not base64url".to_string()))?;

        Ok(JsonWebToken {
            header,
            payload,
            signature: segments[2].to_string(),
        })
    }

    fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, Error> {
        let bytes = decode_base64url(segment)
            .map_err(|_| Error::TokenDecode("token segment is not base64url".to_string()))?;
        let json = String::from_utf8(bytes)
            .map_err(|_| Error::TokenDecode("token segment is not UTF-8".to_string()))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::TokenDecode(format!("token segment is not valid JSON: {}", e)))
    }

    /// Validates the envelope signature against the issuer's public key.
    ///
    /// # Errors
    /// - [`Error::SignatureVerification`] if the token is expired or the
    ///   signature does not match
    /// - [`Error::Encoding`] on malformed key bytes
    pub fn validate_signature(&self, public_key: &[u8]) -> Result<(), Error> {
        if self.payload.exp < Utc::now().timestamp_millis() {
            return Err(Error::SignatureVerification(format!(
                "token {} expired",
                self.payload.jti
            )));
        }

        let signature = decode_base64url(&self.signature)?;
        let digest = self.digest()?;
        if verify_prehash_signature(&digest, public_key, &signature)? {
            Ok(())
        } else {
            Err(Error::SignatureVerification(format!(
                "token {} signature does not verify against issuer key",
                self.payload.jti
            )))
        }
    }

    /// The DID of the token issuer, with any key fragment stripped.
    pub fn issuer_did(&self) -> &str {
        self.payload
            .iss
            .split('#')
            .next()
            .unwrap_or(&self.payload.iss)
    }

    /// Typed extraction of a credential share request payload.
    pub fn as_credential_request(&self) -> Option<&CredentialRequest> {
        match &self.payload.interaction {
            InteractionPayload::CredentialRequest(request) => Some(request),
            InteractionPayload::CredentialResponse(_) => None,
        }
    }

    /// Typed extraction of a credential share response payload.
    pub fn as_credential_response(&self) -> Option<&CredentialResponse> {
        match &self.payload.interaction {
            InteractionPayload::CredentialResponse(response) => Some(response),
            InteractionPayload::CredentialRequest(_) => None,
        }
    }
}

impl Digestable for JsonWebToken {
    fn digest(&self) -> Result<[u8; 32], Error> {
        Ok(sha256(self.signing_input()?.as_bytes()))
    }
}
