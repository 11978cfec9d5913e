// src/identity/mod.rs
//! Resolved identities and the session-scoped identity wallet.
//!
//! An [`Identity`] wraps a resolved or locally-constructed DID Document plus
//! an optional public profile credential; it is immutable once constructed.
//! An [`IdentityWallet`] binds an identity to a vault and key metadata for
//! the caller's session and is the entry point for signing interaction
//! tokens and credentials.

use std::sync::Arc;

use crate::error::Error;
use crate::models::credential::{CredentialParams, SignedCredential};
use crate::models::did::{DidDocument, PublicKeySection};
use crate::tokens::{CredentialRequest, CredentialResponse, InteractionPayload, JsonWebToken};
use crate::utils::crypto::{document_to_did, Digestable};
use crate::vault::{KeyDerivationArgs, VaultedKeyProvider};

/// A decentralized identity: DID, document, and optional public profile.
#[derive(Debug, Clone)]
pub struct Identity {
    did: String,
    did_document: DidDocument,
    public_profile: Option<SignedCredential>,
}

impl Identity {
    /// Composes an identity from a DID Document.
    ///
    /// When the document carries no `id` (genesis form), the DID is computed
    /// from the document content, which is exactly the round-trip binding the
    /// anchoring protocol guarantees.
    ///
    /// # Errors
    /// Returns [`Error::Encoding`] if the document has no public key entry.
    pub fn from_did_document(
        did_document: DidDocument,
        public_profile: Option<SignedCredential>,
    ) -> Result<Self, Error> {
        if did_document.public_key.is_empty() {
            return Err(Error::Encoding(
                "DID Document carries no public key entry".to_string(),
            ));
        }

        let did = match &did_document.id {
            Some(id) => id.clone(),
            None => document_to_did(&did_document)?,
        };

        Ok(Identity {
            did,
            did_document,
            public_profile,
        })
    }

    /// The DID naming this identity.
    pub fn did(&self) -> &str {
        &self.did
    }

    /// The underlying DID Document.
    pub fn did_document(&self) -> &DidDocument {
        &self.did_document
    }

    /// The optional public profile credential.
    pub fn public_profile(&self) -> Option<&SignedCredential> {
        self.public_profile.as_ref()
    }

    /// The primary public key section of the document.
    pub fn public_key_section(&self) -> &PublicKeySection {
        &self.did_document.public_key[0]
    }

    /// Hex-decoded primary public key bytes.
    ///
    /// # Errors
    /// Returns [`Error::Encoding`] on malformed key hex.
    pub fn public_key(&self) -> Result<Vec<u8>, Error> {
        hex::decode(&self.public_key_section().public_key_hex)
            .map_err(|e| Error::Encoding(format!("invalid public key hex: {}", e)))
    }
}

/// Metadata locating the wallet's signing key inside the vault.
#[derive(Debug, Clone)]
pub struct KeyMetadata {
    /// Derivation path of the identity key
    pub derivation_path: String,
    /// Fully qualified key id, e.g. `did:ion:...#keys-1`
    pub key_id: String,
}

/// Session-scoped association of a vault, an identity, and key metadata.
pub struct IdentityWallet {
    vault: Arc<dyn VaultedKeyProvider>,
    identity: Identity,
    key_metadata: KeyMetadata,
}

impl std::fmt::Debug for IdentityWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityWallet")
            .field("identity", &self.identity)
            .field("key_metadata", &self.key_metadata)
            .finish_non_exhaustive()
    }
}

impl IdentityWallet {
    /// Binds a vault and key metadata to an identity.
    pub fn new(
        vault: Arc<dyn VaultedKeyProvider>,
        identity: Identity,
        key_metadata: KeyMetadata,
    ) -> Self {
        IdentityWallet {
            vault,
            identity,
            key_metadata,
        }
    }

    /// The wallet's DID.
    pub fn did(&self) -> &str {
        self.identity.did()
    }

    /// The wallet's identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The wallet's DID Document.
    pub fn did_document(&self) -> &DidDocument {
        self.identity.did_document()
    }

    /// Key metadata for the wallet's identity key.
    pub fn key_metadata(&self) -> &KeyMetadata {
        &self.key_metadata
    }

    /// Shared handle to the underlying vault.
    pub fn vault(&self) -> Arc<dyn VaultedKeyProvider> {
        Arc::clone(&self.vault)
    }

    /// Signs a digestable value with the wallet's identity key.
    ///
    /// # Errors
    /// [`Error::VaultAccess`] on a bad password.
    pub fn sign_digestable(
        &self,
        encryption_pass: &str,
        signable: &dyn Digestable,
    ) -> Result<Vec<u8>, Error> {
        let args = KeyDerivationArgs::new(&self.key_metadata.derivation_path, encryption_pass);
        self.vault.sign_digestable(&args, signable)
    }

    /// Builds and signs a credential share request token.
    ///
    /// # Arguments
    /// * `request` - Callback URL and credential requirements
    /// * `encryption_pass` - Password unlocking the vault for signing
    pub fn create_share_request(
        &self,
        request: CredentialRequest,
        encryption_pass: &str,
    ) -> Result<JsonWebToken, Error> {
        self.sign_interaction(InteractionPayload::CredentialRequest(request), encryption_pass)
    }

    /// Builds and signs a credential share response token.
    ///
    /// # Arguments
    /// * `response` - Callback URL and supplied credentials
    /// * `encryption_pass` - Password unlocking the vault for signing
    pub fn create_share_response(
        &self,
        response: CredentialResponse,
        encryption_pass: &str,
    ) -> Result<JsonWebToken, Error> {
        self.sign_interaction(
            InteractionPayload::CredentialResponse(response),
            encryption_pass,
        )
    }

    /// Issues a signed credential with this wallet as the issuer.
    pub fn create_signed_credential(
        &self,
        params: CredentialParams,
        encryption_pass: &str,
    ) -> Result<SignedCredential, Error> {
        let mut credential =
            SignedCredential::new_unsigned(params, self.did(), &self.key_metadata.key_id);
        let signature = self.sign_digestable(encryption_pass, &credential)?;
        credential.attach_signature(&signature);
        Ok(credential)
    }

    fn sign_interaction(
        &self,
        payload: InteractionPayload,
        encryption_pass: &str,
    ) -> Result<JsonWebToken, Error> {
        let mut token = JsonWebToken::new(payload, &self.key_metadata.key_id);
        let signature = self.sign_digestable(encryption_pass, &token)?;
        token.attach_signature(&signature);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::did::GENESIS_KEY_ID;
    use crate::utils::crypto::public_key_to_did;
    use crate::vault::{SoftwareKeyProvider, IDENTITY_KEY_PATH};

    const SEED: [u8; 32] = [7u8; 32];
    const PASS: &str = "secret";

    fn test_wallet() -> IdentityWallet {
        let vault = Arc::new(SoftwareKeyProvider::new(&SEED, PASS).unwrap());
        let args = KeyDerivationArgs::new(IDENTITY_KEY_PATH, PASS);
        let public_key = vault.get_public_key(&args).unwrap();
        let document = DidDocument::from_public_key(&public_key).unwrap();
        let identity = Identity::from_did_document(document, None).unwrap();
        let key_id = format!("{}{}", identity.did(), GENESIS_KEY_ID);
        IdentityWallet::new(
            vault,
            identity,
            KeyMetadata {
                derivation_path: IDENTITY_KEY_PATH.to_string(),
                key_id,
            },
        )
    }

    #[test]
    fn identity_did_matches_key_derivation() {
        let wallet = test_wallet();
        let args = KeyDerivationArgs::new(IDENTITY_KEY_PATH, PASS);
        let public_key = wallet.vault().get_public_key(&args).unwrap();
        assert_eq!(wallet.did(), public_key_to_did(&public_key).unwrap());
    }

    #[test]
    fn identity_requires_public_key_entry() {
        let mut document = test_wallet().did_document().clone();
        document.public_key.clear();
        let err = Identity::from_did_document(document, None).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn wallet_debug_output_omits_the_vault() {
        let wallet = test_wallet();
        let rendered = format!("{:?}", wallet);
        assert!(rendered.contains("IdentityWallet"));
        assert!(rendered.contains(wallet.did()));
        assert!(!rendered.contains("vault"));
    }

    #[test]
    fn issued_credential_verifies_against_wallet_identity() {
        let wallet = test_wallet();
        let credential = wallet
            .create_signed_credential(
                CredentialParams {
                    credential_type: vec!["Credential".to_string()],
                    name: "Test".to_string(),
                    claim: serde_json::Map::new(),
                    subject: wallet.did().to_string(),
                    expires: None,
                },
                PASS,
            )
            .unwrap();

        credential.verify(wallet.identity()).unwrap();
        assert_eq!(credential.issuer, wallet.did());
    }
}
