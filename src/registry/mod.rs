// src/registry/mod.rs
//! Identity registry: create, commit, resolve, and authenticate identities
//! against a sidetree ledger gateway.
//!
//! The registry orchestrates the vault, the crypto utilities, and the
//! sidetree connector. It is constructed with explicit collaborators
//! (connector, optional profile store) passed at construction time; there are
//! no process-wide singletons.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::error::Error;
use crate::identity::{Identity, IdentityWallet, KeyMetadata};
use crate::models::did::{DidDocument, ServiceEndpointSection, GENESIS_KEY_ID, PUBLIC_PROFILE_SERVICE_TYPE};
use crate::sidetree::{OperationKind, SidetreeConnector, SidetreeOpHeader, SidetreeOperation};
use crate::storage::ProfileStore;
use crate::tokens::TOKEN_ALG;
use crate::utils::crypto::{encode_base64url, public_key_to_did};
use crate::utils::serialization::to_canonical_json;
use crate::vault::{KeyDerivationArgs, VaultedKeyProvider, ANCHOR_KEY_PATH, IDENTITY_KEY_PATH};

/// Arguments for committing an identity to the ledger gateway.
pub struct CommitArgs<'a> {
    /// Vault holding the anchoring key
    pub vault: Arc<dyn VaultedKeyProvider>,

    /// Derivation path and decryption pass for the anchoring key. Must name a
    /// path distinct from the wallet's identity key path.
    pub key_metadata: KeyDerivationArgs,

    /// Wallet containing the DID Document and optional public profile
    pub identity_wallet: &'a IdentityWallet,

    /// Raw 64-byte signature over the document's signing input
    pub did_document_signature: Vec<u8>,
}

/// Builds a self-verifying `create` anchoring operation for a document.
///
/// The header's `kid` names the document's first public key, and the
/// signature covers `"." + payload`, so [`SidetreeOperation::verify`]
/// succeeds for any operation built here from a correctly signed document.
///
/// # Errors
/// Returns [`Error::Encoding`] if the document carries no public key.
pub fn build_create_operation(
    document: &DidDocument,
    signature: &[u8],
) -> Result<SidetreeOperation, Error> {
    let kid = document
        .public_key
        .first()
        .map(|section| section.id.clone())
        .ok_or_else(|| Error::Encoding("cannot anchor a document without keys".to_string()))?;

    let canonical = to_canonical_json(document)?;
    Ok(SidetreeOperation {
        header: SidetreeOpHeader {
            operation: OperationKind::Create,
            alg: TOKEN_ALG.to_string(),
            kid,
            proof_of_work: serde_json::json!({}),
        },
        payload: encode_base64url(canonical.as_bytes()),
        signature: encode_base64url(signature),
    })
}

/// Registry anchoring identities on a sidetree gateway and resolving them
/// back into [`Identity`] instances.
pub struct IdentityRegistry {
    connector: Arc<dyn SidetreeConnector>,
    profile_store: Option<Arc<dyn ProfileStore>>,
    /// Per-DID anchoring locks: at most one in-flight commit per DID.
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdentityRegistry {
    /// Creates a registry backed by the given gateway connector.
    pub fn new(connector: Arc<dyn SidetreeConnector>) -> Self {
        IdentityRegistry {
            connector,
            profile_store: None,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Configures an optional content-addressed store for public profiles.
    pub fn with_profile_store(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.profile_store = Some(store);
        self
    }

    /// Registers a new identity on the ledger and returns its wallet.
    ///
    /// Derives the identity public key from the fixed identity path, builds
    /// the genesis DID Document, signs it, and anchors it via
    /// [`commit`](Self::commit). The anchoring key is derived from a path
    /// distinct from the identity path.
    ///
    /// # Arguments
    /// * `vault` - Vault storing the password-encrypted seed
    /// * `decryption_password` - Password decrypting the seed
    ///
    /// # Errors
    /// - [`Error::VaultAccess`] on a bad password
    /// - [`Error::Persistence`] when anchoring fails
    pub async fn create(
        &self,
        vault: Arc<dyn VaultedKeyProvider>,
        decryption_password: &str,
    ) -> Result<IdentityWallet, Error> {
        let identity_args = KeyDerivationArgs::new(IDENTITY_KEY_PATH, decryption_password);
        let public_key = vault.get_public_key(&identity_args)?;

        let did_document = DidDocument::from_public_key(&public_key)?;
        let did_document_signature = vault.sign_digestable(&identity_args, &did_document)?;

        let identity = Identity::from_did_document(did_document, None)?;
        let key_id = format!("{}{}", identity.did(), GENESIS_KEY_ID);
        info!("registering identity {}", identity.did());

        let identity_wallet = IdentityWallet::new(
            Arc::clone(&vault),
            identity,
            KeyMetadata {
                derivation_path: IDENTITY_KEY_PATH.to_string(),
                key_id,
            },
        );

        self.commit(CommitArgs {
            vault,
            key_metadata: KeyDerivationArgs::new(ANCHOR_KEY_PATH, decryption_password),
            identity_wallet: &identity_wallet,
            did_document_signature,
        })
        .await?;

        Ok(identity_wallet)
    }

    /// Anchors the wallet's DID Document on the ledger gateway.
    ///
    /// If a profile store is configured and the identity carries a public
    /// profile, the profile is persisted content-addressed and referenced
    /// from a service endpoint before anchoring; without a store this step is
    /// a no-op. At most one commit per DID is in flight at any time.
    ///
    /// # Errors
    /// [`Error::Persistence`] wrapping the underlying cause; never silently
    /// drops a failure.
    pub async fn commit(&self, args: CommitArgs<'_>) -> Result<(), Error> {
        let wallet = args.identity_wallet;
        let wrap = |source: Error| Error::Persistence {
            source: Box::new(source),
        };

        // Key separation invariant: the anchoring path must never equal the
        // identity path.
        if args.key_metadata.derivation_path == wallet.key_metadata().derivation_path {
            return Err(wrap(Error::Encoding(
                "anchoring derivation path must differ from the identity derivation path"
                    .to_string(),
            )));
        }
        // The anchoring key must be derivable before we touch the gateway.
        args.vault
            .get_public_key(&args.key_metadata)
            .map_err(wrap)?;

        let mut document = wallet.did_document().clone();
        let mut amended = false;

        if let Some(profile) = wallet.identity().public_profile() {
            if let Some(store) = &self.profile_store {
                let handle = store.put(profile).await.map_err(wrap)?;
                debug!("persisted public profile for {} at {}", wallet.did(), handle);
                document.add_service_endpoint(ServiceEndpointSection {
                    id: format!("{};profile", wallet.did()),
                    endpoint_type: PUBLIC_PROFILE_SERVICE_TYPE.to_string(),
                    service_endpoint: handle,
                    description: Some("Public profile credential".to_string()),
                });
                amended = true;
            }
        }

        // An amended document invalidates the caller's signature; re-sign
        // with the wallet's identity key so the operation stays
        // self-verifying.
        let signature = if amended {
            let identity_args = KeyDerivationArgs::new(
                &wallet.key_metadata().derivation_path,
                &args.key_metadata.encryption_pass,
            );
            args.vault
                .sign_digestable(&identity_args, &document)
                .map_err(wrap)?
        } else {
            args.did_document_signature.clone()
        };

        let operation = build_create_operation(&document, &signature).map_err(wrap)?;

        let lock = self.commit_lock(wallet.did());
        let result = {
            let _guard = lock.lock().await;
            self.connector
                .create_did_record(&operation)
                .await
                .map(|_| ())
                .map_err(wrap)
        };
        self.release_commit_lock(wallet.did(), &lock);
        result
    }

    /// Resolves a DID into an [`Identity`].
    ///
    /// Fetches the document from the gateway, and, when a public-profile
    /// service endpoint is present and a profile store is configured, fetches
    /// the linked profile credential (its absence is not an error).
    ///
    /// # Errors
    /// [`Error::Resolution`] wrapping the underlying cause; the kind of the
    /// cause (e.g. [`crate::error::ErrorKind::DidNotFound`]) stays visible
    /// through [`Error::kind`].
    pub async fn resolve(&self, did: &str) -> Result<Identity, Error> {
        let wrap = |source: Error| Error::Resolution {
            source: Box::new(source),
        };

        let document = self.connector.resolve_did(did).await.map_err(wrap)?;

        let public_profile = match (document.public_profile_endpoint(), &self.profile_store) {
            (Some(endpoint), Some(store)) => match store.get(&endpoint.service_endpoint).await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!("public profile for {} could not be fetched: {}", did, e);
                    None
                }
            },
            _ => None,
        };

        Identity::from_did_document(document, public_profile).map_err(wrap)
    }

    /// Proxies to [`resolve`](Self::resolve) but converts any failure into an
    /// empty result, for callers that tolerate unknown identities.
    pub async fn resolve_safe(&self, did: &str) -> Option<Identity> {
        match self.resolve(did).await {
            Ok(identity) => Some(identity),
            Err(e) => {
                debug!("safe resolution of {} failed: {}", did, e);
                None
            }
        }
    }

    /// Re-authenticates an existing identity.
    ///
    /// Derives the public key for the given path, computes the DID locally,
    /// resolves it (it must already be anchored), and binds a wallet to the
    /// resolved identity.
    ///
    /// # Errors
    /// [`Error::Resolution`] wrapping [`Error::DidNotFound`] if the locally
    /// derived DID was never anchored.
    pub async fn authenticate(
        &self,
        vault: Arc<dyn VaultedKeyProvider>,
        derivation_args: &KeyDerivationArgs,
    ) -> Result<IdentityWallet, Error> {
        let public_key = vault.get_public_key(derivation_args)?;
        let did = public_key_to_did(&public_key)?;
        debug!("authenticating {}", did);

        let identity = self.resolve(&did).await?;
        let key_id = format!("{}{}", did, identity.public_key_section().id);

        Ok(IdentityWallet::new(
            vault,
            identity,
            KeyMetadata {
                derivation_path: derivation_args.derivation_path.clone(),
                key_id,
            },
        ))
    }

    fn commit_lock(&self, did: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.in_flight.lock().expect("commit lock map poisoned");
        Arc::clone(
            locks
                .entry(did.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Drops the map entry once no other commit holds a clone of the lock, so
    /// the map stays bounded by the number of in-flight commits.
    fn release_commit_lock(&self, did: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.in_flight.lock().expect("commit lock map poisoned");
        // Two strong counts: the map entry and the caller's handle.
        if Arc::strong_count(lock) <= 2 {
            locks.remove(did);
        }
    }
}
