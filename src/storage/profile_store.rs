// src/storage/profile_store.rs
//! Content-addressed profile storage capability.
//!
//! The registry can persist an identity's public profile credential
//! out-of-band and reference it from a service endpoint. The store is an
//! optional external collaborator, not a required core dependency: when no
//! store is configured, profile persistence is a no-op.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Error;
use crate::models::credential::SignedCredential;
use crate::utils::crypto::{encode_base64url, sha256};
use crate::utils::serialization::{from_json, to_canonical_json};

/// Capability contract for storing and retrieving profile credentials by
/// content-addressed handle.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Stores a profile credential and returns its handle.
    ///
    /// # Errors
    /// [`Error::Network`] on transport failure.
    async fn put(&self, profile: &SignedCredential) -> Result<String, Error>;

    /// Retrieves a profile credential by handle.
    ///
    /// # Errors
    /// [`Error::DidNotFound`] when no document exists for the handle,
    /// [`Error::Network`] on transport failure.
    async fn get(&self, handle: &str) -> Result<SignedCredential, Error>;
}

/// Computes the content-addressed handle of a profile credential:
/// `base64url(sha256(canonical JSON))`.
pub fn profile_handle(profile: &SignedCredential) -> Result<String, Error> {
    let canonical = to_canonical_json(profile)?;
    Ok(encode_base64url(&sha256(canonical.as_bytes())))
}

/// In-memory profile store used by tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryProfileStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryProfileStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn put(&self, profile: &SignedCredential) -> Result<String, Error> {
        let handle = profile_handle(profile)?;
        let serialized = to_canonical_json(profile)?;
        self.entries
            .lock()
            .expect("profile store lock poisoned")
            .insert(handle.clone(), serialized);
        Ok(handle)
    }

    async fn get(&self, handle: &str) -> Result<SignedCredential, Error> {
        let serialized = self
            .entries
            .lock()
            .expect("profile store lock poisoned")
            .get(handle)
            .cloned()
            .ok_or_else(|| Error::DidNotFound(format!("no profile stored for {}", handle)))?;
        from_json(&serialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::CredentialParams;

    fn test_profile() -> SignedCredential {
        SignedCredential::new_unsigned(
            CredentialParams {
                credential_type: vec!["Credential".to_string(), "PublicProfile".to_string()],
                name: "Device Profile".to_string(),
                claim: serde_json::Map::new(),
                subject: "did:ion:device".to_string(),
                expires: None,
            },
            "did:ion:device",
            "did:ion:device#keys-1",
        )
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryProfileStore::new();
        let profile = test_profile();

        let handle = store.put(&profile).await.unwrap();
        let retrieved = store.get(&handle).await.unwrap();
        assert_eq!(retrieved, profile);
    }

    #[tokio::test]
    async fn handle_is_content_addressed() {
        let store = InMemoryProfileStore::new();
        let profile = test_profile();

        let handle = store.put(&profile).await.unwrap();
        assert_eq!(handle, profile_handle(&profile).unwrap());
    }

    #[tokio::test]
    async fn missing_handle_is_not_found() {
        let store = InMemoryProfileStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, Error::DidNotFound(_)));
    }
}
