// src/device/claim_store.rs
//! Local claim storage for the device.
//!
//! Holds the signed credentials a device has been granted, keyed by
//! credential id. Only credentials that passed verification are ever written
//! here; a record is written once per accepted credential.

use std::collections::HashMap;

use crate::models::credential::SignedCredential;

/// In-memory store of accepted credentials.
pub struct ClaimStore {
    claims: HashMap<String, SignedCredential>,
}

impl Default for ClaimStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimStore {
    /// Creates an empty claim store.
    pub fn new() -> Self {
        ClaimStore {
            claims: HashMap::new(),
        }
    }

    /// Stores an accepted credential, keyed by its id.
    ///
    /// Overwrites an existing record with the same id.
    pub fn store_claim(&mut self, credential: SignedCredential) {
        self.claims.insert(credential.id.clone(), credential);
    }

    /// Retrieves a credential by its id.
    pub fn get_claim(&self, id: &str) -> Option<&SignedCredential> {
        self.claims.get(id)
    }

    /// Checks whether a credential with the given id is stored.
    pub fn contains_claim(&self, id: &str) -> bool {
        self.claims.contains_key(id)
    }

    /// Number of stored credentials.
    pub fn count_claims(&self) -> usize {
        self.claims.len()
    }

    /// Removes a credential by its id. Returns `true` if one was removed.
    pub fn remove_claim(&mut self, id: &str) -> bool {
        self.claims.remove(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::{CredentialParams, BASE_CREDENTIAL_TYPE};

    fn test_claim(name: &str) -> SignedCredential {
        SignedCredential::new_unsigned(
            CredentialParams {
                credential_type: vec![BASE_CREDENTIAL_TYPE.to_string()],
                name: name.to_string(),
                claim: serde_json::Map::new(),
                subject: "did:ion:device".to_string(),
                expires: None,
            },
            "did:ion:issuer",
            "did:ion:issuer#keys-1",
        )
    }

    #[test]
    fn store_and_retrieve_claim() {
        let mut store = ClaimStore::new();
        let credential = test_claim("Hub Access");
        let id = credential.id.clone();

        assert!(!store.contains_claim(&id));
        store.store_claim(credential);
        assert!(store.contains_claim(&id));
        assert_eq!(store.get_claim(&id).unwrap().name, "Hub Access");
    }

    #[test]
    fn remove_claim_updates_count() {
        let mut store = ClaimStore::new();
        let credential = test_claim("Temporary");
        let id = credential.id.clone();

        store.store_claim(credential);
        assert_eq!(store.count_claims(), 1);

        assert!(store.remove_claim(&id));
        assert_eq!(store.count_claims(), 0);
        assert!(!store.remove_claim(&id));
    }
}
