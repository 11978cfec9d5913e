// src/device/hub_access.rs
//! Hub-access authentication workflow.
//!
//! The device authenticates against the registry, requests a proof-of-access
//! credential over the hub's callback channel, verifies the response, and
//! persists accepted credentials locally. Verification fails closed: a
//! credential that cannot be verified is discarded and access is denied.

use std::sync::Arc;

use log::{info, warn};

use crate::device::{ClaimStore, TokenEnvelope};
use crate::error::Error;
use crate::models::credential::{SignedCredential, BASE_CREDENTIAL_TYPE};
use crate::registry::IdentityRegistry;
use crate::tokens::{CredentialRequest, CredentialRequirement, JsonWebToken};
use crate::vault::{KeyDerivationArgs, VaultedKeyProvider, IDENTITY_KEY_PATH};

/// Credential type a hub requires for access.
pub const PROOF_OF_ACCESS_TYPE: &str = "ProofOfAccessCredential";

/// Outcome of a hub-access attempt.
#[derive(Debug)]
pub struct AccessDecision {
    /// Whether access was granted
    pub granted: bool,
    /// Human-readable reason for the decision
    pub reason: String,
    /// The credentials that passed verification
    pub credentials: Vec<SignedCredential>,
}

impl AccessDecision {
    fn denied(reason: impl Into<String>) -> Self {
        AccessDecision {
            granted: false,
            reason: reason.into(),
            credentials: Vec::new(),
        }
    }
}

/// Requests hub access for the device behind `vault`.
///
/// Builds a credential share request for the proof-of-access type, posts it
/// to `callback_url`, verifies the returned response token and every supplied
/// credential, and stores accepted credentials in `claim_store`.
///
/// # Errors
/// - [`Error::Resolution`] if the device identity was never anchored
/// - [`Error::VaultAccess`] on a bad password
/// - [`Error::Network`] on a transport failure talking to the callback
///
/// Trust failures do not error: they return a denying [`AccessDecision`].
pub async fn request_hub_access(
    registry: &IdentityRegistry,
    vault: Arc<dyn VaultedKeyProvider>,
    password: &str,
    callback_url: &str,
    claim_store: &mut ClaimStore,
) -> Result<AccessDecision, Error> {
    let wallet = registry
        .authenticate(vault, &KeyDerivationArgs::new(IDENTITY_KEY_PATH, password))
        .await?;
    info!("requesting hub access for {}", wallet.did());

    let request = CredentialRequest {
        callback_url: callback_url.to_string(),
        credential_requirements: vec![CredentialRequirement {
            credential_type: vec![
                BASE_CREDENTIAL_TYPE.to_string(),
                PROOF_OF_ACCESS_TYPE.to_string(),
            ],
            constraints: vec![],
        }],
    };
    let request_token = wallet.create_share_request(request.clone(), password)?;

    let client = reqwest::Client::new();
    let response = client
        .post(callback_url)
        .json(&TokenEnvelope {
            token: request_token.encode()?,
        })
        .send()
        .await
        .map_err(|e| Error::Network(format!("hub callback request failed: {}", e)))?;
    if !response.status().is_success() {
        return Err(Error::Network(format!(
            "hub callback returned status {}",
            response.status()
        )));
    }
    let envelope: TokenEnvelope = response
        .json()
        .await
        .map_err(|e| Error::Network(format!("hub callback returned malformed body: {}", e)))?;

    // From here on, failures are trust failures: deny, never partially trust.
    let response_token = match JsonWebToken::decode(&envelope.token) {
        Ok(token) => token,
        Err(e) => return Ok(AccessDecision::denied(format!("response token rejected: {}", e))),
    };

    let responder = match registry.resolve_safe(response_token.issuer_did()).await {
        Some(identity) => identity,
        None => {
            return Ok(AccessDecision::denied(format!(
                "responder identity {} does not resolve",
                response_token.issuer_did()
            )))
        }
    };
    let responder_key = match responder.public_key() {
        Ok(key) => key,
        Err(e) => return Ok(AccessDecision::denied(format!("responder key rejected: {}", e))),
    };
    if let Err(e) = response_token.validate_signature(&responder_key) {
        return Ok(AccessDecision::denied(format!(
            "response token rejected: {}",
            e
        )));
    }

    let share_response = match response_token.as_credential_response() {
        Some(share_response) => share_response,
        None => {
            return Ok(AccessDecision::denied(
                "response token carries an unexpected interaction kind",
            ))
        }
    };

    let mut accepted = Vec::new();
    for credential in &share_response.supplied_credentials {
        if !request.satisfied_by(credential) {
            warn!(
                "credential {} does not match requested types, discarding",
                credential.id
            );
            continue;
        }
        let issuer = match registry.resolve_safe(&credential.issuer).await {
            Some(issuer) => issuer,
            None => {
                warn!(
                    "issuer {} of credential {} does not resolve, discarding",
                    credential.issuer, credential.id
                );
                continue;
            }
        };
        if let Err(e) = credential.verify(&issuer) {
            warn!("credential {} rejected: {}", credential.id, e);
            continue;
        }
        accepted.push(credential.clone());
    }

    if accepted.is_empty() {
        return Ok(AccessDecision::denied(
            "no supplied credential passed verification",
        ));
    }

    for credential in &accepted {
        claim_store.store_claim(credential.clone());
    }
    info!(
        "hub access granted with {} verified credential(s)",
        accepted.len()
    );
    Ok(AccessDecision {
        granted: true,
        reason: "all checks passed".to_string(),
        credentials: accepted,
    })
}
