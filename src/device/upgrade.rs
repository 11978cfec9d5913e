// src/device/upgrade.rs
//! Software-upgrade integrity workflow.
//!
//! The device presents a previously accepted credential to the hub's upgrade
//! endpoint, downloads the advertised artifact, and verifies its ES256K
//! image signature before anything may be installed. Verification only
//! begins once the full artifact stream has been consumed; a truncated
//! download or a failed verification keeps the installation gate shut.

use std::sync::Arc;

use bytes::BytesMut;
use futures::TryStreamExt;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::device::TokenEnvelope;
use crate::error::Error;
use crate::models::credential::SignedCredential;
use crate::registry::IdentityRegistry;
use crate::tokens::CredentialResponse;
use crate::utils::crypto::{sha256, verify_prehash_signature};
use crate::vault::{KeyDerivationArgs, VaultedKeyProvider, IDENTITY_KEY_PATH};

/// Upgrade descriptor returned by the hub's upgrade endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeInfo {
    /// Latest available software version
    pub version: String,

    /// Where the artifact can be downloaded
    pub download_url: String,

    /// Hex-encoded ES256K signature over the artifact's sha256 digest
    pub image_signature: String,

    /// Hex-encoded public key the signature verifies against
    pub public_key_hex: String,

    /// Artifact type descriptor
    #[serde(rename = "type")]
    pub image_type: String,
}

/// Outcome of an upgrade attempt.
#[derive(Debug)]
pub struct UpgradeOutcome {
    /// Whether the artifact signature verified; installation must never
    /// proceed when this is false
    pub verified: bool,

    /// Version advertised by the hub
    pub version: String,

    /// The verified artifact bytes; `None` unless `verified`
    pub artifact: Option<Vec<u8>>,
}

/// Runs the software-upgrade workflow against `hub_url`.
///
/// # Arguments
/// * `registry` - Registry used to re-authenticate the device
/// * `vault` - The device's vault
/// * `password` - Vault decryption password
/// * `hub_url` - The hub's upgrade endpoint
/// * `credential` - Previously accepted proof-of-authorization credential
///
/// # Errors
/// - [`Error::Resolution`] if the device identity was never anchored
/// - [`Error::Network`] on transport failures or a truncated download
/// - [`Error::Encoding`] on malformed signature or key hex from the hub
pub async fn upgrade_software(
    registry: &IdentityRegistry,
    vault: Arc<dyn VaultedKeyProvider>,
    password: &str,
    hub_url: &str,
    credential: SignedCredential,
) -> Result<UpgradeOutcome, Error> {
    let wallet = registry
        .authenticate(vault, &KeyDerivationArgs::new(IDENTITY_KEY_PATH, password))
        .await?;
    info!("starting software upgrade for {}", wallet.did());

    let presentation = wallet.create_share_response(
        CredentialResponse {
            callback_url: String::new(),
            supplied_credentials: vec![credential],
        },
        password,
    )?;

    let client = reqwest::Client::new();
    let response = client
        .post(hub_url)
        .json(&TokenEnvelope {
            token: presentation.encode()?,
        })
        .send()
        .await
        .map_err(|e| Error::Network(format!("upgrade endpoint request failed: {}", e)))?;
    if !response.status().is_success() {
        return Err(Error::Network(format!(
            "upgrade endpoint returned status {}",
            response.status()
        )));
    }
    let info: UpgradeInfo = response
        .json()
        .await
        .map_err(|e| Error::Network(format!("upgrade endpoint returned malformed body: {}", e)))?;
    info!(
        "latest version is {}, downloading artifact from {}",
        info.version, info.download_url
    );

    let artifact = download_artifact(&client, &info.download_url).await?;
    let digest = sha256(&artifact);

    let public_key = hex::decode(&info.public_key_hex)
        .map_err(|e| Error::Encoding(format!("invalid image public key hex: {}", e)))?;
    let signature = hex::decode(&info.image_signature)
        .map_err(|e| Error::Encoding(format!("invalid image signature hex: {}", e)))?;

    let verified = verify_prehash_signature(&digest, &public_key, &signature)?;
    if verified {
        info!("image signature verified, software is ready for installation");
    } else {
        warn!("image signature verification failed, software is corrupted");
    }

    Ok(UpgradeOutcome {
        verified,
        version: info.version,
        artifact: if verified { Some(artifact) } else { None },
    })
}

/// Downloads the artifact, consuming the full stream before returning.
///
/// # Errors
/// [`Error::Network`] on transport failure or when the stream ends before
/// the advertised content length is reached.
async fn download_artifact(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, Error> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Network(format!("artifact download failed: {}", e)))?;
    if !response.status().is_success() {
        return Err(Error::Network(format!(
            "artifact download returned status {}",
            response.status()
        )));
    }

    let expected_length = response.content_length();
    let body = response
        .bytes_stream()
        .try_fold(BytesMut::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
        .map_err(|e| Error::Network(format!("artifact stream failed: {}", e)))?;

    if let Some(expected) = expected_length {
        check_artifact_length(body.len(), expected)?;
    }

    Ok(body.to_vec())
}

/// Rejects a download whose stream ended before the advertised length.
fn check_artifact_length(received: usize, expected: u64) -> Result<(), Error> {
    if received as u64 != expected {
        return Err(Error::Network(format!(
            "artifact stream ended after {} of {} bytes",
            received, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Identity, IdentityWallet, KeyMetadata};
    use crate::models::credential::{CredentialParams, BASE_CREDENTIAL_TYPE};
    use crate::models::did::{DidDocument, GENESIS_KEY_ID};
    use crate::sidetree::{HttpSidetreeConnector, SidetreeConfig};
    use crate::utils::crypto::public_key_to_did;
    use crate::utils::serialization::to_canonical_json;
    use crate::vault::SoftwareKeyProvider;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::{Signature, SigningKey};
    use mockito::mock;

    const DEVICE_SEED: [u8; 32] = [41u8; 32];
    const PASS: &str = "device pass";

    fn registry_for(path: &str) -> IdentityRegistry {
        let url = mockito::server_url();
        let stripped = url.strip_prefix("http://").unwrap();
        let (host, port) = stripped.split_once(':').unwrap();
        IdentityRegistry::new(Arc::new(HttpSidetreeConnector::new(&SidetreeConfig {
            protocol: "http".to_string(),
            host: host.to_string(),
            port: port.parse().unwrap(),
            path: path.to_string(),
        })))
    }

    fn device_wallet() -> (IdentityWallet, DidDocument, String) {
        let vault = Arc::new(SoftwareKeyProvider::new(&DEVICE_SEED, PASS).unwrap());
        let args = KeyDerivationArgs::new(IDENTITY_KEY_PATH, PASS);
        let public_key = vault.get_public_key(&args).unwrap();
        let document = DidDocument::from_public_key(&public_key).unwrap();
        let did = public_key_to_did(&public_key).unwrap();
        let identity = Identity::from_did_document(document.clone(), None).unwrap();
        let wallet = IdentityWallet::new(
            vault,
            identity,
            KeyMetadata {
                derivation_path: IDENTITY_KEY_PATH.to_string(),
                key_id: format!("{}{}", did, GENESIS_KEY_ID),
            },
        );
        (wallet, document, did)
    }

    fn access_credential(wallet: &IdentityWallet) -> SignedCredential {
        wallet
            .create_signed_credential(
                CredentialParams {
                    credential_type: vec![
                        BASE_CREDENTIAL_TYPE.to_string(),
                        "ProofOfAccessCredential".to_string(),
                    ],
                    name: "Hub Access".to_string(),
                    claim: serde_json::Map::new(),
                    subject: wallet.did().to_string(),
                    expires: None,
                },
                PASS,
            )
            .unwrap()
    }

    /// Serves an upgrade descriptor whose signature covers `signed_artifact`
    /// while `served_artifact` is what the download endpoint returns.
    fn mock_upgrade(
        hub_path: &str,
        artifact_path: &str,
        signed_artifact: &[u8],
        served_artifact: &[u8],
    ) -> (mockito::Mock, mockito::Mock) {
        let image_key = SigningKey::from_slice(&[43u8; 32]).unwrap();
        let digest = sha256(signed_artifact);
        let signature: Signature = image_key.sign_prehash(&digest).unwrap();

        let info = UpgradeInfo {
            version: "2.0.0".to_string(),
            download_url: format!("{}{}", mockito::server_url(), artifact_path),
            image_signature: hex::encode(signature.to_vec()),
            public_key_hex: hex::encode(
                image_key.verifying_key().to_encoded_point(true).as_bytes(),
            ),
            image_type: "firmware".to_string(),
        };

        let hub = mock("POST", hub_path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::to_string(&info).unwrap())
            .create();
        let download = mock("GET", artifact_path)
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(served_artifact)
            .create();
        (hub, download)
    }

    #[tokio::test]
    async fn intact_artifact_passes_verification() {
        let (device, device_doc, device_did) = device_wallet();
        let _res = mock("GET", format!("/upg-ok/{}", device_did).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(to_canonical_json(&device_doc).unwrap())
            .create();

        let artifact = b"firmware image v2".to_vec();
        let (_hub, _dl) = mock_upgrade("/hub-upg-ok", "/firmware-ok.bin", &artifact, &artifact);

        let registry = registry_for("/upg-ok");
        let outcome = upgrade_software(
            &registry,
            device.vault(),
            PASS,
            &format!("{}/hub-upg-ok", mockito::server_url()),
            access_credential(&device),
        )
        .await
        .unwrap();

        assert!(outcome.verified);
        assert_eq!(outcome.version, "2.0.0");
        assert_eq!(outcome.artifact.unwrap(), artifact);
    }

    #[tokio::test]
    async fn tampered_artifact_fails_verification() {
        let (device, device_doc, device_did) = device_wallet();
        let _res = mock("GET", format!("/upg-bad/{}", device_did).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(to_canonical_json(&device_doc).unwrap())
            .create();

        let artifact = b"firmware image v2".to_vec();
        let mut tampered = artifact.clone();
        tampered[0] ^= 0x01;
        let (_hub, _dl) = mock_upgrade("/hub-upg-bad", "/firmware-bad.bin", &artifact, &tampered);

        let registry = registry_for("/upg-bad");
        let outcome = upgrade_software(
            &registry,
            device.vault(),
            PASS,
            &format!("{}/hub-upg-bad", mockito::server_url()),
            access_credential(&device),
        )
        .await
        .unwrap();

        assert!(!outcome.verified);
        assert!(outcome.artifact.is_none());
    }

    #[test]
    fn short_read_is_a_network_error() {
        check_artifact_length(1024, 1024).unwrap();

        let err = check_artifact_length(512, 1024).unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(err.to_string().contains("512 of 1024"));
    }

    #[tokio::test]
    async fn failed_download_is_a_network_error() {
        let (device, device_doc, device_did) = device_wallet();
        let _res = mock("GET", format!("/upg-404/{}", device_did).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(to_canonical_json(&device_doc).unwrap())
            .create();

        let artifact = b"firmware image v2".to_vec();
        let image_key = SigningKey::from_slice(&[43u8; 32]).unwrap();
        let digest = sha256(&artifact);
        let signature: Signature = image_key.sign_prehash(&digest).unwrap();
        let info = UpgradeInfo {
            version: "2.0.0".to_string(),
            download_url: format!("{}/firmware-missing.bin", mockito::server_url()),
            image_signature: hex::encode(signature.to_vec()),
            public_key_hex: hex::encode(
                image_key.verifying_key().to_encoded_point(true).as_bytes(),
            ),
            image_type: "firmware".to_string(),
        };
        let _hub = mock("POST", "/hub-upg-404")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::to_string(&info).unwrap())
            .create();
        let _missing = mock("GET", "/firmware-missing.bin").with_status(404).create();

        let registry = registry_for("/upg-404");
        let err = upgrade_software(
            &registry,
            device.vault(),
            PASS,
            &format!("{}/hub-upg-404", mockito::server_url()),
            access_credential(&device),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
