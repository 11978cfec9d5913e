// src/sidetree/connector.rs
//! HTTP implementation of the sidetree gateway connector.
//!
//! Talks to a remote gateway over its two-endpoint surface:
//! `GET {endpoint}/{did}` for resolution and `POST {endpoint}` for anchoring.
//! Caller-imposed timeouts on the underlying client surface as
//! [`Error::Network`].

use async_trait::async_trait;
use log::{debug, warn};

use crate::error::Error;
use crate::models::did::DidDocument;
use crate::sidetree::{SidetreeConnector, SidetreeOperation};

/// Remote gateway address, assembled as `protocol://host:port/path`.
#[derive(Debug, Clone)]
pub struct SidetreeConfig {
    /// URL scheme, e.g. `http` or `https`
    pub protocol: String,
    /// Gateway host
    pub host: String,
    /// Gateway port
    pub port: u16,
    /// Base path, with leading slash, e.g. `/ion`
    pub path: String,
}

/// Sidetree gateway client backed by `reqwest`.
pub struct HttpSidetreeConnector {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSidetreeConnector {
    /// Creates a connector for the given gateway address.
    ///
    /// # Arguments
    /// * `config` - Remote sidetree gateway address
    pub fn new(config: &SidetreeConfig) -> Self {
        HttpSidetreeConnector {
            endpoint: format!(
                "{}://{}:{}{}",
                config.protocol, config.host, config.port, config.path
            ),
            client: reqwest::Client::new(),
        }
    }

    /// The assembled gateway endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SidetreeConnector for HttpSidetreeConnector {
    async fn resolve_did(&self, did: &str) -> Result<DidDocument, Error> {
        let url = format!("{}/{}", self.endpoint, did);
        debug!("resolving {} via {}", did, url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("gateway request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::DidNotFound(did.to_string()));
        }
        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "gateway returned status {} for {}",
                response.status(),
                did
            )));
        }

        response
            .json::<DidDocument>()
            .await
            .map_err(|e| Error::Encoding(format!("gateway returned malformed DID Document: {}", e)))
    }

    async fn create_did_record(&self, operation: &SidetreeOperation) -> Result<DidDocument, Error> {
        debug!(
            "submitting {:?} operation for kid {}",
            operation.header.operation, operation.header.kid
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(operation)
            .send()
            .await
            .map_err(|e| Error::Network(format!("gateway request failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() {
            let detail = response.text().await.unwrap_or_default();
            warn!("gateway rejected anchoring operation: {} {}", status, detail);
            return Err(Error::RejectedOperation(format!("{} {}", status, detail)));
        }
        if !status.is_success() {
            return Err(Error::Network(format!("gateway returned status {}", status)));
        }

        response
            .json::<DidDocument>()
            .await
            .map_err(|e| Error::Encoding(format!("gateway returned malformed DID Document: {}", e)))
    }
}
