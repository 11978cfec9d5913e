// src/lib.rs
//! DID lifecycle and verifiable-credential exchange for IoT devices.
//!
//! This crate derives `did:ion:` identifiers from secp256k1 keys held in an
//! encrypted software vault, anchors them through a Sidetree gateway with
//! self-verifying signed operations, and runs the interaction-token protocol
//! devices use to obtain hub-access credentials and verify signed software
//! upgrades.
//!
//! # Architecture
//! - `vault` holds the sealed master seed and derives signing keys per path
//! - `models` defines the DID Document and signed-credential data model
//! - `sidetree` speaks the gateway's operation and resolution endpoints
//! - `registry` drives create/commit/resolve/authenticate over the above
//! - `tokens` implements the JWT-shaped interaction-token protocol
//! - `device` composes everything into hub-access and upgrade workflows
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use ion_identity::registry::IdentityRegistry;
//! use ion_identity::sidetree::{HttpSidetreeConnector, SidetreeConfig};
//! use ion_identity::vault::SoftwareKeyProvider;
//!
//! # async fn run() -> Result<(), ion_identity::Error> {
//! let vault = Arc::new(SoftwareKeyProvider::new(&[1u8; 32], "password")?);
//! let registry = IdentityRegistry::new(Arc::new(HttpSidetreeConnector::new(
//!     &SidetreeConfig {
//!         protocol: "https".to_string(),
//!         host: "gateway.example.com".to_string(),
//!         port: 443,
//!         path: "/v1.0/identifiers".to_string(),
//!     },
//! )));
//! let wallet = registry.create(vault, "password").await?;
//! println!("anchored {}", wallet.did());
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod error;
pub mod identity;
pub mod models;
pub mod registry;
pub mod sidetree;
pub mod storage;
pub mod tokens;
pub mod utils;
pub mod vault;

pub use error::{Error, ErrorKind};
