// src/device/mod.rs
//! Device-facing workflows: hub-access authentication and software-upgrade
//! integrity verification.
//!
//! Workflows compose the registry, vault, and interaction-token protocol and
//! translate failures into binary allow/deny outcomes with human-readable
//! reasons. Transport and vault failures still propagate as errors so caller
//! retry policy can apply; trust failures (undecodable tokens, bad
//! signatures, unmatched credential types) deny instead.

pub mod claim_store;
pub mod hub_access;
pub mod upgrade;

use serde::{Deserialize, Serialize};

pub use claim_store::ClaimStore;
pub use hub_access::{request_hub_access, AccessDecision};
pub use upgrade::{upgrade_software, UpgradeInfo, UpgradeOutcome};

/// JSON body carrying an encoded interaction token to or from a service
/// channel endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenEnvelope {
    /// The encoded token string
    pub token: String,
}
