// src/error.rs
//! Error types for the identity system.
//!
//! Lower layers (crypto utilities, vault, sidetree connector) return the
//! specific kind for a failure. The registry and the interaction-token
//! protocol wrap lower-level failures with contextual messages but preserve
//! the underlying kind, so callers can still branch on [`Error::kind`].

use thiserror::Error;

/// All failure kinds produced by the identity system.
#[derive(Debug, Error)]
pub enum Error {
    /// The supplied encryption password does not decrypt the vault seed.
    /// Fatal to the calling operation; never retried.
    #[error("vault access denied: {0}")]
    VaultAccess(String),

    /// Malformed key material or document structure. Fatal.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Transport-level failure talking to a remote endpoint. Retryable by
    /// caller policy; the core never retries on its own.
    #[error("network error: {0}")]
    Network(String),

    /// The ledger gateway holds no record for the requested DID.
    #[error("no record for DID found: {0}")]
    DidNotFound(String),

    /// The ledger gateway rejected an anchoring operation. Carries the
    /// gateway's detail message.
    #[error("anchoring operation rejected by gateway: {0}")]
    RejectedOperation(String),

    /// An interaction token could not be decoded. Distinct from a
    /// verification failure: this is garbage input, not a forged signature.
    #[error("malformed interaction token: {0}")]
    TokenDecode(String),

    /// Structurally valid data whose signature does not verify. The token or
    /// credential must be discarded, never used even partially.
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    /// A commit / anchoring operation failed while persisting identity data.
    /// Wraps the underlying cause.
    #[error("error occurred while persisting identity data: {source}")]
    Persistence {
        #[source]
        source: Box<Error>,
    },

    /// A DID resolution failed. Wraps the underlying cause.
    #[error("could not retrieve DID Document: {source}")]
    Resolution {
        #[source]
        source: Box<Error>,
    },
}

/// Discriminant for programmatic error handling across wrapping layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    VaultAccess,
    Encoding,
    Network,
    DidNotFound,
    RejectedOperation,
    TokenDecode,
    SignatureVerification,
}

impl Error {
    /// Returns the underlying failure kind, looking through the
    /// `Persistence` and `Resolution` wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::VaultAccess(_) => ErrorKind::VaultAccess,
            Error::Encoding(_) => ErrorKind::Encoding,
            Error::Network(_) => ErrorKind::Network,
            Error::DidNotFound(_) => ErrorKind::DidNotFound,
            Error::RejectedOperation(_) => ErrorKind::RejectedOperation,
            Error::TokenDecode(_) => ErrorKind::TokenDecode,
            Error::SignatureVerification(_) => ErrorKind::SignatureVerification,
            Error::Persistence { source } => source.kind(),
            Error::Resolution { source } => source.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_preserved_through_wrappers() {
        let inner = Error::DidNotFound("did:ion:missing".to_string());
        let wrapped = Error::Resolution {
            source: Box::new(inner),
        };
        assert_eq!(wrapped.kind(), ErrorKind::DidNotFound);

        let double = Error::Persistence {
            source: Box::new(wrapped),
        };
        assert_eq!(double.kind(), ErrorKind::DidNotFound);
    }

    #[test]
    fn resolution_message_carries_cause() {
        let err = Error::Resolution {
            source: Box::new(Error::Network("connection refused".to_string())),
        };
        let message = err.to_string();
        assert!(message.contains("could not retrieve DID Document"));
        assert!(message.contains("connection refused"));
    }
}
