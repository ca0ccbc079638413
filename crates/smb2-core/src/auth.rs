//! Credential verification (spec.md §4.4, §4.5).
//!
//! The core ships one real policy, [`GuestVerifier`], matching spec.md's
//! stated scope: any syntactically valid Type 3 AUTHENTICATE message is
//! accepted and mapped to a guest identity. [`CredentialVerifier`] is the
//! seam a deployment would plug a real directory/password check into; it is
//! `#[async_trait]` for the same object-safety reason as the store traits in
//! [`crate::stores`] (grounded on `wraith-transport`'s pluggable-transport
//! trait in the example pack).

use async_trait::async_trait;

/// Outcome of verifying a Type 3 AUTHENTICATE message's embedded identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub is_guest: bool,
    pub domain: Option<String>,
    pub username: Option<String>,
}

impl VerifiedIdentity {
    pub fn guest() -> Self {
        VerifiedIdentity {
            is_guest: true,
            domain: None,
            username: None,
        }
    }
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verifies an Authenticate message against `server_challenge` (the
    /// challenge previously sent in the Type 2 message for this
    /// `PendingAuth`). Never fails for malformed input -- an unrecognized or
    /// malformed buffer simply falls back to guest, per spec.md §4.4's
    /// "unknown token types are accepted and mapped to a guest session"
    /// behavior; only a hard backend failure should surface as `Err`.
    async fn verify(
        &self,
        authenticate_buf: &[u8],
        server_challenge: [u8; 8],
    ) -> Result<VerifiedIdentity, crate::stores::StoreError>;
}

/// The default policy: every AUTHENTICATE succeeds as guest. Domain/username
/// are extracted from the message on a best-effort basis for logging only,
/// per [`crate::ntlm::parse_authenticate_identity`]'s contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct GuestVerifier;

#[async_trait]
impl CredentialVerifier for GuestVerifier {
    async fn verify(
        &self,
        authenticate_buf: &[u8],
        _server_challenge: [u8; 8],
    ) -> Result<VerifiedIdentity, crate::stores::StoreError> {
        let (domain, username) = crate::ntlm::parse_authenticate_identity(authenticate_buf);
        Ok(VerifiedIdentity {
            is_guest: true,
            domain,
            username,
        })
    }
}

/// A verifier stub for deployments that want real credential checking
/// plugged in. Left unimplemented deliberately: actual password/ticket
/// validation is out of scope for this core (spec.md's Non-goals exclude
/// a concrete directory backend), and a verifier that claimed to check
/// credentials while silently always succeeding would be worse than one
/// that says so.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidatingVerifier;

#[async_trait]
impl CredentialVerifier for ValidatingVerifier {
    async fn verify(
        &self,
        _authenticate_buf: &[u8],
        _server_challenge: [u8; 8],
    ) -> Result<VerifiedIdentity, crate::stores::StoreError> {
        Err(crate::stores::StoreError::NotImplemented(
            "ValidatingVerifier has no backend configured",
        ))
    }
}
