//! Signature verification seam consulted before a payload is promoted.
//!
//! The review UI verifies signatures client-side against its own key
//! material. The server only calls whatever verifier it was built with.

use crate::error::{Result, ReviewError};
use crate::keys::TransactionRef;
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Whether [`verify`](Self::verify) needs the signature text. When `false`
    /// the engine does not fetch it and passes an empty string.
    fn requires_signature(&self) -> bool {
        true
    }

    /// Returns `Err(ReviewError::SignatureRejected)` to abort the commit.
    async fn verify(&self, tx: &TransactionRef, payload: &[u8], signature: &str) -> Result<()>;
}

/// Accepts every payload: the caller vouches that verification already
/// happened upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustUpstream;

#[async_trait]
impl SignatureVerifier for TrustUpstream {
    fn requires_signature(&self) -> bool {
        false
    }

    async fn verify(&self, tx: &TransactionRef, _payload: &[u8], _signature: &str) -> Result<()> {
        debug!(payload_key = %tx.payload_key(), "signature trusted from upstream");
        Ok(())
    }
}

/// Requires a non-blank signature object to exist next to the payload.
///
/// Checks presence only, not authenticity.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireSignature;

#[async_trait]
impl SignatureVerifier for RequireSignature {
    async fn verify(&self, tx: &TransactionRef, _payload: &[u8], signature: &str) -> Result<()> {
        if signature.trim().is_empty() {
            return Err(ReviewError::SignatureRejected(format!(
                "{} is empty",
                tx.signature_key()
            )));
        }
        Ok(())
    }
}
