//! Inbound webhook authenticity check

/// Verifies the signature a gateway attaches to a webhook body.
pub trait SignatureVerifier: Send + Sync {
    /// `signature` is the raw header value. Must compare in constant time.
    fn verify(&self, payload: &[u8], signature: &str) -> bool;
}
