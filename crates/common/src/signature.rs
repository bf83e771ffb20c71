//! Webhook signature helpers
//!
//! HMAC-SHA256 signing and verification of raw request bodies. The secret is
//! used as a UTF-8 text key exactly as stored (sources are provisioned with
//! 32 random bytes hex-encoded; the hex string itself is the key, it is not
//! decoded back to bytes).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Create a hex-encoded HMAC-SHA256 signature over a raw payload
pub fn sign_hmac(payload: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");

    mac.update(payload);
    let result = mac.finalize();
    let code_bytes = result.into_bytes();

    hex::encode(code_bytes)
}

/// Verify a hex-encoded HMAC-SHA256 signature against a raw payload
///
/// The comparison is constant-time over equal-length strings; a length
/// mismatch is rejected up front without inspecting any bytes.
pub fn verify_hmac(payload: &[u8], signature_hex: &str, secret: &str) -> bool {
    let computed = sign_hmac(payload, secret);

    computed.as_bytes().len() == signature_hex.as_bytes().len()
        && computed
            .as_bytes()
            .iter()
            .zip(signature_hex.as_bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_signing() {
        let payload = br#"{"event": "payment.success", "amount": 100}"#;
        let secret = "webhook_secret_key";

        // Create signature
        let signature = sign_hmac(payload, secret);
        assert!(!signature.is_empty());
        assert_eq!(signature.len(), 64); // SHA256 produces 64 hex characters

        // Verify signature
        let valid = verify_hmac(payload, &signature, secret);
        assert!(valid);

        // Verify with wrong signature
        let invalid = verify_hmac(payload, "wrong_signature", secret);
        assert!(!invalid);

        // Verify with wrong payload
        let invalid = verify_hmac(b"different_payload", &signature, secret);
        assert!(!invalid);
    }

    #[test]
    fn test_hmac_deterministic() {
        let payload = b"test_payload";
        let secret = "test_secret";

        let sig1 = sign_hmac(payload, secret);
        let sig2 = sign_hmac(payload, secret);

        assert_eq!(sig1, sig2, "HMAC should be deterministic");
    }

    #[test]
    fn test_verify_rejects_length_mismatch() {
        let payload = b"payload";
        let secret = "secret";

        let mut signature = sign_hmac(payload, secret);
        signature.push('0'); // 65 chars, valid prefix

        assert!(!verify_hmac(payload, &signature, secret));
        assert!(!verify_hmac(payload, "", secret));
    }

    #[test]
    fn test_verify_with_wrong_secret() {
        let payload = b"payload";
        let signature = sign_hmac(payload, "secret_a");

        assert!(!verify_hmac(payload, &signature, "secret_b"));
    }
}
