//! Callback message signatures.
//!
//! The platform signs every callback with SHA-1 over the lexicographically
//! sorted concatenation of the token, timestamp, nonce and encrypted payload.

use sha1::{Digest, Sha1};
use tracing::warn;

/// Compute the lowercase hex message signature.
pub fn msg_signature(token: &str, timestamp: &str, nonce: &str, encrypted: &str) -> String {
    let mut parts = [token, timestamp, nonce, encrypted];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Verify a message signature against the expected one.
///
/// Returns `false` for empty signatures without hashing.
pub fn verify_msg_signature(
    token: &str,
    timestamp: &str,
    nonce: &str,
    encrypted: &str,
    signature: &str,
) -> bool {
    if signature.is_empty() {
        warn!("msg_signature_missing");
        return false;
    }

    let expected = msg_signature(token, timestamp, nonce, encrypted);
    let valid = constant_time_compare(&expected, &signature.to_ascii_lowercase());

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            "msg_signature_mismatch"
        );
    }

    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_signature_known_vectors() {
        // sha1("")
        assert_eq!(
            msg_signature("", "", "", ""),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        // sha1("abc"), empty parts sort first
        assert_eq!(
            msg_signature("", "", "abc", ""),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_msg_signature_is_order_independent() {
        let a = msg_signature("token", "1690000000", "nonce", "cipher");
        let b = msg_signature("cipher", "nonce", "token", "1690000000");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_verify_msg_signature() {
        let sig = msg_signature("token", "1690000000", "nonce", "cipher");
        assert!(verify_msg_signature("token", "1690000000", "nonce", "cipher", &sig));
        assert!(verify_msg_signature(
            "token",
            "1690000000",
            "nonce",
            "cipher",
            &sig.to_ascii_uppercase()
        ));
        assert!(!verify_msg_signature("token", "1690000001", "nonce", "cipher", &sig));
        assert!(!verify_msg_signature("token", "1690000000", "nonce", "cipher", ""));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
