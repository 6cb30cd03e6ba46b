//! SHA-256 content hashing.

use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
#[must_use]
pub fn digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 of `data` as 64 lowercase hex characters.
///
/// ```
/// assert_eq!(
///     openleash::sha256_hex(b"{\"hello\":\"world\"}"),
///     "93a23971a914e5eacbf0a8d25154cda309c3c1c72fbb9914d47c60f3cb681588"
/// );
/// ```
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_digest() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_is_stable() {
        let body = br#"{"amount":5000,"currency":"USD"}"#;
        assert_eq!(digest(body), digest(body));
    }

    #[test]
    fn key_order_changes_digest() {
        let a = sha256_hex(br#"{"a":1,"b":2}"#);
        let b = sha256_hex(br#"{"b":2,"a":1}"#);
        assert_ne!(a, b);
    }

    #[test]
    fn hex_is_lowercase() {
        let hex = sha256_hex(b"OpenLeash");
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}
