//! # Signature Codec
//!
//! Canonical signature over flat gateway payloads. Both sides compute
//! the same digest: drop empty values, sort keys, join the values with
//! `|` behind the shared secret, SHA-1, hex. The digest binds the
//! payload to the merchant secret; any signed field changing breaks it.

use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Separator between canonical signature elements
pub const SIGNATURE_SEPARATOR: char = '|';

/// Build the canonical signature string for a payload.
///
/// Keys with empty values are dropped (the gateway omits optional
/// fields rather than sending them empty, and both sides must
/// canonicalize identically), remaining keys are sorted
/// lexicographically, and only the values are joined; keys are not
/// part of the signed string. The secret is always the first element.
///
/// Callers strip `signature` and `response_signature_string` before
/// canonicalization; those describe the signature, they are not signed
/// content.
pub fn canonicalize(params: &BTreeMap<String, String>, secret: &str) -> String {
    let mut elements: Vec<&str> = vec![secret];
    // BTreeMap iterates in ascending key order
    elements.extend(
        params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(_, v)| v.as_str()),
    );

    let mut out = String::new();
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push(SIGNATURE_SEPARATOR);
        }
        out.push_str(element);
    }
    out
}

/// Sign a payload: SHA-1 over the canonical string, lowercase hex
pub fn sign(params: &BTreeMap<String, String>, secret: &str) -> String {
    let canonical = canonicalize(params, secret);
    let digest = Sha1::digest(canonical.as_bytes());
    hex::encode(digest)
}

/// Verify a payload signature in constant time
pub fn verify(params: &BTreeMap<String, String>, secret: &str, expected: &str) -> bool {
    constant_time_compare(&sign(params, secret), expected)
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_canonicalize_sorts_and_drops_empties() {
        let p = params(&[
            ("order_id", "42#1700000000"),
            ("amount", "10000"),
            ("sender_email", ""),
            ("currency", "EUR"),
        ]);

        // Keys sort to amount, currency, order_id; empty value dropped
        assert_eq!(
            canonicalize(&p, "secret"),
            "secret|10000|EUR|42#1700000000"
        );
    }

    #[test]
    fn test_empty_payload_signs_secret_alone() {
        let p = params(&[]);
        assert_eq!(canonicalize(&p, "secret"), "secret");

        // sha1("secret")
        assert_eq!(sign(&p, "secret"), "e5e9fa1ba31ecd1ae84f75caaa474f3a663f05f4");
    }

    #[test]
    fn test_sign_is_160_bit_hex() {
        let p = params(&[("amount", "10000"), ("currency", "EUR")]);
        let digest = sign(&p, "testkey");
        assert_eq!(digest.len(), 40);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_round_trip() {
        let p = params(&[
            ("merchant_id", "M1"),
            ("order_id", "42#1700000000"),
            ("amount", "10000"),
            ("currency", "EUR"),
            ("order_status", "approved"),
            ("payment_id", "P1"),
        ]);

        let digest = sign(&p, "testkey");
        assert!(verify(&p, "testkey", &digest));
    }

    #[test]
    fn test_tampered_field_invalidates() {
        let p = params(&[("amount", "10000"), ("currency", "EUR")]);
        let digest = sign(&p, "testkey");

        let tampered = params(&[("amount", "9999"), ("currency", "EUR")]);
        assert!(!verify(&tampered, "testkey", &digest));

        // Wrong secret also fails
        assert!(!verify(&p, "otherkey", &digest));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
