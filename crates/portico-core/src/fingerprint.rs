// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log-safe fingerprints for request payloads.
//!
//! JSON-RPC parameter bodies may contain user data and must never appear in
//! log output verbatim. Log lines carry this short digest instead so that
//! two log entries for the same payload can still be correlated.

use ring::digest;

/// Returns the first 8 bytes of the SHA-256 digest as lowercase hex.
pub fn fingerprint(payload: &[u8]) -> String {
    let digest = digest::digest(&digest::SHA256, payload);
    hex::encode(&digest.as_ref()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_16_hex_chars() {
        let fp = fingerprint(b"{\"jsonrpc\":\"2.0\"}");
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_is_deterministic_and_input_sensitive() {
        assert_eq!(fingerprint(b"abc"), fingerprint(b"abc"));
        assert_ne!(fingerprint(b"abc"), fingerprint(b"abd"));
    }

    #[test]
    fn fingerprint_does_not_echo_input() {
        let secret = b"refresh-token-value-1234567890";
        let fp = fingerprint(secret);
        assert!(!fp.contains("refresh"));
    }
}
