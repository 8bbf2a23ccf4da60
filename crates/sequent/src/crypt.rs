//! Keyed-hash and random-string helpers
//!
//! Thin wrappers over HMAC-SHA2 producing lowercase hex digests, plus a
//! charset-driven random string generator for human-facing codes.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Uppercase alphanumerics with visually confusable characters removed
/// (no `0`/`O`, `1`/`I`, `V`/`U` pairs).
pub const ASCII_NOT_CONFUSABLE: &str = "ABCEFGHJKLMNPQRSTUWXYZ123456789";

/// HMAC-SHA256 hex digest of `msg` keyed with `key`
pub fn hmac_sha256_hex(key: &[u8], msg: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(msg);
    hex::encode(mac.finalize().into_bytes())
}

/// HMAC-SHA512 hex digest of `msg` keyed with `key`
pub fn hmac_sha512_hex(key: &[u8], msg: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(msg);
    hex::encode(mac.finalize().into_bytes())
}

/// Generate a random string of length `len` from the characters in `charset`.
///
/// An empty charset yields an empty string.
pub fn random_string(len: usize, charset: &str) -> String {
    let chars: Vec<char> = charset.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha256_known_vector() {
        // RFC 4231 test case 2
        let digest = hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            digest,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hmac_sha512_known_vector() {
        // RFC 4231 test case 2
        let digest = hmac_sha512_hex(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            digest,
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn test_random_string_respects_charset() {
        let s = random_string(64, ASCII_NOT_CONFUSABLE);
        assert_eq!(s.chars().count(), 64);
        assert!(s.chars().all(|c| ASCII_NOT_CONFUSABLE.contains(c)));
    }

    #[test]
    fn test_random_string_empty_length() {
        assert_eq!(random_string(0, "abc"), "");
    }

    #[test]
    fn test_random_string_empty_charset() {
        assert_eq!(random_string(8, ""), "");
    }
}
