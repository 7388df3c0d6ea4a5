//! Content fingerprints.
//!
//! Block identity during reconciliation hashes the verbatim block
//! text; the directive handlers assemble their cache keys from the
//! same length-prefixed primitive. SHA-256 over length-prefixed parts
//! means no concatenation of different inputs can collide.

use sha2::{Digest, Sha256};

/// SHA-256 of a sequence of parts, each prefixed with its byte length,
/// rendered as lowercase hex.
#[must_use]
pub fn sha256_hex_parts(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Fingerprint of a block's verbatim source text. Equal text yields an
/// equal fingerprint regardless of position, which is exactly what the
/// reconciler needs to preserve identity across moves.
#[must_use]
pub fn text_fingerprint(text: &str) -> String {
    sha256_hex_parts(&[text])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_text_equal_fingerprint() {
        assert_eq!(text_fingerprint("hello"), text_fingerprint("hello"));
        assert_ne!(text_fingerprint("hello"), text_fingerprint("hello "));
    }

    #[test]
    fn length_prefix_blocks_concatenation_collisions() {
        // "ab" + "c" vs "a" + "bc" would collide under plain concat.
        assert_ne!(
            sha256_hex_parts(&["ab", "c"]),
            sha256_hex_parts(&["a", "bc"])
        );
    }

    #[test]
    fn fingerprint_is_lowercase_hex() {
        let fp = text_fingerprint("x");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn part_order_is_significant() {
        assert_ne!(
            sha256_hex_parts(&["a", "b"]),
            sha256_hex_parts(&["b", "a"])
        );
    }
}
