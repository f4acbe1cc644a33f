//! Deterministic document keys derived from identifier tuples.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest (128 bits).
const KEY_HEX_LEN: usize = 32;

/// Derives a stable key from an ordered list of parts.
///
/// Each part is length-prefixed before hashing, so `["ab", "c"]` and
/// `["a", "bc"]` never collide regardless of the characters ids contain.
pub fn digest_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();

    let mut key = String::with_capacity(KEY_HEX_LEN);
    for byte in digest.iter().take(KEY_HEX_LEN / 2) {
        key.push_str(&format!("{:02x}", byte));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_key_is_deterministic() {
        assert_eq!(digest_key(&["a", "b"]), digest_key(&["a", "b"]));
    }

    #[test]
    fn digest_key_depends_on_order() {
        assert_ne!(digest_key(&["a", "b"]), digest_key(&["b", "a"]));
    }

    #[test]
    fn digest_key_length_prefix_prevents_boundary_collisions() {
        assert_ne!(digest_key(&["ab", "c"]), digest_key(&["a", "bc"]));
    }

    #[test]
    fn digest_key_has_fixed_length() {
        assert_eq!(digest_key(&["x"]).len(), KEY_HEX_LEN);
    }
}
