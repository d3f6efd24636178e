//! Stable hashing utilities for dedup keys and tenant-scoped naming.

use blake3::Hasher;

const SEP: u8 = 0x1f;

/// Hash an ordered list of string parts into a stable hex digest.
///
/// Each part is separated by a non-printable byte so that `["a", "bc"]`
/// never collides with `["ab", "c"]`.
pub fn hash_parts(parts: &[&str]) -> String {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(&[SEP]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Short (8 hex char) fingerprint of a string, used as a collision-avoidance suffix.
pub fn short_hash(value: &str) -> String {
    blake3::hash(value.as_bytes()).to_hex()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_parts_is_order_and_boundary_sensitive() {
        let a = hash_parts(&["ab", "c"]);
        let b = hash_parts(&["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn short_hash_is_stable() {
        assert_eq!(short_hash("chianti"), short_hash("chianti"));
        assert_ne!(short_hash("chianti"), short_hash("barolo"));
    }
}
