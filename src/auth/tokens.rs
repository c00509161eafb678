//! Opaque bearer tokens for invites and share links. Only the SHA-256 digest is stored.

use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const TOKEN_LEN: usize = 64;
const HINT_LEN: usize = 6;

/// 64 lowercase hex characters from two v4 UUIDs
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub fn token_hint(token: &str) -> String {
    token.chars().take(HINT_LEN).collect()
}

/// Cheap shape check before touching storage
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_well_formed_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert!(is_well_formed(&a));
        assert_ne!(a, b);
        assert_eq!(token_hint(&a), &a[..6]);
    }

    #[test]
    fn hashing_is_stable_and_hides_the_token() {
        let token = generate_token();
        let hash = hash_token(&token);
        assert_eq!(hash, hash_token(&token));
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, token);
    }

    #[test]
    fn malformed_tokens() {
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&"g".repeat(64)));
        assert!(!is_well_formed(&format!("{}/", "a".repeat(63))));
    }
}
