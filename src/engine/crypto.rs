use rand::RngCore;
use sha2::{Digest, Sha256};

const ACCESS_TOKEN_PREFIX: &str = "at_";
const REFRESH_TOKEN_PREFIX: &str = "rt_";
const TOKEN_BYTES: usize = 16;

/// One-way password digest: SHA-256 hex of the trimmed password.
///
/// Deterministic so a stored hash can be compared directly. Never log the input.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.trim().as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    constant_time_eq(hash_password(password).as_bytes(), stored_hash.trim().as_bytes())
}

/// Fresh `(access_token, refresh_token)` pair.
pub fn generate_token_pair() -> (String, String) {
    (
        format!("{ACCESS_TOKEN_PREFIX}{}", random_hex(TOKEN_BYTES)),
        format!("{REFRESH_TOKEN_PREFIX}{}", random_hex(TOKEN_BYTES)),
    )
}

/// Generate `n` random bytes and return them hex-encoded.
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_deterministic_and_trimmed() {
        let hash = hash_password("pw");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_password("  pw "));
        assert_ne!(hash, hash_password("pw2"));
        assert!(verify_password("pw", &hash));
        assert!(!verify_password("nope", &hash));
    }

    #[test]
    fn token_pair_is_prefixed_and_distinct() {
        let (access, refresh) = generate_token_pair();
        assert!(access.starts_with("at_"));
        assert!(refresh.starts_with("rt_"));
        assert_eq!(access.len(), 3 + TOKEN_BYTES * 2);
        assert_ne!(access[3..], refresh[3..]);
    }
}
