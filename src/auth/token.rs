use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Raw entropy per token; hex encoding doubles the visible length.
const TOKEN_BYTES: usize = 32;

/// Fresh opaque bearer token. Only its digest is persisted.
pub fn generate() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// HMAC-SHA-256 of the token under the server secret, hex encoded.
pub fn digest(token: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA-256 accepts keys of any size");
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Cheap shape check before touching the database.
pub fn looks_valid(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-for-unit-tests-only";

    #[test]
    fn test_generated_tokens_are_unique_hex() {
        let a = generate();
        let b = generate();
        assert_ne!(a, b);
        assert!(looks_valid(&a));
        assert!(looks_valid(&b));
    }

    #[test]
    fn test_digest_is_stable_per_secret() {
        let token = generate();
        assert_eq!(digest(&token, TEST_SECRET), digest(&token, TEST_SECRET));
        assert_ne!(digest(&token, TEST_SECRET), digest(&token, "another-secret"));
    }

    #[test]
    fn test_digest_does_not_leak_token() {
        let token = generate();
        let d = digest(&token, TEST_SECRET);
        assert_eq!(d.len(), 64);
        assert_ne!(d, token);
    }

    #[test]
    fn test_looks_valid_rejects_garbage() {
        assert!(!looks_valid(""));
        assert!(!looks_valid("not.a.valid.token"));
        assert!(!looks_valid(&"z".repeat(64)));
    }
}
