//! Login token hashing, generation and lifetime.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

/// Default lifetime of a login token.
pub const DEFAULT_LOGIN_EXPIRATION_DAYS: i64 = 90;

/// Hash a login token the way stored tokens are hashed: base64 of its SHA-256 digest.
pub fn hash_login_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(digest)
}

/// Generate a fresh random login token (43 url-safe characters).
pub fn generate_login_token() -> String {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// How long a login token stays valid after it was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    pub lifetime: Duration,
}

impl TokenPolicy {
    pub fn from_days(days: i64) -> Self {
        Self {
            lifetime: Duration::days(days),
        }
    }

    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + self.lifetime
    }

    /// A token is expired once its expiry instant lies strictly before `now`.
    pub fn is_expired(&self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.expires_at(issued_at) < now
    }
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self::from_days(DEFAULT_LOGIN_EXPIRATION_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_base64_sha256() {
        assert_eq!(
            hash_login_token("abc"),
            "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
        );
        assert_eq!(hash_login_token("abc123"), hash_login_token("abc123"));
        assert_ne!(hash_login_token("abc123"), hash_login_token("abc124"));
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = generate_login_token();
        let b = generate_login_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }

    #[test]
    fn test_expiry() {
        let policy = TokenPolicy::from_days(1);
        let issued = Utc::now();
        assert_eq!(policy.expires_at(issued), issued + Duration::days(1));
        assert!(!policy.is_expired(issued, issued + Duration::hours(23)));
        assert!(!policy.is_expired(issued, issued + Duration::days(1)));
        assert!(policy.is_expired(issued, issued + Duration::days(1) + Duration::seconds(1)));
    }
}
