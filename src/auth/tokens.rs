use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

const TOKEN_BYTES: usize = 20; // 160 bits of entropy, hex-encoded

/// Generate an opaque single-use token (confirmation or reset).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest of a reset token as persisted. Only the hash is stored so a leaked
/// users table cannot be replayed against the reset endpoint.
pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// A token with no expiry on record is treated as expired.
pub fn token_window_open(expires_at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    match expires_at {
        Some(expires_at) => expires_at > now,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn tokens_are_forty_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }

    #[test]
    fn reset_digest_is_deterministic_and_not_the_token() {
        let token = "0f5e7a";
        let digest = hash_reset_token(token);
        assert_eq!(digest, hash_reset_token(token));
        assert_ne!(digest, token);
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn window_open_just_inside_expiry() {
        let now = OffsetDateTime::UNIX_EPOCH + Duration::minutes(59);
        let expires = Some(OffsetDateTime::UNIX_EPOCH + Duration::hours(1));
        assert!(token_window_open(expires, now));
    }

    #[test]
    fn window_closed_one_second_past_expiry() {
        let expires = Some(OffsetDateTime::UNIX_EPOCH + Duration::hours(1));
        let now = OffsetDateTime::UNIX_EPOCH + Duration::hours(1) + Duration::seconds(1);
        assert!(!token_window_open(expires, now));
    }

    #[test]
    fn missing_expiry_is_closed() {
        assert!(!token_window_open(None, OffsetDateTime::UNIX_EPOCH));
    }
}
