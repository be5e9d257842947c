use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Hash a plaintext password with a fresh random salt. Called only from the
/// two places a password is set: registration and password reset.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hashing failed");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_differs_from_plaintext_and_verifies() {
        let hash = hash_password("secret1").expect("hashing should succeed");
        assert_ne!(hash, "secret1");
        assert!(verify_password("secret1", &hash).expect("verify should succeed"));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let hash = hash_password("secret1").expect("hashing should succeed");
        assert!(!verify_password("secret2", &hash).expect("verify should not error"));
    }

    #[test]
    fn same_password_hashes_to_distinct_values() {
        // per-hash random salt
        let a = hash_password("secret1").unwrap();
        let b = hash_password("secret1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_an_error_not_a_mismatch() {
        assert!(verify_password("anything", "garbage").is_err());
    }
}
