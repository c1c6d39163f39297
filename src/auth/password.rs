use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::error::AppError;

/// Longest accepted plaintext, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;
/// Shortest password accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(plain: &str) -> Result<String, AppError> {
    if plain.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::validation(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            AppError::Internal(anyhow::anyhow!("hash password: {e}"))
        })?
        .to_string();
    Ok(hash)
}

/// `false` on mismatch, on an over-long plaintext and on a digest that does not parse.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    if plain.len() > MAX_PASSWORD_BYTES {
        return false;
    }
    let parsed = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "argon2 parse hash error");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn same_input_gets_a_fresh_salt() {
        let a = hash_password("secret1").unwrap();
        let b = hash_password("secret1").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("secret1", &a));
        assert!(verify_password("secret1", &b));
    }

    #[test]
    fn verify_is_false_on_malformed_hash() {
        assert!(!verify_password("anything", "not-a-valid-hash"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn overlong_passwords_are_rejected_not_truncated() {
        let at_limit = "a".repeat(MAX_PASSWORD_BYTES);
        let hash = hash_password(&at_limit).expect("72 bytes is allowed");
        assert!(verify_password(&at_limit, &hash));

        let over = "a".repeat(MAX_PASSWORD_BYTES + 1);
        assert!(matches!(hash_password(&over), Err(AppError::Validation(_))));
        assert!(!verify_password(&over, &hash));
    }
}
