//! One-way hashing for passwords and token secrets.
//!
//! The same Argon2id parameters cover passwords, refresh-token secrets and
//! reset-token secrets, so no secret is ever persisted or logged in
//! plaintext.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};

use crate::error::AppError;

// OWASP recommended parameters: m=19456 (19 MiB), t=2, p=1
const MEMORY_KIB: u32 = 19_456;
const ITERATIONS: u32 = 2;
const PARALLELISM: u32 = 1;

fn hasher() -> Result<Argon2<'static>, AppError> {
    let params = Params::new(MEMORY_KIB, ITERATIONS, PARALLELISM, None)
        .map_err(|e| AppError::InternalError(format!("Invalid Argon2 params: {}", e)))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hash a secret with a fresh random salt, producing a PHC string.
pub fn hash(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = hasher()?
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AppError::InternalError(format!("Hashing failed: {}", e)))?
        .to_string();

    Ok(digest)
}

/// Generate a high-entropy URL-safe secret for refresh and reset tokens.
/// 48 bytes of OS randomness, 384 bits.
pub fn generate_secret() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 48];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Verify a secret against a stored digest. A malformed digest or a mismatch
/// both return false; this never errors out to the caller.
pub fn verify(secret: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    // Default Argon2 reads the parameters back out of the PHC string.
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let digest = hash("Str0ngPW!").unwrap();
        assert!(verify("Str0ngPW!", &digest));
        assert!(!verify("wrong password", &digest));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash("same secret").unwrap();
        let b = hash("same secret").unwrap();
        assert_ne!(a, b);
        assert!(verify("same secret", &a));
        assert!(verify("same secret", &b));
    }

    #[test]
    fn test_malformed_digest_verifies_false() {
        assert!(!verify("anything", ""));
        assert!(!verify("anything", "not a phc string"));
        assert!(!verify("anything", "$argon2id$truncated"));
    }

    #[test]
    fn test_generated_secrets_are_unique_and_urlsafe() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64); // 48 bytes, base64 no-pad
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_empty_secret_is_allowed() {
        // verify must tolerate any input length
        let digest = hash("secret").unwrap();
        assert!(!verify("", &digest));
    }
}
