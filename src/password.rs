use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::ServiceError;

/// PasswordEncoder
///
/// One-way, salted argon2id hashing. Every call to `encode` draws a fresh salt, so the same
/// plaintext never produces the same stored value twice. `matches` reads the parameters back
/// out of the PHC string, so hashes made with different cost settings still verify.
#[derive(Clone)]
pub struct PasswordEncoder {
    argon2: Argon2<'static>,
}

impl Default for PasswordEncoder {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl PasswordEncoder {
    /// Argon2id with explicit cost parameters (memory in KiB).
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, ServiceError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| ServiceError::Hashing(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn encode(&self, raw: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(raw.as_bytes(), &salt)
            .map_err(|e| ServiceError::Hashing(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    /// `false` for a wrong password and for a stored value that is not a PHC string.
    pub fn matches(&self, raw: &str, encoded: &str) -> bool {
        match PasswordHash::new(encoded) {
            Ok(parsed) => self
                .argon2
                .verify_password(raw.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for PasswordEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordEncoder(argon2)")
    }
}
