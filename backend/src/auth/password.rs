//! Credential hashing with Argon2id.
//!
//! Hashes are PHC strings, so the algorithm parameters travel with each hash
//! and raising the work factor later leaves existing hashes verifiable.

use super::errors::HashError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

/// Upper bound on accepted password input, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 1024;

/// Argon2id work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

pub struct CredentialHasher {
    argon2: Argon2<'static>,
    /// Hash of a throwaway secret, verified against when the real hash is
    /// missing or unparsable so those paths cost the same as a real check.
    dummy_hash: String,
}

impl CredentialHasher {
    pub fn new(params: HashParams) -> Result<Self, HashError> {
        let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
            .map_err(|e| HashError::Params(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(b"keygate-dummy-credential", &salt)
            .map_err(|e| HashError::Algorithm(e.to_string()))?
            .to_string();

        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(HashError::TooLong);
        }
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError::Algorithm(e.to_string()))
    }

    /// Check a password against a stored hash.
    ///
    /// Returns `false` for a wrong password, an oversized password, or a
    /// malformed hash, and spends a full verification in each case.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed = PasswordHash::new(hash).ok();
        match parsed {
            Some(parsed) if password.len() <= MAX_PASSWORD_BYTES => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            _ => {
                self.verify_dummy(password);
                false
            }
        }
    }

    /// Burn one verification against the throwaway hash. Always `false`.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let truncated = &password.as_bytes()[..password.len().min(MAX_PASSWORD_BYTES)];
        if let Ok(parsed) = PasswordHash::new(&self.dummy_hash) {
            let _ = self.argon2.verify_password(truncated, &parsed);
        }
        false
    }
}

#[cfg(test)]
pub(crate) fn test_params() -> HashParams {
    HashParams {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    }
}
