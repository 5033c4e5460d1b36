//! Password hashing and verification using Argon2id

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;
use tracing::warn;

/// Error types for password operations
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Work factor parameters rejected by Argon2
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),

    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),
}

/// Argon2 work factor
///
/// Defaults follow the OWASP recommendation baked into the argon2 crate:
/// - Memory cost: 19456 KiB (19 MiB)
/// - Time cost: 2 iterations
/// - Parallelism: 1 thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

// Hashed once per hasher so unknown-account logins cost the same as real ones.
const DUMMY_PASSWORD: &str = "credguard-timing-equalizer";

/// Salted, adaptive password hasher
///
/// Produces PHC-formatted strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`).
/// The parameters are embedded in each hash, so changing the work factor
/// does not invalidate hashes already in storage.
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(params: HashingParams) -> Result<Self, PasswordError> {
        let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let dummy_hash = hash_with(&argon2, DUMMY_PASSWORD)?;

        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a password with a fresh random salt
    ///
    /// # Example
    /// ```
    /// use credguard_auth::password::{HashingParams, PasswordHasher};
    ///
    /// let hasher = PasswordHasher::new(HashingParams::default()).unwrap();
    /// let hash = hasher.hash("MySecurePassword123!").unwrap();
    /// assert!(hash.starts_with("$argon2id$"));
    /// ```
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon2, password)
    }

    /// Verify a password against a stored hash
    ///
    /// Never fails: a malformed stored hash, an empty password or any
    /// mismatch all yield `false`.
    ///
    /// # Example
    /// ```
    /// use credguard_auth::password::{HashingParams, PasswordHasher};
    ///
    /// let hasher = PasswordHasher::new(HashingParams::default()).unwrap();
    /// let hash = hasher.hash("MyPassword123!").unwrap();
    /// assert!(hasher.verify("MyPassword123!", &hash));
    /// assert!(!hasher.verify("WrongPassword", &hash));
    /// ```
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        if password.is_empty() {
            return false;
        }

        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password hash could not be parsed: {}", e);
                return false;
            }
        };

        match self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
        {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(e) => {
                warn!("Password verification error: {}", e);
                false
            }
        }
    }

    /// Burn one verification against a throwaway hash. Always `false`.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let _ = self.verify(password, &self.dummy_hash);
        false
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params = self.argon2.params();
        f.debug_struct("PasswordHasher")
            .field("m_cost", &params.m_cost())
            .field("t_cost", &params.t_cost())
            .field("p_cost", &params.p_cost())
            .finish()
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}
