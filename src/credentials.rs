//! Password hashing.
//!
//! Digests are bcrypt modular-crypt strings (`$2b$<cost>$...`), salted per call.

use thiserror::Error;

/// Work factor used for new accounts.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("password hashing failed")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// One-way password transform. `verify` must accept every digest `hash` returns.
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext password into a storable digest.
    ///
    /// # Errors
    /// Returns an error if the underlying primitive fails.
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    /// Check a plaintext password against a stored digest.
    ///
    /// # Errors
    /// Returns an error if the digest is malformed.
    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, HashError>;
}

#[derive(Clone, Copy, Debug)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::with_cost(DEFAULT_BCRYPT_COST)
    }

    #[must_use]
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, HashError> {
        Ok(bcrypt::verify(plaintext, digest)?)
    }
}
