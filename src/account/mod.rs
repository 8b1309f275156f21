//! Tenant accounts and the store that owns them.
//!
//! The store enforces two unique constraints (`email`, `subdomain`) at write
//! time. Callers may look accounts up before inserting, but only the error
//! returned by [`AccountStore::create`] is authoritative for conflicts.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryAccountStore;
pub use self::postgres::PgAccountStore;

/// A persisted tenant account.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub company_name: String,
    pub subdomain: String,
    pub password_hash: String,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("company_name", &self.company_name)
            .field("subdomain", &self.subdomain)
            .field("password_hash", &"***")
            .finish()
    }
}

/// Fields for a new account row. `password_hash` must already be hashed.
#[derive(Clone)]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
    pub company_name: String,
    pub subdomain: String,
    pub password_hash: String,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("company_name", &self.company_name)
            .field("subdomain", &self.subdomain)
            .field("password_hash", &"***")
            .finish()
    }
}

/// Column guarded by a unique constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Subdomain,
}

impl UniqueField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Subdomain => "subdomain",
        }
    }
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    UniqueViolation(UniqueField),
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Account>, StoreError>;

    /// Insert a new account.
    ///
    /// Returns [`StoreError::UniqueViolation`] when another account already
    /// holds the email or subdomain, regardless of any earlier lookups.
    async fn create(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Cheap liveness check used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}
