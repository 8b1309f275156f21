//! In-process account store with the same uniqueness rules as the
//! PostgreSQL schema. Used by tests and local experiments.

use super::{Account, AccountStore, NewAccount, StoreError, UniqueField};
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<Vec<Account>>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.accounts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.lock().await.is_empty()
    }

    /// Snapshot of every stored account, in insertion order.
    pub async fn accounts(&self) -> Vec<Account> {
        self.accounts.lock().await.clone()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.iter().find(|a| a.subdomain == subdomain).cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        // Check and insert under one lock, like a unique index would.
        let mut accounts = self.accounts.lock().await;
        if accounts.iter().any(|a| a.email == account.email) {
            return Err(StoreError::UniqueViolation(UniqueField::Email));
        }
        if accounts.iter().any(|a| a.subdomain == account.subdomain) {
            return Err(StoreError::UniqueViolation(UniqueField::Subdomain));
        }

        let created = Account {
            id: Uuid::now_v7(),
            full_name: account.full_name,
            email: account.email,
            company_name: account.company_name,
            subdomain: account.subdomain,
            password_hash: account.password_hash,
        };
        accounts.push(created.clone());
        Ok(created)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
