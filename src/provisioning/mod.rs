//! Tenant account provisioning.
//!
//! Flow for one sign-up request:
//! 1) Validate input (no store access on failure).
//! 2) Pre-check email, then subdomain, against the store.
//! 3) Hash the password on the blocking pool.
//! 4) Insert the account. A unique violation here is reported exactly like a
//!    pre-check hit, so concurrent sign-ups for the same tenant resolve to one
//!    winner and one conflict.
//! 5) Sign a 7-day session for the created account.
//!
//! If step 5 fails the account row stays in place and the failure is surfaced
//! as an internal error; the user can log in once signing works again.

use crate::{
    account::{Account, AccountStore, NewAccount, StoreError, UniqueField},
    credentials::{CredentialHasher, HashError},
    session::{SessionError, SessionSigner},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::{error::Error as StdError, fmt, sync::Arc};
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

pub mod validation;

pub use self::validation::FieldViolation;

/// Sign-up payload. Missing and `null` fields deserialize as empty strings so
/// they are reported by validation instead of failing to parse.
#[derive(ToSchema, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SignUpRequest {
    #[serde(deserialize_with = "null_as_empty")]
    pub full_name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub company_name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub subdomain: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub password: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("company_name", &self.company_name)
            .field("subdomain", &self.subdomain)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    #[error("Email already exists")]
    Email,
    #[error("Subdomain already taken")]
    Subdomain,
}

impl From<UniqueField> for Conflict {
    fn from(field: UniqueField) -> Self {
        match field {
            UniqueField::Email => Self::Email,
            UniqueField::Subdomain => Self::Subdomain,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldViolation>,
    },
    #[error("{0}")]
    Conflict(Conflict),
    #[error("{operation} failed")]
    Internal {
        operation: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ProvisionError {
    fn validation(details: Vec<FieldViolation>) -> Self {
        let message = details
            .first()
            .map_or_else(|| "Invalid input".to_string(), |v| v.message.clone());
        Self::Validation { message, details }
    }

    fn internal(operation: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Internal {
            operation,
            source: Box::new(source),
        }
    }
}

/// A freshly provisioned account plus its signed session token.
#[derive(Debug)]
pub struct Provisioned {
    pub account: Account,
    pub token: String,
}

pub struct Provisioner {
    store: Arc<dyn AccountStore>,
    hasher: Arc<dyn CredentialHasher>,
    sessions: Arc<dyn SessionSigner>,
}

impl Provisioner {
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        hasher: Arc<dyn CredentialHasher>,
        sessions: Arc<dyn SessionSigner>,
    ) -> Self {
        Self {
            store,
            hasher,
            sessions,
        }
    }

    /// Validate, create the account, and issue its session.
    ///
    /// # Errors
    /// - [`ProvisionError::Validation`] for malformed input (store untouched).
    /// - [`ProvisionError::Conflict`] when the email or subdomain is taken.
    /// - [`ProvisionError::Internal`] for store, hashing or signing failures.
    #[instrument(skip_all, fields(subdomain = %request.subdomain))]
    pub async fn provision(&self, request: SignUpRequest) -> Result<Provisioned, ProvisionError> {
        let violations = validation::violations(&request);
        if !violations.is_empty() {
            info!(count = violations.len(), "Sign-up input rejected");
            return Err(ProvisionError::validation(violations));
        }

        let existing = self
            .store
            .find_by_email(&request.email)
            .await
            .map_err(|err| store_failure("email lookup", err))?;
        if existing.is_some() {
            warn!("Email already registered");
            return Err(ProvisionError::Conflict(Conflict::Email));
        }

        let existing = self
            .store
            .find_by_subdomain(&request.subdomain)
            .await
            .map_err(|err| store_failure("subdomain lookup", err))?;
        if existing.is_some() {
            warn!("Subdomain already registered");
            return Err(ProvisionError::Conflict(Conflict::Subdomain));
        }

        let SignUpRequest {
            full_name,
            email,
            company_name,
            subdomain,
            password,
        } = request;

        let password_hash = self.hash_password(password).await?;

        let account = match self
            .store
            .create(NewAccount {
                full_name,
                email,
                company_name,
                subdomain,
                password_hash,
            })
            .await
        {
            Ok(account) => account,
            Err(StoreError::UniqueViolation(field)) => {
                warn!(%field, "Unique constraint hit on insert after pre-checks passed");
                return Err(ProvisionError::Conflict(field.into()));
            }
            Err(err) => return Err(store_failure("account insert", err)),
        };

        let token = self
            .sessions
            .issue(&account.email, &account.subdomain)
            .map_err(|err: SessionError| {
                error!(
                    account_id = %account.id,
                    "Session issuance failed after account creation: {err}"
                );
                ProvisionError::internal("session issuance", err)
            })?;

        info!(account_id = %account.id, "Account provisioned");

        Ok(Provisioned { account, token })
    }

    async fn hash_password(&self, password: String) -> Result<String, ProvisionError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|err| {
                error!("Password hashing task failed: {err}");
                ProvisionError::internal("password hashing", err)
            })?
            .map_err(|err: HashError| {
                error!("Password hashing failed: {err}");
                ProvisionError::internal("password hashing", err)
            })
    }
}

impl fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner").finish_non_exhaustive()
    }
}

fn store_failure(operation: &'static str, err: StoreError) -> ProvisionError {
    error!("Account store {operation} failed: {err:?}");
    ProvisionError::internal(operation, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{account::MemoryAccountStore, credentials::BcryptHasher, session::SessionIssuer};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps a store and counts calls.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryAccountStore,
        lookups: AtomicUsize,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl AccountStore for CountingStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_email(email).await
        }

        async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Account>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_subdomain(subdomain).await
        }

        async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.create(account).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// Pre-checks never see existing rows, as if another request inserted
    /// between the lookups and the write.
    struct RacingStore {
        inner: MemoryAccountStore,
    }

    #[async_trait]
    impl AccountStore for RacingStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<Account>, StoreError> {
            Ok(None)
        }

        async fn find_by_subdomain(&self, _subdomain: &str) -> Result<Option<Account>, StoreError> {
            Ok(None)
        }

        async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
            self.inner.create(account).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct UnavailableStore;

    #[async_trait]
    impl AccountStore for UnavailableStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<Account>, StoreError> {
            Ok(None)
        }

        async fn find_by_subdomain(&self, _subdomain: &str) -> Result<Option<Account>, StoreError> {
            Ok(None)
        }

        async fn create(&self, _account: NewAccount) -> Result<Account, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    struct BrokenHasher;

    impl CredentialHasher for BrokenHasher {
        fn hash(&self, _plaintext: &str) -> Result<String, HashError> {
            Err(HashError::Bcrypt(bcrypt::BcryptError::CostNotAllowed(99)))
        }

        fn verify(&self, _plaintext: &str, _digest: &str) -> Result<bool, HashError> {
            Ok(false)
        }
    }

    struct BrokenSigner;

    impl SessionSigner for BrokenSigner {
        fn issue(&self, _email: &str, _subdomain: &str) -> Result<String, SessionError> {
            Err(SessionError::Signing(
                jsonwebtoken::errors::ErrorKind::InvalidKeyFormat.into(),
            ))
        }
    }

    fn sessions() -> Result<Arc<SessionIssuer>> {
        Ok(Arc::new(SessionIssuer::new(&SecretString::from(
            "provisioning-test-secret".to_string(),
        ))?))
    }

    fn provisioner(store: Arc<dyn AccountStore>) -> Result<Provisioner> {
        Ok(Provisioner::new(
            store,
            Arc::new(BcryptHasher::with_cost(4)),
            sessions()?,
        ))
    }

    fn request() -> SignUpRequest {
        SignUpRequest {
            full_name: "A".to_string(),
            email: "a@b.com".to_string(),
            company_name: "C".to_string(),
            subdomain: "ab-1".to_string(),
            password: "longpassword".to_string(),
        }
    }

    #[tokio::test]
    async fn provisions_account_and_session() -> Result<()> {
        let store = Arc::new(CountingStore::default());
        let provisioner = provisioner(store.clone())?;

        let provisioned = provisioner.provision(request()).await?;

        assert_eq!(provisioned.account.subdomain, "ab-1");
        assert_eq!(provisioned.account.email, "a@b.com");
        assert_ne!(provisioned.account.password_hash, "longpassword");
        assert!(BcryptHasher::with_cost(4)
            .verify("longpassword", &provisioned.account.password_hash)?);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner.len().await, 1);

        let claims = sessions()?.verify(&provisioned.token)?;
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.subdomain, "ab-1");
        Ok(())
    }

    #[tokio::test]
    async fn invalid_input_never_touches_store() -> Result<()> {
        let store = Arc::new(CountingStore::default());
        let provisioner = provisioner(store.clone())?;

        let mut req = request();
        req.subdomain = "AB".to_string();
        req.password = "short".to_string();

        match provisioner.provision(req).await {
            Err(ProvisionError::Validation { message, details }) => {
                assert_eq!(
                    message,
                    "Subdomain can only contain lowercase letters, numbers, and hyphens"
                );
                assert_eq!(details.len(), 2);
            }
            other => bail!("expected validation error, got {other:?}"),
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_request_conflicts_on_email_every_time() -> Result<()> {
        let store = Arc::new(CountingStore::default());
        let provisioner = provisioner(store.clone())?;
        provisioner.provision(request()).await?;

        for _ in 0..2 {
            let err = provisioner.provision(request()).await;
            assert!(matches!(
                err,
                Err(ProvisionError::Conflict(Conflict::Email))
            ));
        }
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn taken_subdomain_conflicts() -> Result<()> {
        let store = Arc::new(CountingStore::default());
        let provisioner = provisioner(store.clone())?;
        provisioner.provision(request()).await?;

        let mut req = request();
        req.email = "other@b.com".to_string();
        let err = provisioner.provision(req).await;
        assert!(matches!(
            err,
            Err(ProvisionError::Conflict(Conflict::Subdomain))
        ));
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn write_time_violation_is_a_conflict() -> Result<()> {
        let store = Arc::new(RacingStore {
            inner: MemoryAccountStore::new(),
        });
        let provisioner = provisioner(store.clone())?;
        provisioner.provision(request()).await?;

        let mut req = request();
        req.email = "late@b.com".to_string();
        let err = provisioner.provision(req).await;
        assert!(matches!(
            err,
            Err(ProvisionError::Conflict(Conflict::Subdomain))
        ));

        let err = provisioner.provision(request()).await;
        assert!(matches!(
            err,
            Err(ProvisionError::Conflict(Conflict::Email))
        ));
        assert_eq!(store.inner.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_signups_have_one_winner() -> Result<()> {
        let store = Arc::new(RacingStore {
            inner: MemoryAccountStore::new(),
        });
        let provisioner = Arc::new(provisioner(store.clone())?);

        let mut handles = Vec::new();
        for i in 0..4 {
            let provisioner = Arc::clone(&provisioner);
            handles.push(tokio::spawn(async move {
                let mut req = request();
                req.email = format!("user{i}@b.com");
                provisioner.provision(req).await
            }));
        }

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await? {
                Ok(_) => created += 1,
                Err(ProvisionError::Conflict(Conflict::Subdomain)) => conflicts += 1,
                Err(other) => bail!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 3);
        assert_eq!(store.inner.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn store_failure_is_internal() -> Result<()> {
        let provisioner = provisioner(Arc::new(UnavailableStore))?;
        match provisioner.provision(request()).await {
            Err(ProvisionError::Internal { operation, .. }) => {
                assert_eq!(operation, "account insert");
            }
            other => bail!("expected internal error, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn hashing_failure_is_internal_and_writes_nothing() -> Result<()> {
        let store = Arc::new(CountingStore::default());
        let provisioner = Provisioner::new(store.clone(), Arc::new(BrokenHasher), sessions()?);
        match provisioner.provision(request()).await {
            Err(ProvisionError::Internal { operation, .. }) => {
                assert_eq!(operation, "password hashing");
            }
            other => bail!("expected internal error, got {other:?}"),
        }
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn conflict_messages() {
        assert_eq!(Conflict::Email.to_string(), "Email already exists");
        assert_eq!(Conflict::Subdomain.to_string(), "Subdomain already taken");
        assert_eq!(Conflict::from(UniqueField::Subdomain), Conflict::Subdomain);
    }

    #[test]
    fn missing_fields_deserialize_empty() -> Result<()> {
        let req: SignUpRequest = serde_json::from_str(r#"{"email":"a@b.com"}"#)?;
        assert_eq!(req.email, "a@b.com");
        assert!(req.full_name.is_empty());
        assert_eq!(
            validation::violations(&req)
                .first()
                .map(|v| v.message.as_str()),
            Some("Full name is required")
        );
        Ok(())
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", request());
        assert!(!rendered.contains("longpassword"));
    }

    #[tokio::test]
    async fn signing_failure_keeps_account_and_is_internal() -> Result<()> {
        let store = Arc::new(CountingStore::default());
        let provisioner = Provisioner::new(
            store.clone(),
            Arc::new(BcryptHasher::with_cost(4)),
            Arc::new(BrokenSigner),
        );
        match provisioner.provision(request()).await {
            Err(ProvisionError::Internal { operation, .. }) => {
                assert_eq!(operation, "session issuance");
            }
            other => bail!("expected internal error, got {other:?}"),
        }
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert!(store.inner.find_by_email("a@b.com").await?.is_some());
        Ok(())
    }

    #[test]
    fn null_and_missing_fields_parse_as_empty() -> Result<()> {
        let request: SignUpRequest = serde_json::from_str(
            r#"{"fullName": null, "email": "a@b.com", "subdomain": null}"#,
        )?;
        assert_eq!(request.full_name, "");
        assert_eq!(request.email, "a@b.com");
        assert_eq!(request.company_name, "");
        assert_eq!(request.subdomain, "");
        assert_eq!(request.password, "");

        assert!(serde_json::from_str::<SignUpRequest>(r#"{"fullName": 7}"#).is_err());
        Ok(())
    }
}
