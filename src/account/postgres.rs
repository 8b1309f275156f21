//! PostgreSQL-backed account store.
//!
//! Schema lives in `db/sql/01_coop.sql`. Unique violations (`SQLSTATE 23505`)
//! are mapped back to the conflicting column through the constraint name.

use super::{Account, AccountStore, NewAccount, StoreError, UniqueField};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::{info_span, Instrument};

pub(crate) const EMAIL_CONSTRAINT: &str = "accounts_email_key";
pub(crate) const SUBDOMAIN_CONSTRAINT: &str = "accounts_subdomain_key";

#[derive(Clone, Debug)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_by(&self, query: &'static str, value: &str) -> Result<Option<Account>, StoreError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(account_from_row).transpose()?)
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.find_by(
            "SELECT id, full_name, email, company_name, subdomain, password_hash FROM accounts WHERE email = $1",
            email,
        )
        .await
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Account>, StoreError> {
        self.find_by(
            "SELECT id, full_name, email, company_name, subdomain, password_hash FROM accounts WHERE subdomain = $1",
            subdomain,
        )
        .await
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let query = r"
            INSERT INTO accounts
                (full_name, email, company_name, subdomain, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, full_name, email, company_name, subdomain, password_hash
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&account.full_name)
            .bind(&account.email)
            .bind(&account.company_name)
            .bind(&account.subdomain)
            .bind(&account.password_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(account_from_row(&row)?),
            Err(err) => match unique_violation_field(&err) {
                Some(field) => Err(StoreError::UniqueViolation(field)),
                None => Err(StoreError::Database(err)),
            },
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        company_name: row.try_get("company_name")?,
        subdomain: row.try_get("subdomain")?,
        password_hash: row.try_get("password_hash")?,
    })
}

/// Resolve a unique violation to the column it protects.
///
/// Returns `None` for any other error, including unique violations on
/// constraints this store does not know about.
fn unique_violation_field(err: &sqlx::Error) -> Option<UniqueField> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    match db_err.constraint() {
        Some(EMAIL_CONSTRAINT) => Some(UniqueField::Email),
        Some(SUBDOMAIN_CONSTRAINT) => Some(UniqueField::Subdomain),
        _ => None,
    }
}
