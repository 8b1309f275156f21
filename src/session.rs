//! Stateless JWT sessions.
//!
//! A session is an HS256 token over `{email, subdomain, iat, exp}` carried in
//! the `auth-token` cookie. There is no server-side session table: a token is
//! valid if and only if its signature checks out and it has not expired.

use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, time::SystemTime};
use thiserror::Error;
use tracing::debug;

pub const AUTH_COOKIE_NAME: &str = "auth-token";

/// Fixed session lifetime: 7 days.
pub const SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub email: String,
    pub subdomain: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session signing key is missing")]
    MissingKey,
    #[error("failed to sign session token")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Signature mismatch, malformed input and expiry all map here.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Invalid token")]
pub struct InvalidTokenError;

/// Signs the session handed out right after an account is created.
pub trait SessionSigner: Send + Sync {
    /// # Errors
    /// Returns an error if the token cannot be signed.
    fn issue(&self, email: &str, subdomain: &str) -> Result<String, SessionError>;
}

pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionIssuer {
    /// Build an issuer from the shared HMAC secret.
    ///
    /// # Errors
    /// Returns [`SessionError::MissingKey`] if the secret is empty.
    pub fn new(secret: &SecretString) -> Result<Self, SessionError> {
        let secret = secret.expose_secret();
        if secret.trim().is_empty() {
            return Err(SessionError::MissingKey);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Sign a session for the given tenant, valid for [`SESSION_TTL_SECONDS`].
    ///
    /// # Errors
    /// Returns an error if token encoding fails.
    pub fn issue(&self, email: &str, subdomain: &str) -> Result<String, SessionError> {
        self.issue_at(email, subdomain, now_unix_seconds())
    }

    /// Same as [`Self::issue`] with an explicit issue time (unix seconds).
    ///
    /// # Errors
    /// Returns an error if token encoding fails.
    pub fn issue_at(
        &self,
        email: &str,
        subdomain: &str,
        issued_at: i64,
    ) -> Result<String, SessionError> {
        let claims = SessionClaims {
            email: email.to_string(),
            subdomain: subdomain.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(SESSION_TTL_SECONDS),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    /// Returns [`InvalidTokenError`] for any bad, foreign or expired token.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, InvalidTokenError> {
        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!("Session token rejected: {err}");
                InvalidTokenError
            })
    }
}

impl SessionSigner for SessionIssuer {
    fn issue(&self, email: &str, subdomain: &str) -> Result<String, SessionError> {
        SessionIssuer::issue(self, email, subdomain)
    }
}

impl fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("key", &"***")
            .field("algorithm", &Algorithm::HS256)
            .finish()
    }
}

/// Build the `Set-Cookie` value carrying a session token.
///
/// # Errors
/// Returns an error if the token contains bytes not allowed in a header.
pub fn session_cookie(token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{AUTH_COOKIE_NAME}={token}; HttpOnly; Secure; SameSite=Strict; Path=/; Max-Age={SESSION_TTL_SECONDS}"
    ))
}

/// Read the session token from the request `Cookie` header, if any.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == AUTH_COOKIE_NAME && !val.trim().is_empty())
                .then(|| val.trim().to_string())
        })
}

pub(crate) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
