//! Session introspection for the `auth-token` cookie.

use super::ErrorBody;
use crate::session::{extract_session_token, SessionIssuer};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SessionResponse {
    pub email: String,
    pub subdomain: String,
    /// Unix seconds.
    pub expires_at: i64,
}

#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No session cookie"),
        (status = 401, description = "Session token is invalid or expired", body = ErrorBody)
    ),
    tag = "session"
)]
pub async fn session(headers: HeaderMap, sessions: Extension<Arc<SessionIssuer>>) -> Response {
    // no cookie is "no session", not an error
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match sessions.verify(&token) {
        Ok(claims) => (
            StatusCode::OK,
            Json(SessionResponse {
                email: claims.email,
                subdomain: claims.subdomain,
                expires_at: claims.exp,
            }),
        )
            .into_response(),
        Err(err) => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new(err.to_string())),
        )
            .into_response(),
    }
}
