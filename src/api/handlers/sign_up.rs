//! `POST /sign-up`: create a tenant account and start its session.

use super::{error_chain, ErrorBody, InternalErrorBody};
use crate::{
    api::ErrorReporting,
    provisioning::{ProvisionError, Provisioned, Provisioner, SignUpRequest},
    session::session_cookie,
};
use axum::{
    body::Bytes,
    extract::Extension,
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignUpResponse {
    pub success: bool,
    pub message: String,
    pub email: String,
    pub subdomain: String,
}

#[utoipa::path(
    post,
    path = "/sign-up",
    request_body = SignUpRequest,
    responses(
        (status = 200, description = "Account created, session cookie set", body = SignUpResponse),
        (status = 400, description = "Validation error, or email/subdomain already registered", body = ErrorBody),
        (status = 500, description = "Unexpected failure", body = InternalErrorBody)
    ),
    tag = "sign-up"
)]
#[instrument(skip_all)]
pub async fn sign_up(
    provisioner: Extension<Arc<Provisioner>>,
    reporting: Extension<ErrorReporting>,
    body: Bytes,
) -> Response {
    // Parsed by hand so a missing or wrong `Content-Type` is not a rejection.
    let request = match serde_json::from_slice::<SignUpRequest>(&body) {
        Ok(request) => request,
        Err(err) => {
            debug!("Sign-up body rejected: {err}");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("Invalid request body")),
            )
                .into_response();
        }
    };

    match provisioner.provision(request).await {
        Ok(provisioned) => success_response(&provisioned, *reporting),
        Err(err) => error_response(&err, *reporting),
    }
}

fn success_response(provisioned: &Provisioned, reporting: ErrorReporting) -> Response {
    let cookie = match session_cookie(&provisioned.token) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!(
                account_id = %provisioned.account.id,
                "Failed to build session cookie: {err}"
            );
            return internal_response(&err, reporting);
        }
    };

    let body = SignUpResponse {
        success: true,
        message: "Account created successfully".to_string(),
        email: provisioned.account.email.clone(),
        subdomain: provisioned.account.subdomain.clone(),
    };

    (StatusCode::OK, [(SET_COOKIE, cookie)], Json(body)).into_response()
}

/// Map a provisioning failure to its HTTP response.
pub(crate) fn error_response(err: &ProvisionError, reporting: ErrorReporting) -> Response {
    match err {
        ProvisionError::Validation { message, details } => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: message.clone(),
                details: Some(details.clone()),
            }),
        )
            .into_response(),
        ProvisionError::Conflict(conflict) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new(conflict.to_string())),
        )
            .into_response(),
        ProvisionError::Internal { .. } => {
            error!("Sign-up failed: {}", error_chain(err));
            internal_response(err, reporting)
        }
    }
}

fn internal_response(
    err: &(dyn std::error::Error + 'static),
    reporting: ErrorReporting,
) -> Response {
    let body = if reporting.expose_details() {
        InternalErrorBody {
            error: "Internal server error".to_string(),
            message: err.to_string(),
            stack: Some(error_chain(err)),
        }
    } else {
        InternalErrorBody {
            error: "Internal server error".to_string(),
            message: "An unexpected error occurred".to_string(),
            stack: None,
        }
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{account::UniqueField, provisioning::FieldViolation};
    use anyhow::Result;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Result<Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn internal() -> ProvisionError {
        ProvisionError::Internal {
            operation: "account insert",
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "pool timed out",
            )),
        }
    }

    #[tokio::test]
    async fn validation_maps_to_400_with_details() -> Result<()> {
        let err = ProvisionError::Validation {
            message: "Subdomain is required".to_string(),
            details: vec![FieldViolation {
                field: "subdomain".to_string(),
                message: "Subdomain is required".to_string(),
            }],
        };
        let response = error_response(&err, ErrorReporting::production());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await?,
            json!({
                "error": "Subdomain is required",
                "details": [{"field": "subdomain", "message": "Subdomain is required"}]
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn conflict_maps_to_400() -> Result<()> {
        let err = ProvisionError::Conflict(UniqueField::Subdomain.into());
        let response = error_response(&err, ErrorReporting::production());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await?,
            json!({"error": "Subdomain already taken"})
        );
        Ok(())
    }

    #[tokio::test]
    async fn internal_hides_details_in_production() -> Result<()> {
        let response = error_response(&internal(), ErrorReporting::production());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await?;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["message"], "An unexpected error occurred");
        assert!(body.get("stack").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn internal_exposes_details_in_development() -> Result<()> {
        let response = error_response(&internal(), ErrorReporting::development());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await?;
        assert_eq!(body["message"], "account insert failed");
        assert_eq!(
            body["stack"],
            "account insert failed\ncaused by: pool timed out"
        );
        Ok(())
    }
}
