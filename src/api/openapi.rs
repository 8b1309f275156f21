use super::handlers::{
    health, hello, session, sign_up, ErrorBody, InternalErrorBody,
};
use crate::provisioning::{FieldViolation, SignUpRequest};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        hello::hello,
        session::session,
        sign_up::sign_up
    ),
    components(schemas(
        health::Health,
        hello::Hello,
        session::SessionResponse,
        sign_up::SignUpResponse,
        SignUpRequest,
        FieldViolation,
        ErrorBody,
        InternalErrorBody
    )),
    tags(
        (name = "coop", description = "Tenant sign-up and account provisioning API"),
        (name = "sign-up", description = "Create a tenant account"),
        (name = "session", description = "Inspect the current session cookie"),
        (name = "health", description = "Service and database health")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
