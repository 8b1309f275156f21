use axum::{
    http::{header::CACHE_CONTROL, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Hello {
    message: String,
}

#[utoipa::path(
    get,
    path = "/api/hello",
    responses(
        (status = 200, description = "Greeting", body = Hello)
    ),
    tag = "coop"
)]
// liveness probe used by the front-end, no dependencies touched
pub async fn hello() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(Hello {
            message: "Hello Coop!".to_string(),
        }),
    )
}
