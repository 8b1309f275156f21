pub mod health;
pub use self::health::health;

pub mod hello;
pub use self::hello::hello;

pub mod session;
pub use self::session::session;

pub mod sign_up;
pub use self::sign_up::sign_up;

// common types for the handlers
use crate::provisioning::FieldViolation;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use utoipa::ToSchema;

/// Body of every 4xx response.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldViolation>>,
}

impl ErrorBody {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}

/// Body of a 500 response. `stack` is only filled when error details are exposed.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct InternalErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Render an error and every `source()` below it, one per line.
pub(crate) fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str("\ncaused by: ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}
