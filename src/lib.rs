//! # Coop (tenant sign-up and account provisioning)
//!
//! `coop` is the sign-up backend of a multi-tenant product. One endpoint takes a
//! sign-up form, provisions a tenant account keyed by a unique subdomain, and
//! starts a session for it.
//!
//! ## Accounts
//!
//! An account owns a globally unique `email` and a globally unique `subdomain`
//! (`[a-z0-9-]`). Both are enforced by the store at write time; lookups done
//! before the insert only exist to answer early with a clear message.
//!
//! ## Sessions
//!
//! Sessions are stateless HS256 JWTs carried in the `auth-token` cookie and
//! valid for seven days. Nothing is stored server-side.
//!
//! ## Errors
//!
//! Validation failures and conflicts are `400` with a user-facing message.
//! Anything else is a `500` whose detail is only echoed back when the server
//! runs with `--environment development`.

pub mod account;
pub mod api;
pub mod cli;
pub mod credentials;
pub mod provisioning;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
