use crate::{
    account::{AccountStore, PgAccountStore},
    credentials::{BcryptHasher, CredentialHasher},
    provisioning::Provisioner,
    session::{SessionIssuer, SessionSigner},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

pub(crate) mod handlers;
mod openapi;

pub use openapi::openapi;

/// Controls how much of an internal failure is echoed back to clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorReporting {
    expose_details: bool,
}

impl ErrorReporting {
    /// Generic 500 bodies; details stay in the server log.
    #[must_use]
    pub fn production() -> Self {
        Self {
            expose_details: false,
        }
    }

    /// 500 bodies include the error message and its cause chain.
    #[must_use]
    pub fn development() -> Self {
        Self {
            expose_details: true,
        }
    }

    #[must_use]
    pub fn expose_details(self) -> bool {
        self.expose_details
    }
}

#[derive(Debug)]
pub struct ServerConfig {
    pub jwt_secret: SecretString,
    pub error_reporting: ErrorReporting,
}

/// Everything the handlers need, constructed once at startup.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn AccountStore>,
    pub provisioner: Arc<Provisioner>,
    pub sessions: Arc<SessionIssuer>,
    pub error_reporting: ErrorReporting,
}

impl Services {
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        sessions: Arc<SessionIssuer>,
        error_reporting: ErrorReporting,
    ) -> Self {
        Self::with_hasher(
            store,
            Arc::new(BcryptHasher::new()),
            sessions,
            error_reporting,
        )
    }

    #[must_use]
    pub fn with_hasher(
        store: Arc<dyn AccountStore>,
        hasher: Arc<dyn CredentialHasher>,
        sessions: Arc<SessionIssuer>,
        error_reporting: ErrorReporting,
    ) -> Self {
        let signer: Arc<dyn SessionSigner> = sessions.clone();
        let provisioner = Arc::new(Provisioner::new(Arc::clone(&store), hasher, signer));
        Self {
            store,
            provisioner,
            sessions,
            error_reporting,
        }
    }
}

/// Build the application router.
///
/// `/health` sits outside the CORS layer so its own `OPTIONS` handler answers
/// (with `X-App`) instead of the preflight responder.
pub fn router(services: Services) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_origin(Any);

    let health = Router::new()
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(Extension(Arc::clone(&services.store)));

    Router::new()
        .route("/sign-up", post(handlers::sign_up))
        .route("/api/sign-up", post(handlers::sign_up))
        .route("/api/session", get(handlers::session))
        .route("/api/hello", get(handlers::hello))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(Extension(services.provisioner))
                .layer(Extension(services.sessions))
                .layer(Extension(services.error_reporting))
                .layer(Extension(services.store)),
        )
        .merge(health)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, config: ServerConfig) -> Result<()> {
    let sessions = Arc::new(
        SessionIssuer::new(&config.jwt_secret).context("Invalid session signing key")?,
    );

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(pool));
    let app = router(Services::new(store, sessions, config.error_reporting));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
