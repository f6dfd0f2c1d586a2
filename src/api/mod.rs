//! HTTP surface: router, middleware stack, and server loop.

pub mod handlers;
pub mod identity;
pub mod openapi;
pub mod render;
pub mod session;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

use self::{
    handlers::{auth, blog, health, root},
    identity::{login_required, resolve_identity, Authenticator},
    render::Renderer,
    session::SessionConfig,
};
use crate::{
    password::Hasher,
    store::{CredentialStore, PostRepository},
};

/// Shared services handed to handlers as request extensions.
#[derive(Clone, Debug)]
pub struct AppState {
    pub pool: SqlitePool,
    pub auth: Arc<Authenticator>,
    pub posts: PostRepository,
    pub renderer: Renderer,
}

impl AppState {
    #[must_use]
    pub fn new(pool: SqlitePool, session: SessionConfig, hasher: Hasher, renderer: Renderer) -> Self {
        let users = CredentialStore::new(pool.clone(), hasher);
        Self {
            auth: Arc::new(Authenticator::new(users, session)),
            posts: PostRepository::new(pool.clone()),
            pool,
            renderer,
        }
    }
}

/// Build the application router.
///
/// Routes on the protected sub-router only run for a logged-in user; everyone
/// else is redirected to the login form.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/create", get(blog::create_form).post(blog::create))
        .route("/:id/update", get(blog::update_form).post(blog::update))
        .route("/:id/delete", post(blog::delete))
        .route_layer(middleware::from_fn(login_required));

    Router::new()
        .route("/", get(blog::index))
        .route("/:id", get(blog::view))
        .route("/auth/register", get(auth::register_form).post(auth::register))
        .route("/auth/login", get(auth::login_form).post(auth::login))
        .route("/auth/logout", get(auth::logout).post(auth::logout))
        .route("/hello", get(root::hello))
        .route("/health", get(health::health))
        .route("/api-docs/openapi.json", get(openapi::document))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state.auth))
                .layer(Extension(state.posts))
                .layer(Extension(state.renderer))
                .layer(Extension(state.pool))
                .layer(middleware::from_fn(resolve_identity)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: AppState) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
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
