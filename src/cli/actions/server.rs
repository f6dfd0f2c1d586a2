use crate::{
    api::{self, render::Renderer, session::SessionConfig, AppState},
    cli::telemetry,
    password::Hasher,
    store,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub secret_key: SecretString,
    pub session_ttl_seconds: i64,
    pub cookie_secure: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database cannot be opened or migrated, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let session = SessionConfig::new(&args.secret_key)
        .context("Invalid session secret key")?
        .with_ttl_seconds(args.session_ttl_seconds)
        .with_cookie_secure(args.cookie_secure);

    debug!("Session config: {:?}", session);

    let pool = store::connect(&args.dsn).await?;
    store::migrate(&pool).await?;

    let state = AppState::new(pool, session, Hasher::default(), Renderer::default());

    let result = api::new(args.port, state).await;

    telemetry::shutdown_tracer();

    result
}
