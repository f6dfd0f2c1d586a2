//! Map parsed CLI arguments to an [`Action`].

use crate::api::session::MIN_SECRET_KEY_LEN;
use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{session, CMD_INIT_DB};
use anyhow::{bail, Context, Result};
use secrecy::ExposeSecret;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(sub_m) = matches.subcommand_matches(CMD_INIT_DB) {
        return Ok(Action::InitDb { dsn: dsn(sub_m)? });
    }

    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = dsn(matches)?;

    let session_opts = session::Options::parse(matches)?;
    if session_opts.secret_key.expose_secret().len() < MIN_SECRET_KEY_LEN {
        bail!("--secret-key must be at least {MIN_SECRET_KEY_LEN} bytes");
    }

    Ok(Action::Server(Args {
        port,
        dsn,
        secret_key: session_opts.secret_key,
        session_ttl_seconds: session_opts.ttl_seconds,
        cookie_secure: session_opts.cookie_secure,
    }))
}

fn dsn(matches: &clap::ArgMatches) -> Result<String> {
    matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")
}
