//! Request handlers and the translation of domain errors into responses.
//!
//! Handlers are the only place an [`Error`] becomes an HTTP status. Form
//! handlers re-render their form for `Validation`, `Conflict` and `Auth`;
//! everything else goes through [`error_page`].

pub mod auth;
pub mod blog;
pub mod health;
pub mod root;

use axum::{
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use tracing::error;

use super::{
    identity::Authenticator,
    render::{Page, Renderer},
    session::Session,
};
use crate::{error::Error, model::User};

/// Shown on the login form for any rejected login.
pub const LOGIN_FAILED: &str = "Incorrect username or password.";

#[must_use]
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Auth(_) => StatusCode::UNAUTHORIZED,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Forbidden(_) => StatusCode::FORBIDDEN,
        Error::Database(_) | Error::Password(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render the generic `error` page for `err`. Infrastructure failures are
/// logged and their details never reach the client.
pub(crate) fn error_page(renderer: &Renderer, user: Option<&User>, err: &Error) -> Response {
    let status = status_for(err);
    let message = if status.is_server_error() {
        error!("Request failed: {err}");
        "Internal server error".to_string()
    } else {
        err.to_string()
    };

    renderer.render(
        Page::new("error", user)
            .status(status)
            .with("error", message),
    )
}

/// `303 See Other` to `location`, writing the session cookie.
pub(crate) fn redirect_with_session(
    auth: &Authenticator,
    session: &Session,
    location: &str,
) -> Response {
    match auth.session_cookie(session) {
        Ok(cookie) => (AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(location)).into_response(),
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
