//! Session authenticator.
//!
//! Flow Overview: `resolve_identity` reads the signed session cookie on every
//! request and resolves it to a user (or nobody). `login_required` guards the
//! routes that need a user and redirects everyone else to the login page.
//! Login and logout mutate the [`Session`] and hand back a `Set-Cookie` value.

use std::sync::Arc;

use axum::{
    extract::{Extension, Request},
    http::{header::InvalidHeaderValue, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, error, info};

use super::session::{Session, SessionConfig};
use crate::{
    error::{AuthFailure, Error, Result},
    model::{User, UserId},
    store::CredentialStore,
};

pub const LOGIN_PATH: &str = "/auth/login";

/// User resolved from the session for the current request, if any.
#[derive(Clone, Debug, Default)]
pub struct CurrentUser(pub Option<User>);

#[derive(Clone, Debug)]
pub struct Authenticator {
    users: CredentialStore,
    session: SessionConfig,
}

impl Authenticator {
    #[must_use]
    pub fn new(users: CredentialStore, session: SessionConfig) -> Self {
        Self { users, session }
    }

    #[must_use]
    pub fn users(&self) -> &CredentialStore {
        &self.users
    }

    /// Check a username/password pair.
    ///
    /// # Errors
    /// `Auth(UnknownUser)` if no such user exists, `Auth(BadCredentials)` if
    /// the password does not verify, `Database` on store failures.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<UserId> {
        let Some(user) = self.users.find_by_username(username).await? else {
            debug!("login rejected: {}", AuthFailure::UnknownUser);
            return Err(Error::Auth(AuthFailure::UnknownUser));
        };

        if !self.users.hasher().verify(&user.password_hash, password) {
            debug!(user_id = %user.id, "login rejected: {}", AuthFailure::BadCredentials);
            return Err(Error::Auth(AuthFailure::BadCredentials));
        }

        Ok(user.id)
    }

    /// Bind `session` to `user_id`, discarding anything it held before.
    pub fn start_session(&self, session: &mut Session, user_id: UserId) {
        session.bind(user_id, chrono::Utc::now().timestamp());
        info!(user_id = %user_id, "session started");
    }

    pub fn end_session(&self, session: &mut Session) {
        if let Some(user_id) = session.user_id() {
            info!(user_id = %user_id, "session ended");
        }
        session.clear();
    }

    /// Resolve the user named by `session`. A session naming a user that no
    /// longer exists is treated as anonymous.
    ///
    /// # Errors
    /// Returns `Database` if the lookup fails.
    pub async fn current_identity(&self, session: &Session) -> Result<Option<User>> {
        let Some(user_id) = session.user_id() else {
            return Ok(None);
        };

        let user = self.users.find_by_id(user_id).await?;
        if user.is_none() {
            debug!(user_id = %user_id, "session names an unknown user");
        }

        Ok(user)
    }

    #[must_use]
    pub fn load_session(&self, headers: &HeaderMap) -> Session {
        self.session
            .from_headers(headers, chrono::Utc::now().timestamp())
    }

    /// # Errors
    /// Returns an error if the cookie cannot be represented as a header value.
    pub fn session_cookie(&self, session: &Session) -> Result<HeaderValue, InvalidHeaderValue> {
        self.session.set_cookie(session)
    }
}

/// Middleware: load the session and resolve the current user for every request.
pub async fn resolve_identity(
    Extension(auth): Extension<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = auth.load_session(request.headers());

    let user = match auth.current_identity(&session).await {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to resolve session identity: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    request.extensions_mut().insert(session);
    request.extensions_mut().insert(CurrentUser(user));

    next.run(request).await
}

/// Middleware: redirect anonymous requests to the login page, otherwise make
/// the [`User`] available to the handler as `Extension<User>`.
pub async fn login_required(
    Extension(current): Extension<CurrentUser>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(user) = current.0 else {
        debug!(path = %request.uri().path(), "anonymous request redirected to login");
        return Redirect::to(LOGIN_PATH).into_response();
    };

    request.extensions_mut().insert(user);

    next.run(request).await
}
