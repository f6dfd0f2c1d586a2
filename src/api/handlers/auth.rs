//! Registration, login and logout.

use std::sync::Arc;

use axum::{
    extract::{Extension, Form},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{error_page, redirect_with_session, status_for, LOGIN_FAILED};
use crate::{
    api::{
        identity::{Authenticator, CurrentUser, LOGIN_PATH},
        render::{Page, Renderer},
        session::Session,
    },
    error::Error,
};

/// Username/password form. Missing fields read as empty strings.
#[derive(ToSchema, Deserialize, Default)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

fn credentials_page(
    template: &'static str,
    current: &CurrentUser,
    username: &str,
    error: Option<&str>,
) -> Page {
    Page::new(template, current.0.as_ref())
        .with("form", json!({ "username": username }))
        .with("error", error)
}

#[utoipa::path(
    get,
    path = "/auth/register",
    responses((status = 200, description = "Registration form")),
    tag = "auth"
)]
pub async fn register_form(
    Extension(renderer): Extension<Renderer>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    renderer.render(credentials_page("auth/register", &current, "", None))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body(content = Credentials, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Registered, redirect to the login form"),
        (status = 409, description = "Username already taken"),
        (status = 422, description = "Username or password missing"),
    ),
    tag = "auth"
)]
#[instrument(skip(auth, renderer, current, form), fields(username = %form.username))]
pub async fn register(
    Extension(auth): Extension<Arc<Authenticator>>,
    Extension(renderer): Extension<Renderer>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<Credentials>,
) -> Response {
    match auth.users().register(&form.username, &form.password).await {
        Ok(_) => Redirect::to(LOGIN_PATH).into_response(),
        Err(err @ (Error::Validation(msg) | Error::Conflict(msg))) => renderer.render(
            credentials_page("auth/register", &current, &form.username, Some(msg))
                .status(status_for(&err)),
        ),
        Err(err) => error_page(&renderer, current.0.as_ref(), &err),
    }
}

#[utoipa::path(
    get,
    path = "/auth/login",
    responses((status = 200, description = "Login form")),
    tag = "auth"
)]
pub async fn login_form(
    Extension(renderer): Extension<Renderer>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    renderer.render(credentials_page("auth/login", &current, "", None))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body(content = Credentials, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Logged in, session cookie set, redirect to the index"),
        (status = 401, description = "Incorrect username or password"),
    ),
    tag = "auth"
)]
#[instrument(skip(auth, renderer, current, session, form), fields(username = %form.username))]
pub async fn login(
    Extension(auth): Extension<Arc<Authenticator>>,
    Extension(renderer): Extension<Renderer>,
    Extension(current): Extension<CurrentUser>,
    Extension(mut session): Extension<Session>,
    Form(form): Form<Credentials>,
) -> Response {
    match auth.authenticate(&form.username, &form.password).await {
        Ok(user_id) => {
            auth.start_session(&mut session, user_id);
            info!(user_id = %user_id, "user logged in");
            redirect_with_session(&auth, &session, "/")
        }
        Err(Error::Auth(_)) => renderer.render(
            credentials_page("auth/login", &current, &form.username, Some(LOGIN_FAILED))
                .status(StatusCode::UNAUTHORIZED),
        ),
        Err(err) => error_page(&renderer, current.0.as_ref(), &err),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 303, description = "Session cleared, redirect to the index")),
    tag = "auth"
)]
pub async fn logout(
    Extension(auth): Extension<Arc<Authenticator>>,
    Extension(mut session): Extension<Session>,
) -> Response {
    auth.end_session(&mut session);
    redirect_with_session(&auth, &session, "/")
}
