use anyhow::{Context, Result};
use argon2::Params;
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use postboard::{
    api::{self, render::Renderer, session::SessionConfig, AppState},
    password::Hasher,
    store,
};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

const FORM: &str = "application/x-www-form-urlencoded";

async fn app() -> Result<Router> {
    let pool = store::in_memory().await?;
    store::migrate(&pool).await?;
    let session = SessionConfig::new(&SecretString::from("integration-test-secret-key"))?;
    let params = Params::new(8, 1, 1, None).map_err(|err| anyhow::anyhow!("{err}"))?;
    let state = AppState::new(pool, session, Hasher::new(params), Renderer::default());
    Ok(api::router(state))
}

async fn send(app: &Router, request: Request<Body>) -> Result<Response> {
    Ok(app.clone().oneshot(request).await?)
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Result<Response> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    send(app, builder.body(Body::empty())?).await
}

async fn post(app: &Router, uri: &str, form: &str, cookie: Option<&str>) -> Result<Response> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, FORM);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    send(app, builder.body(Body::from(form.to_string()))?).await
}

async fn json(response: Response) -> Result<Value> {
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&body)?)
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

/// `name=value` part of the `Set-Cookie` header.
fn session_cookie(response: &Response) -> Result<String> {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .context("missing Set-Cookie")?
        .to_str()?;
    Ok(header
        .split(';')
        .next()
        .context("empty Set-Cookie")?
        .to_string())
}

async fn register(app: &Router, username: &str, password: &str) -> Result<()> {
    let response = post(
        app,
        "/auth/register",
        &format!("username={username}&password={password}"),
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/login"));
    Ok(())
}

async fn login(app: &Router, username: &str, password: &str) -> Result<String> {
    let response = post(
        app,
        "/auth/login",
        &format!("username={username}&password={password}"),
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    session_cookie(&response)
}

async fn signed_up(app: &Router, username: &str, password: &str) -> Result<String> {
    register(app, username, password).await?;
    login(app, username, password).await
}

#[tokio::test]
async fn author_publishes_and_index_lists_newest_first() -> Result<()> {
    let app = app().await?;
    let alice = signed_up(&app, "alice", "pw1").await?;

    for title in ["first", "second"] {
        let response = post(&app, "/create", &format!("title={title}&body=hello"), Some(&alice)).await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/"));
    }

    let page = json(get(&app, "/", Some(&alice)).await?).await?;
    assert_eq!(page["template"], "blog/index");
    assert_eq!(page["context"]["user"]["username"], "alice");
    let posts = page["context"]["posts"].as_array().context("posts")?;
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["title"], "second");
    assert_eq!(posts[1]["title"], "first");
    assert_eq!(posts[0]["username"], "alice");

    // Readable anonymously.
    let page = json(get(&app, "/", None).await?).await?;
    assert_eq!(page["context"]["user"], Value::Null);
    assert_eq!(page["context"]["posts"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn other_users_cannot_modify_a_post() -> Result<()> {
    let app = app().await?;
    let alice = signed_up(&app, "alice", "pw1").await?;
    let bob = signed_up(&app, "bob", "pw2").await?;

    post(&app, "/create", "title=mine&body=original", Some(&alice)).await?;

    let response = get(&app, "/1/update", Some(&bob)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post(&app, "/1/update", "title=hacked&body=x", Some(&bob)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post(&app, "/1/delete", "", Some(&bob)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let page = json(get(&app, "/1", None).await?).await?;
    assert_eq!(page["template"], "blog/view");
    assert_eq!(page["context"]["post"]["title"], "mine");
    assert_eq!(page["context"]["post"]["body"], "original");

    // The author can.
    let response = post(&app, "/1/update", "title=edited&body=new", Some(&alice)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let page = json(get(&app, "/1", None).await?).await?;
    assert_eq!(page["context"]["post"]["title"], "edited");

    let response = post(&app, "/1/delete", "", Some(&alice)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let response = get(&app, "/1", None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn missing_posts_are_not_found() -> Result<()> {
    let app = app().await?;
    let alice = signed_up(&app, "alice", "pw1").await?;

    let response = get(&app, "/99", None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let page = json(response).await?;
    assert_eq!(page["template"], "error");

    let response = post(&app, "/99/update", "title=t&body=b", Some(&alice)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = post(&app, "/99/delete", "", Some(&alice)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn anonymous_requests_are_sent_to_login() -> Result<()> {
    let app = app().await?;

    for response in [
        get(&app, "/create", None).await?,
        post(&app, "/create", "title=t&body=b", None).await?,
        get(&app, "/1/update", None).await?,
        post(&app, "/1/delete", "", None).await?,
    ] {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/auth/login"));
    }

    let page = json(get(&app, "/", None).await?).await?;
    assert_eq!(page["context"]["posts"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn invalid_post_form_is_rerendered_with_input() -> Result<()> {
    let app = app().await?;
    let alice = signed_up(&app, "alice", "pw1").await?;

    let response = post(&app, "/create", "title=&body=draft+text", Some(&alice)).await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = json(response).await?;
    assert_eq!(page["template"], "blog/create");
    assert_eq!(page["context"]["error"], "title required");
    assert_eq!(page["context"]["form"]["body"], "draft text");

    // A missing field behaves like an empty one.
    let response = post(&app, "/create", "body=only", Some(&alice)).await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    post(&app, "/create", "title=ok&body=b", Some(&alice)).await?;
    let response = post(&app, "/1/update", "title=&body=changed", Some(&alice)).await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = json(response).await?;
    assert_eq!(page["template"], "blog/update");
    assert_eq!(page["context"]["form"]["body"], "changed");

    let page = json(get(&app, "/1", None).await?).await?;
    assert_eq!(page["context"]["post"]["title"], "ok");
    Ok(())
}

#[tokio::test]
async fn registration_errors() -> Result<()> {
    let app = app().await?;
    register(&app, "alice", "pw1").await?;

    let response = post(&app, "/auth/register", "username=alice&password=other", None).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    let page: Value = serde_json::from_slice(&body)?;
    assert_eq!(page["template"], "auth/register");
    assert_eq!(page["context"]["error"], "username taken");
    assert_eq!(page["context"]["form"]["username"], "alice");
    assert!(!String::from_utf8(body.to_vec())?.contains("other"));

    let response = post(&app, "/auth/register", "", None).await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = json(response).await?;
    assert_eq!(page["context"]["error"], "username required");

    let response = post(&app, "/auth/register", "username=bob", None).await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = json(response).await?;
    assert_eq!(page["context"]["error"], "password required");
    Ok(())
}

#[tokio::test]
async fn login_failures_look_the_same() -> Result<()> {
    let app = app().await?;
    register(&app, "alice", "pw1").await?;

    let wrong_password = post(&app, "/auth/login", "username=alice&password=nope", None).await?;
    let unknown_user = post(&app, "/auth/login", "username=nobody&password=pw1", None).await?;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    assert!(wrong_password.headers().get(SET_COOKIE).is_none());

    let wrong_password = json(wrong_password).await?;
    let unknown_user = json(unknown_user).await?;
    assert_eq!(wrong_password["template"], "auth/login");
    assert_eq!(
        wrong_password["context"]["error"],
        unknown_user["context"]["error"]
    );
    assert_eq!(
        wrong_password["context"]["error"],
        "Incorrect username or password."
    );
    Ok(())
}

#[tokio::test]
async fn logout_clears_the_session() -> Result<()> {
    let app = app().await?;
    let alice = signed_up(&app, "alice", "pw1").await?;

    let response = post(&app, "/auth/logout", "", Some(&alice)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert!(set_cookie.contains("Max-Age=0"));

    let cleared = session_cookie(&response)?;
    let page = json(get(&app, "/", Some(&cleared)).await?).await?;
    assert_eq!(page["context"]["user"], Value::Null);

    // Logging out again is harmless.
    let response = get(&app, "/auth/logout", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    Ok(())
}

#[tokio::test]
async fn relogin_switches_identity() -> Result<()> {
    let app = app().await?;
    let alice = signed_up(&app, "alice", "pw1").await?;
    register(&app, "bob", "pw2").await?;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(CONTENT_TYPE, FORM)
            .header(COOKIE, &alice)
            .body(Body::from("username=bob&password=pw2"))?,
    )
    .await?;
    let bob = session_cookie(&response)?;

    let page = json(get(&app, "/", Some(&bob)).await?).await?;
    assert_eq!(page["context"]["user"]["username"], "bob");
    Ok(())
}

#[tokio::test]
async fn tampered_cookie_is_anonymous() -> Result<()> {
    let app = app().await?;
    let alice = signed_up(&app, "alice", "pw1").await?;

    let mut forged = alice.clone();
    forged.push('x');

    let page = json(get(&app, "/", Some(&forged)).await?).await?;
    assert_eq!(page["context"]["user"], Value::Null);

    let response = get(&app, "/create", Some(&forged)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/login"));
    Ok(())
}

#[tokio::test]
async fn hello_health_and_docs() -> Result<()> {
    let app = app().await?;

    let response = get(&app, "/hello", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&body[..], b"Hello, World!");

    let response = get(&app, "/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());
    assert!(response.headers().get("X-App").is_some());
    let health = json(response).await?;
    assert_eq!(health["database"], "ok");

    let doc = json(get(&app, "/api-docs/openapi.json", None).await?).await?;
    assert_eq!(doc["info"]["title"], "postboard");
    assert!(doc["paths"]["/{id}/update"].is_object());
    Ok(())
}

#[tokio::test]
async fn request_id_is_propagated() -> Result<()> {
    let app = app().await?;
    let response = send(
        &app,
        Request::builder()
            .uri("/hello")
            .header("x-request-id", "01HZZZZZZZZZZZZZZZZZZZZZZZ")
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("01HZZZZZZZZZZZZZZZZZZZZZZZ")
    );
    Ok(())
}
