//! Post listing, viewing, and owner-only editing.

use axum::{
    extract::{Extension, Form, Path},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use super::{error_page, status_for};
use crate::{
    api::{
        identity::CurrentUser,
        render::{Page, Renderer},
    },
    error::Error,
    model::{Post, PostId, User},
    store::{OwnershipCheck, PostRepository},
};

/// Title/body form. Missing fields read as empty strings.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default, Clone)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "All posts, newest first", body = [Post])),
    tag = "blog"
)]
pub async fn index(
    Extension(posts): Extension<PostRepository>,
    Extension(renderer): Extension<Renderer>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let user = current.0.as_ref();
    match posts.list_all().await {
        Ok(list) => renderer.render(Page::new("blog/index", user).with("posts", list)),
        Err(err) => error_page(&renderer, user, &err),
    }
}

#[utoipa::path(
    get,
    path = "/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "A single post", body = Post),
        (status = 404, description = "Post not found"),
    ),
    tag = "blog"
)]
pub async fn view(
    Path(id): Path<i64>,
    Extension(posts): Extension<PostRepository>,
    Extension(renderer): Extension<Renderer>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let user = current.0.as_ref();
    match posts.get_or_fail(PostId(id), OwnershipCheck::Skip).await {
        Ok(post) => renderer.render(Page::new("blog/view", user).with("post", post)),
        Err(err) => error_page(&renderer, user, &err),
    }
}

#[utoipa::path(
    get,
    path = "/create",
    responses(
        (status = 200, description = "Empty post form"),
        (status = 303, description = "Not logged in, redirect to the login form"),
    ),
    tag = "blog"
)]
pub async fn create_form(
    Extension(renderer): Extension<Renderer>,
    Extension(user): Extension<User>,
) -> Response {
    renderer.render(
        Page::new("blog/create", Some(&user))
            .with("form", PostForm::default())
            .with("error", None::<&str>),
    )
}

#[utoipa::path(
    post,
    path = "/create",
    request_body(content = PostForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Post created, redirect to the index"),
        (status = 422, description = "Title missing"),
    ),
    tag = "blog"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    Extension(posts): Extension<PostRepository>,
    Extension(renderer): Extension<Renderer>,
    Extension(user): Extension<User>,
    Form(form): Form<PostForm>,
) -> Response {
    match posts.create(user.id, &form.title, &form.body).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err @ Error::Validation(msg)) => renderer.render(
            Page::new("blog/create", Some(&user))
                .status(status_for(&err))
                .with("form", form)
                .with("error", msg),
        ),
        Err(err) => error_page(&renderer, Some(&user), &err),
    }
}

#[utoipa::path(
    get,
    path = "/{id}/update",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post form prefilled with the current values"),
        (status = 303, description = "Not logged in, redirect to the login form"),
        (status = 403, description = "Post belongs to another user"),
        (status = 404, description = "Post not found"),
    ),
    tag = "blog"
)]
pub async fn update_form(
    Path(id): Path<i64>,
    Extension(posts): Extension<PostRepository>,
    Extension(renderer): Extension<Renderer>,
    Extension(user): Extension<User>,
) -> Response {
    match posts
        .get_or_fail(PostId(id), OwnershipCheck::Owner(user.id))
        .await
    {
        Ok(post) => {
            let form = PostForm {
                title: post.title.clone(),
                body: post.body.clone(),
            };
            renderer.render(
                Page::new("blog/update", Some(&user))
                    .with("post", post)
                    .with("form", form)
                    .with("error", None::<&str>),
            )
        }
        Err(err) => error_page(&renderer, Some(&user), &err),
    }
}

#[utoipa::path(
    post,
    path = "/{id}/update",
    params(("id" = i64, Path, description = "Post id")),
    request_body(content = PostForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Post updated, redirect to the index"),
        (status = 403, description = "Post belongs to another user"),
        (status = 404, description = "Post not found"),
        (status = 422, description = "Title missing"),
    ),
    tag = "blog"
)]
#[instrument(skip_all, fields(post_id = id, user_id = %user.id))]
pub async fn update(
    Path(id): Path<i64>,
    Extension(posts): Extension<PostRepository>,
    Extension(renderer): Extension<Renderer>,
    Extension(user): Extension<User>,
    Form(form): Form<PostForm>,
) -> Response {
    let id = PostId(id);
    match posts.update(id, user.id, &form.title, &form.body).await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(err @ Error::Validation(msg)) => renderer.render(
            Page::new("blog/update", Some(&user))
                .status(status_for(&err))
                .with("post_id", id)
                .with("form", form)
                .with("error", msg),
        ),
        Err(err) => error_page(&renderer, Some(&user), &err),
    }
}

#[utoipa::path(
    post,
    path = "/{id}/delete",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 303, description = "Post deleted, redirect to the index"),
        (status = 403, description = "Post belongs to another user"),
        (status = 404, description = "Post not found"),
    ),
    tag = "blog"
)]
#[instrument(skip_all, fields(post_id = id, user_id = %user.id))]
pub async fn delete(
    Path(id): Path<i64>,
    Extension(posts): Extension<PostRepository>,
    Extension(renderer): Extension<Renderer>,
    Extension(user): Extension<User>,
) -> Response {
    match posts.delete(PostId(id), user.id).await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(err) => error_page(&renderer, Some(&user), &err),
    }
}
