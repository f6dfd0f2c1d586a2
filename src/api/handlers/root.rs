use axum::response::IntoResponse;

#[utoipa::path(
    get,
    path = "/hello",
    responses(
        (status = 200, description = "Liveness greeting", body = String, content_type = "text/plain")
    ),
    tag = "postboard"
)]
pub async fn hello() -> impl IntoResponse {
    "Hello, World!"
}
