//! Page rendering.
//!
//! Handlers describe a page as a template id plus a JSON context; a
//! [`Templates`] implementation turns that into a body. The context always
//! carries `user` (the current identity, or null).

use std::sync::Arc;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::error;

use crate::model::{User, UserSummary};

pub trait Templates: Send + Sync {
    /// # Errors
    /// Returns an error if the template is unknown or cannot be rendered.
    fn render(&self, template: &str, context: &Value) -> anyhow::Result<String>;

    fn content_type(&self) -> &'static str;
}

/// Emits `{"template": <id>, "context": {...}}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonTemplates;

impl Templates for JsonTemplates {
    fn render(&self, template: &str, context: &Value) -> anyhow::Result<String> {
        Ok(serde_json::to_string(&json!({
            "template": template,
            "context": context,
        }))?)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

/// A template id, a status, and the context to render it with.
#[derive(Debug)]
pub struct Page {
    template: &'static str,
    status: StatusCode,
    context: Map<String, Value>,
}

impl Page {
    #[must_use]
    pub fn new(template: &'static str, user: Option<&User>) -> Self {
        Self {
            template,
            status: StatusCode::OK,
            context: Map::new(),
        }
        .with("user", user.map(UserSummary::from))
    }

    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.context.insert(key.to_string(), value);
            }
            Err(err) => error!("Failed to serialize page context `{key}`: {err}"),
        }
        self
    }
}

#[derive(Clone)]
pub struct Renderer {
    templates: Arc<dyn Templates>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("content_type", &self.templates.content_type())
            .finish()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(JsonTemplates)
    }
}

impl Renderer {
    pub fn new(templates: impl Templates + 'static) -> Self {
        Self {
            templates: Arc::new(templates),
        }
    }

    pub fn render(&self, page: Page) -> Response {
        let context = Value::Object(page.context);
        match self.templates.render(page.template, &context) {
            Ok(body) => (
                page.status,
                [(CONTENT_TYPE, HeaderValue::from_static(self.templates.content_type()))],
                body,
            )
                .into_response(),
            Err(err) => {
                error!("Failed to render template {}: {err}", page.template);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;

    struct Failing;

    impl Templates for Failing {
        fn render(&self, template: &str, _context: &Value) -> anyhow::Result<String> {
            anyhow::bail!("no template named {template}")
        }

        fn content_type(&self) -> &'static str {
            "text/html; charset=utf-8"
        }
    }

    fn alice() -> User {
        User {
            id: UserId(1),
            username: "alice".to_string(),
            password_hash: "$argon2id$hash".to_string(),
        }
    }

    #[test]
    fn json_templates_wrap_context() -> anyhow::Result<()> {
        let body = JsonTemplates.render("blog/index", &json!({"posts": []}))?;
        let value: Value = serde_json::from_str(&body)?;
        assert_eq!(value["template"], "blog/index");
        assert_eq!(value["context"]["posts"], json!([]));
        Ok(())
    }

    #[test]
    fn page_context_carries_user_without_hash() {
        let page = Page::new("blog/index", Some(&alice()));
        let user = &page.context["user"];
        assert_eq!(user["username"], "alice");
        assert!(user.get("password_hash").is_none());

        let anonymous = Page::new("blog/index", None);
        assert_eq!(anonymous.context["user"], Value::Null);
    }

    #[test]
    fn render_sets_status_and_content_type() {
        let response = Renderer::default().render(
            Page::new("auth/login", None).status(StatusCode::UNAUTHORIZED),
        );
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
    }

    #[test]
    fn render_failure_is_server_error() {
        let response = Renderer::new(Failing).render(Page::new("missing", None));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
