//! # vista_axum
//!
//! Renders vista views from axum handlers.
//!
//! Put a [`Views`] handle in the router state and take a [`View`] in any
//! handler. `View::render` runs the whole pipeline and becomes the response:
//! 200 with the rendered body, or 500 with the error text.
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use serde_json::json;
//! use vista_axum::{View, Views};
//! use vista_core::{ViewConfig, ViewEngine};
//!
//! let views = Views::new(ViewEngine::new(ViewConfig::new("views")));
//! let app: Router = Router::new()
//!     .route("/", get(|view: View| async move {
//!         view.render("index.html", json!({ "name": "fengmk2" })).await
//!     }))
//!     .with_state(views);
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::debug;
use vista_core::{RequestMeta, ResponseMeta, ViewEngine, ViewRequest, ViewResponse};

/// Shared handle to a [`ViewEngine`], cheap to clone into router state.
#[derive(Clone)]
pub struct Views(Arc<ViewEngine>);

impl Views {
    pub fn new(engine: ViewEngine) -> Self {
        Self(Arc::new(engine))
    }

    pub fn engine(&self) -> &ViewEngine {
        &self.0
    }
}

impl From<Arc<ViewEngine>> for Views {
    fn from(engine: Arc<ViewEngine>) -> Self {
        Self(engine)
    }
}

/// Per-request render handle. Consumed by [`View::render`], so a handler can
/// render at most once.
pub struct View {
    views: Views,
    request: RequestMeta,
    response: ResponseMeta,
}

impl<S> FromRequestParts<S> for View
where
    Views: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let mut request = RequestMeta::new(parts.method.as_str(), url);
        for (name, value) in &parts.headers {
            if let Ok(value) = value.to_str() {
                request = request.header(name.as_str(), value);
            }
        }

        Ok(View {
            views: Views::from_ref(state),
            request,
            response: ResponseMeta::new(),
        })
    }
}

impl View {
    /// Set the response content type before rendering; `; charset=utf-8` is
    /// appended unless a charset is given.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.response.content_type = Some(content_type.into());
        self
    }

    /// Request facts the helpers will see.
    pub fn request(&self) -> &RequestMeta {
        &self.request
    }

    /// Render `view` with `locals`. A `layout` key in the locals may be
    /// `false` (no layout) or a layout name.
    pub async fn render(self, view: &str, locals: Value) -> RenderedView {
        self.render_request(ViewRequest::from_locals(view, locals)).await
    }

    /// Render a prepared [`ViewRequest`].
    pub async fn render_request(self, request: ViewRequest) -> RenderedView {
        debug!("{} {} -> {}", self.request.method, self.request.url, request.view);
        let response = self
            .views
            .engine()
            .respond(&request, &self.request, &self.response)
            .await;
        RenderedView(response)
    }
}

/// A finished render, ready to be returned from a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView(pub ViewResponse);

impl IntoResponse for RenderedView {
    fn into_response(self) -> Response {
        let ViewResponse {
            status,
            content_type,
            body,
        } = self.0;
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let content_type = HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("text/html; charset=utf-8"));
        (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
    }
}
