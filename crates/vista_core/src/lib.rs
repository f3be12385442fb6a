//! # vista_core
//!
//! Server-side view rendering for vista.
//!
//! Given a view name and a set of locals, the engine:
//!
//! - resolves the view to a file under the configured root
//! - compiles it, keeping the compiled form when caching is enabled
//! - renders its partials relative to the including template
//! - renders the view with helpers and locals merged into one data context
//! - wraps the result in a layout unless the layout is disabled
//!
//! A missing partial is logged and rendered as an empty string; every other
//! failure ends the render with an error that maps to a 500 response.
//!
//! ## Example
//!
//! ```rust,no_run
//! use vista_core::{RequestMeta, ResponseMeta, ViewConfig, ViewEngine, ViewRequest};
//! use serde_json::json;
//!
//! # async fn demo() {
//! let engine = ViewEngine::new(
//!     ViewConfig::new("views")
//!         .layout("layout.html")
//!         .helper("sitename", "demo site")
//!         .helper_fn("requestURL", |req, _res| json!(req.url)),
//! );
//!
//! let request = ViewRequest::from_locals("index.html", json!({ "name": "fengmk2" }));
//! let response = engine
//!     .respond(&request, &RequestMeta::new("GET", "/"), &ResponseMeta::new())
//!     .await;
//! assert_eq!(response.status, 200);
//! # }
//! ```

pub mod cache;
pub mod compiler;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod layout;
pub mod partial;
mod pipeline;
pub mod registry;
pub mod request;
pub mod response;
pub mod store;

pub use cache::ViewCache;
pub use compiler::{
    CompileOptions, CompiledView, EmbeddedCompiler, PartialSource, RenderScope, TemplateCompiler,
};
pub use config::{ViewConfig, ViewSettings};
pub use context::{DataContext, RequestMeta, ResponseMeta};
pub use engine::ViewEngine;
pub use error::{RenderErrorKind, SourceLocation, TemplateError, TemplateResult};
pub use layout::{LayoutState, BODY_KEY};
pub use partial::{PartialOutcome, MISSING_PARTIAL_PREFIX};
pub use pipeline::MAX_PARTIAL_DEPTH;
pub use registry::{FilterRegistry, Helper, HelperRegistry};
pub use request::{LayoutOverride, ViewRequest};
pub use response::ViewResponse;
pub use store::{FsSource, TemplateSource, TemplateStore};
