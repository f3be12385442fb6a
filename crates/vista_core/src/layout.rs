//! Layout composition.
//!
//! The inner view is rendered first; unless the layout is disabled, the layout
//! template is then rendered with the same data plus the inner output bound to
//! [`BODY_KEY`]. A failure in either pass ends the composition with that error.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::context::DataContext;
use crate::error::{TemplateError, TemplateResult};
use crate::pipeline::Pipeline;
use crate::request::LayoutOverride;

/// Variable the inner view's output is bound to inside the layout.
pub const BODY_KEY: &str = "body";

/// States of one composition.
#[derive(Debug)]
pub enum LayoutState {
    /// Render the view alone.
    NoLayout,
    /// Render the view, then wrap it in the named layout.
    PendingLayout { layout: String },
    Done(String),
    Failed(TemplateError),
}

impl LayoutState {
    /// Starting state for a layout override and the configured default.
    pub fn start(layout: &LayoutOverride, default_layout: Option<&str>) -> Self {
        match (layout, default_layout) {
            (LayoutOverride::Disabled, _) => LayoutState::NoLayout,
            (LayoutOverride::Named(name), _) => LayoutState::PendingLayout {
                layout: name.clone(),
            },
            (LayoutOverride::Default, Some(name)) => LayoutState::PendingLayout {
                layout: name.to_string(),
            },
            (LayoutOverride::Default, None) => LayoutState::NoLayout,
        }
    }

    fn from_result(result: TemplateResult<String>) -> Self {
        match result {
            Ok(body) => LayoutState::Done(body),
            Err(err) => LayoutState::Failed(err),
        }
    }
}

pub(crate) struct LayoutComposer<'a> {
    pipeline: &'a Pipeline,
    default_layout: Option<&'a str>,
}

impl<'a> LayoutComposer<'a> {
    pub(crate) fn new(pipeline: &'a Pipeline, default_layout: Option<&'a str>) -> Self {
        Self {
            pipeline,
            default_layout,
        }
    }

    /// Render `view_path`, wrapped in a layout unless disabled.
    pub(crate) async fn compose(
        &self,
        view_path: &Path,
        layout: &LayoutOverride,
        data: &DataContext,
    ) -> TemplateResult<String> {
        let mut state = LayoutState::start(layout, self.default_layout);

        loop {
            debug!("Layout state for {:?}: {:?}", view_path, StateName(&state));
            state = match state {
                LayoutState::NoLayout => {
                    LayoutState::from_result(self.pipeline.render_path(view_path, data).await)
                }
                LayoutState::PendingLayout { layout } => {
                    match self.pipeline.render_path(view_path, data).await {
                        Ok(body) => LayoutState::from_result(
                            self.render_layout(&layout, data, body).await,
                        ),
                        Err(err) => LayoutState::Failed(err),
                    }
                }
                LayoutState::Done(body) => return Ok(body),
                LayoutState::Failed(err) => return Err(err),
            };
        }
    }

    async fn render_layout(
        &self,
        layout: &str,
        data: &DataContext,
        body: String,
    ) -> TemplateResult<String> {
        let path = self.pipeline.store.resolve(layout, None)?;
        let data = data.with(BODY_KEY, Value::String(body));
        self.pipeline.render_path(&path, &data).await
    }
}

/// Logs a state without dumping rendered bodies.
struct StateName<'s>(&'s LayoutState);

impl std::fmt::Debug for StateName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            LayoutState::NoLayout => f.write_str("NoLayout"),
            LayoutState::PendingLayout { layout } => write!(f, "PendingLayout({})", layout),
            LayoutState::Done(_) => f.write_str("Done"),
            LayoutState::Failed(err) => write!(f, "Failed({})", err.class_name()),
        }
    }
}
