//! Partial resolution.
//!
//! Before a page renders, every partial it can reach is loaded (and compiled
//! through the cache) next to the template that references it. Nothing is
//! rendered at that point. A partial renders only when the evaluator reaches
//! its `include` or `partial(..)`, with the bindings in effect there.
//!
//! A partial whose file does not exist is reported as
//! [`PartialOutcome::Missing`], logged once per inclusion reached, and replaced
//! by an empty string. Any other failure is raised at the inclusion point.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::error;

use crate::compiler::{CompiledView, PartialSource, RenderScope};
use crate::context::DataContext;
use crate::error::{TemplateError, TemplateResult};
use crate::pipeline::{Pipeline, MAX_PARTIAL_DEPTH};

/// Prefix of the operator diagnostic for a missing partial.
pub const MISSING_PARTIAL_PREFIX: &str = "[connect-render] Error: cannot load view partial";

/// Result of rendering one partial reference.
#[derive(Debug)]
pub enum PartialOutcome {
    Rendered(String),
    Missing { path: PathBuf, error: TemplateError },
}

/// A partial file as loaded ahead of rendering.
enum LoadedPartial {
    Ready(Arc<dyn CompiledView>),
    /// Raised only if an inclusion of it is reached.
    Failed(TemplateError),
}

/// Partials reachable from one page, keyed by absolute path.
pub(crate) struct PartialResolver<'p> {
    pipeline: &'p Pipeline,
    loaded: HashMap<PathBuf, LoadedPartial>,
}

impl<'p> PartialResolver<'p> {
    pub(crate) fn new(pipeline: &'p Pipeline) -> Self {
        Self {
            pipeline,
            loaded: HashMap::new(),
        }
    }

    /// Load every partial reachable from `view`, recursively.
    pub(crate) fn load_all<'a>(&'a mut self, view: &'a dyn CompiledView) -> BoxFuture<'a, ()> {
        async move {
            let base_dir = parent_dir(view.filename());

            for name in view.partials() {
                // a name that does not resolve fails again when reached
                let Ok(path) = self.pipeline.store.resolve(name, Some(base_dir)) else {
                    continue;
                };
                if self.loaded.contains_key(&path) {
                    continue;
                }

                match self.pipeline.load(&path).await {
                    Ok(partial) => {
                        self.loaded
                            .insert(path, LoadedPartial::Ready(partial.clone()));
                        self.load_all(partial.as_ref()).await;
                    }
                    Err(err) => {
                        self.loaded.insert(path, LoadedPartial::Failed(err));
                    }
                }
            }
        }
        .boxed()
    }

    /// Render partial `name`, referenced from a template in `parent`.
    pub(crate) fn render(
        &self,
        name: &str,
        parent: &Path,
        data: &DataContext,
        depth: usize,
    ) -> TemplateResult<PartialOutcome> {
        let path = self.pipeline.store.resolve(name, Some(parent))?;
        if depth > MAX_PARTIAL_DEPTH {
            return Err(TemplateError::PartialDepth {
                path,
                max_depth: MAX_PARTIAL_DEPTH,
            });
        }

        match self.loaded.get(&path) {
            Some(LoadedPartial::Ready(view)) => view
                .render(&RenderScope {
                    data,
                    filters: &self.pipeline.filters,
                    partials: self,
                    depth,
                })
                .map(PartialOutcome::Rendered),
            Some(LoadedPartial::Failed(err)) if err.is_not_found() => Ok(PartialOutcome::Missing {
                error: err.clone(),
                path,
            }),
            Some(LoadedPartial::Failed(err)) => Err(err.clone()),
            // not referenced by any loaded template, so never loaded
            None => Ok(PartialOutcome::Missing {
                error: TemplateError::NotFound { path: path.clone() },
                path,
            }),
        }
    }
}

impl PartialSource for PartialResolver<'_> {
    fn render_partial(
        &self,
        name: &str,
        parent: &Path,
        data: &DataContext,
        depth: usize,
    ) -> TemplateResult<String> {
        match self.render(name, parent, data, depth)? {
            PartialOutcome::Rendered(text) => Ok(text),
            PartialOutcome::Missing { path, error } => {
                error!(
                    "{} {}\n{}",
                    MISSING_PARTIAL_PREFIX,
                    path.display(),
                    error.diagnostic()
                );
                Ok(String::new())
            }
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new("/"))
}
