//! Compiler adapter.
//!
//! The pipeline only talks to [`TemplateCompiler`] and [`CompiledView`], so the
//! template language is swappable. [`EmbeddedCompiler`] is the built-in
//! EJS-flavoured language:
//!
//! ```text
//! <%= expr %>            escaped output
//! <%- expr %>            raw output
//! <%# comment %>
//! <% include file %>     include, resolved next to the template
//! <%- partial("f") %>    partial, resolved next to the template
//! <% if expr %> .. <% else %> .. <% end %>
//! <% for item in expr %> .. <% end %>
//! expr | filter:arg,arg  filter pipeline
//! ```

mod ast;
mod evaluator;
mod parser;
mod scanner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::DataContext;
use crate::error::{SourceLocation, TemplateError, TemplateResult};
use crate::registry::FilterRegistry;

pub use ast::{Expr, Key, Node};

/// Options passed to a compile call.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Absolute path of the template, used in error locations.
    pub filename: PathBuf,
}

impl CompileOptions {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

/// Renders partials where a template includes them.
pub trait PartialSource {
    /// Render partial `name`, resolved relative to `parent`, with `data`.
    /// `depth` counts the partials enclosing the one being rendered.
    fn render_partial(
        &self,
        name: &str,
        parent: &Path,
        data: &DataContext,
        depth: usize,
    ) -> TemplateResult<String>;
}

/// Everything a compiled view can see while rendering.
pub struct RenderScope<'a> {
    pub data: &'a DataContext,
    pub filters: &'a FilterRegistry,
    pub partials: &'a dyn PartialSource,
    /// 0 for a page or layout, 1 for a partial it includes, and so on.
    pub depth: usize,
}

/// An immutable, compiled template.
pub trait CompiledView: Send + Sync {
    /// Render against a scope. Partials named by [`partials`](Self::partials)
    /// are rendered through the scope's [`PartialSource`] when reached.
    fn render(&self, scope: &RenderScope<'_>) -> TemplateResult<String>;

    /// Partial names referenced by this template, in source order.
    fn partials(&self) -> &[String];

    /// Path the template was compiled from.
    fn filename(&self) -> &Path;
}

/// Turns template source into a [`CompiledView`].
pub trait TemplateCompiler: Send + Sync {
    fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> TemplateResult<Arc<dyn CompiledView>>;
}

/// Compiler for the built-in template language.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedCompiler;

impl EmbeddedCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateCompiler for EmbeddedCompiler {
    fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> TemplateResult<Arc<dyn CompiledView>> {
        let nodes = parser::parse(source).map_err(|e| {
            TemplateError::compile(
                e.message,
                Some(SourceLocation::new(&options.filename, e.line)),
            )
        })?;
        let partials = ast::partial_names(&nodes);
        Ok(Arc::new(EmbeddedView {
            filename: options.filename.clone(),
            nodes,
            partials,
        }))
    }
}

/// A template compiled by [`EmbeddedCompiler`].
#[derive(Debug)]
pub struct EmbeddedView {
    filename: PathBuf,
    nodes: Vec<Node>,
    partials: Vec<String>,
}

impl CompiledView for EmbeddedView {
    fn render(&self, scope: &RenderScope<'_>) -> TemplateResult<String> {
        let mut out = String::new();
        evaluator::Evaluator::new(scope, &self.filename).render(&self.nodes, &mut out)?;
        Ok(out)
    }

    fn partials(&self) -> &[String] {
        &self.partials
    }

    fn filename(&self) -> &Path {
        &self.filename
    }
}
