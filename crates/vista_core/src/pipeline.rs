//! Load, compile and render one template file.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::cache::ViewCache;
use crate::compiler::{CompileOptions, CompiledView, RenderScope, TemplateCompiler};
use crate::context::DataContext;
use crate::error::TemplateResult;
use crate::partial::PartialResolver;
use crate::registry::FilterRegistry;
use crate::store::TemplateStore;

/// How deep partials may nest before rendering is aborted.
pub const MAX_PARTIAL_DEPTH: usize = 32;

/// The shared pieces every render goes through.
pub(crate) struct Pipeline {
    pub(crate) store: TemplateStore,
    pub(crate) cache: ViewCache,
    pub(crate) compiler: Arc<dyn TemplateCompiler>,
    pub(crate) filters: FilterRegistry,
}

impl Pipeline {
    /// Get the compiled view for `path`, from the cache or from disk.
    pub(crate) async fn load(&self, path: &Path) -> TemplateResult<Arc<dyn CompiledView>> {
        if let Some(view) = self.cache.get(path) {
            return Ok(view);
        }

        let source = self.store.read(path).await?;
        debug!("Compiling {:?}", path);
        let view = self.compiler.compile(&source, &CompileOptions::new(path))?;
        self.cache.put(path, view.clone());
        Ok(view)
    }

    /// Render the page or layout at `path`. Its partials are loaded first and
    /// rendered where they are included.
    pub(crate) async fn render_path(
        &self,
        path: &Path,
        data: &DataContext,
    ) -> TemplateResult<String> {
        let view = self.load(path).await?;
        let mut partials = PartialResolver::new(self);
        partials.load_all(view.as_ref()).await;

        view.render(&RenderScope {
            data,
            filters: &self.filters,
            partials: &partials,
            depth: 0,
        })
    }
}
