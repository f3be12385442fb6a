//! The view engine: configuration, shared cache and the render entry points.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};
use walkdir::WalkDir;

use crate::cache::ViewCache;
use crate::compiler::{CompileOptions, EmbeddedCompiler, TemplateCompiler};
use crate::config::ViewConfig;
use crate::context::{DataContext, RequestMeta, ResponseMeta};
use crate::error::{TemplateError, TemplateResult};
use crate::layout::LayoutComposer;
use crate::pipeline::Pipeline;
use crate::request::ViewRequest;
use crate::response::ViewResponse;
use crate::store::{FsSource, TemplateSource, TemplateStore};

/// Renders views. Build once and share (e.g. behind an `Arc`) across requests.
pub struct ViewEngine {
    config: ViewConfig,
    pipeline: Pipeline,
}

impl ViewEngine {
    /// Engine reading from the filesystem with the built-in compiler.
    pub fn new(config: ViewConfig) -> Self {
        Self::with_parts(config, Arc::new(FsSource), Arc::new(EmbeddedCompiler::new()))
    }

    /// Engine with a custom template source and compiler.
    pub fn with_parts(
        config: ViewConfig,
        source: Arc<dyn TemplateSource>,
        compiler: Arc<dyn TemplateCompiler>,
    ) -> Self {
        let store = TemplateStore::new(config.root.clone(), config.extension.clone(), source);
        info!(
            "View engine rooted at {:?} (cache: {}, layout: {:?})",
            store.root(),
            config.cache,
            config.layout
        );
        let pipeline = Pipeline {
            store,
            cache: ViewCache::new(config.cache),
            compiler,
            filters: config.filters.clone(),
        };
        Self { config, pipeline }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Absolute views root.
    pub fn root(&self) -> &Path {
        self.pipeline.store.root()
    }

    pub fn cache(&self) -> &ViewCache {
        &self.pipeline.cache
    }

    /// Resolve a view name the way a top-level render would.
    pub fn resolve(&self, view: &str) -> TemplateResult<PathBuf> {
        self.pipeline.store.resolve(view, None)
    }

    /// Render a view (and its layout) to a string.
    pub async fn render(
        &self,
        request: &ViewRequest,
        req: &RequestMeta,
        res: &ResponseMeta,
    ) -> TemplateResult<String> {
        let data = DataContext::build(&self.config.helpers, &request.locals, req, res);
        let path = self.resolve(&request.view)?;
        LayoutComposer::new(&self.pipeline, self.config.layout.as_deref())
            .compose(&path, &request.layout, &data)
            .await
    }

    /// Render a view into a response: 200 with the body, or 500 with the
    /// error's class name and message.
    pub async fn respond(
        &self,
        request: &ViewRequest,
        req: &RequestMeta,
        res: &ResponseMeta,
    ) -> ViewResponse {
        match self.render(request, req, res).await {
            Ok(body) => ViewResponse::ok(body, res.content_type.as_deref()),
            Err(err) => {
                error!("Failed to render view {}: {}", request.view, err);
                ViewResponse::error(&err)
            }
        }
    }

    /// Compile every template under the root without caching, returning the
    /// files that fail to compile.
    pub async fn check_all(&self) -> Vec<(PathBuf, TemplateError)> {
        let mut failures = Vec::new();

        for path in self.template_files() {
            let result = match self.pipeline.store.read(&path).await {
                Ok(source) => self
                    .pipeline
                    .compiler
                    .compile(&source, &CompileOptions::new(&path))
                    .map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                failures.push((path, e));
            }
        }

        failures
    }

    /// Template files under the root, sorted.
    pub fn template_files(&self) -> Vec<PathBuf> {
        let extension = self.config.extension.as_deref();
        let mut files: Vec<PathBuf> = WalkDir::new(self.root())
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| match extension {
                Some(ext) => p.extension().and_then(|e| e.to_str()) == Some(ext),
                None => true,
            })
            .collect();
        files.sort();
        files
    }
}

impl std::fmt::Debug for ViewEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewEngine")
            .field("config", &self.config)
            .field("cache", &self.pipeline.cache)
            .finish()
    }
}
