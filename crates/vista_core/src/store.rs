//! Template store: maps view names to files under the views root.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};

/// Where template sources are read from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Read the full source text at `path`.
    async fn read(&self, path: &Path) -> TemplateResult<String>;
}

/// Reads templates from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

#[async_trait]
impl TemplateSource for FsSource {
    async fn read(&self, path: &Path) -> TemplateResult<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TemplateError::from_io(path, e))
    }
}

/// Resolves view names against a root directory and reads them.
#[derive(Clone)]
pub struct TemplateStore {
    root: PathBuf,
    extension: Option<String>,
    source: Arc<dyn TemplateSource>,
}

impl TemplateStore {
    /// Create a store. `root` is made absolute and normalised.
    pub fn new(
        root: impl Into<PathBuf>,
        extension: Option<String>,
        source: Arc<dyn TemplateSource>,
    ) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            root: normalize(&root),
            extension,
            source,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a view name to an absolute path under the root.
    ///
    /// Names beginning with `/` are rooted at the views root. Otherwise the
    /// name is joined to `base_dir` when given (partials), or to the root.
    pub fn resolve(&self, view: &str, base_dir: Option<&Path>) -> TemplateResult<PathBuf> {
        let joined = match view.strip_prefix('/') {
            Some(rooted) => self.root.join(rooted),
            None => base_dir.unwrap_or(&self.root).join(view),
        };

        let mut path = normalize(&joined);
        if path.extension().is_none() {
            if let Some(ext) = &self.extension {
                path.set_extension(ext);
            }
        }

        if !path.starts_with(&self.root) || path == self.root {
            return Err(TemplateError::OutsideRoot {
                view: view.to_string(),
            });
        }

        debug!("Resolved view {} to {:?}", view, path);
        Ok(path)
    }

    /// Read the source text of a resolved template.
    pub async fn read(&self, path: &Path) -> TemplateResult<String> {
        self.source.read(path).await
    }
}

impl std::fmt::Debug for TemplateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateStore")
            .field("root", &self.root)
            .field("extension", &self.extension)
            .finish()
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` never climbs above the filesystem root
                if !matches!(out.components().next_back(), Some(Component::RootDir) | None) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ext: Option<&str>) -> TemplateStore {
        TemplateStore::new("/srv/views", ext.map(String::from), Arc::new(FsSource))
    }

    #[test]
    fn test_resolve_plain_name() {
        let path = store(None).resolve("index.html", None).unwrap();
        assert_eq!(path, PathBuf::from("/srv/views/index.html"));
    }

    #[test]
    fn test_resolve_dot_prefix_against_root() {
        let path = store(None).resolve("./partial_in_partial.html", None).unwrap();
        assert_eq!(path, PathBuf::from("/srv/views/partial_in_partial.html"));
    }

    #[test]
    fn test_resolve_relative_to_base_dir() {
        let base = Path::new("/srv/views/partials");
        let path = store(None).resolve("./b.html", Some(base)).unwrap();
        assert_eq!(path, PathBuf::from("/srv/views/partials/b.html"));

        let up = store(None).resolve("../shared.html", Some(base)).unwrap();
        assert_eq!(up, PathBuf::from("/srv/views/shared.html"));
    }

    #[test]
    fn test_resolve_rooted_name_ignores_base_dir() {
        let base = Path::new("/srv/views/partials");
        let path = store(None).resolve("/layout.html", Some(base)).unwrap();
        assert_eq!(path, PathBuf::from("/srv/views/layout.html"));
    }

    #[test]
    fn test_resolve_appends_default_extension() {
        let path = store(Some("html")).resolve("users/show", None).unwrap();
        assert_eq!(path, PathBuf::from("/srv/views/users/show.html"));

        let kept = store(Some("html")).resolve("feed.xml", None).unwrap();
        assert_eq!(kept, PathBuf::from("/srv/views/feed.xml"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let err = store(None).resolve("../../etc/passwd", None).unwrap_err();
        assert!(matches!(err, TemplateError::OutsideRoot { .. }));

        let base = Path::new("/srv/views/partials");
        let err = store(None).resolve("../../secret.html", Some(base)).unwrap_err();
        assert!(matches!(err, TemplateError::OutsideRoot { .. }));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(temp.path(), None, Arc::new(FsSource));
        let path = store.resolve("noexists.html", None).unwrap();

        let err = store.read(&path).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("ENOENT"));
    }

    #[tokio::test]
    async fn test_read_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("hello.html"), "hello").unwrap();
        let store = TemplateStore::new(temp.path(), None, Arc::new(FsSource));

        let path = store.resolve("hello.html", None).unwrap();
        assert_eq!(store.read(&path).await.unwrap(), "hello");
    }
}
