//! Engine configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{RequestMeta, ResponseMeta};
use crate::error::TemplateResult;
use crate::registry::{FilterRegistry, HelperRegistry};

/// Configuration for a [`ViewEngine`](crate::ViewEngine).
///
/// Fixed once the engine is built.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Directory views, layouts and partials are resolved under
    pub root: PathBuf,
    /// Default layout, relative to `root`
    pub layout: Option<String>,
    /// Keep compiled views for the life of the engine
    pub cache: bool,
    /// Extension appended to view names that have none
    pub extension: Option<String>,
    pub helpers: HelperRegistry,
    pub filters: FilterRegistry,
}

impl ViewConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            layout: Some("layout.html".to_string()),
            cache: true,
            extension: Some("html".to_string()),
            helpers: HelperRegistry::new(),
            filters: FilterRegistry::with_builtins(),
        }
    }

    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    /// Render views without a layout unless a request names one.
    pub fn no_layout(mut self) -> Self {
        self.layout = None;
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn extension(mut self, extension: Option<&str>) -> Self {
        self.extension = extension.map(String::from);
        self
    }

    pub fn helper(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.helpers.register_value(name, value.into());
        self
    }

    pub fn helper_fn<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RequestMeta, &ResponseMeta) -> Value + Send + Sync + 'static,
    {
        self.helpers.register_fn(name, f);
        self
    }

    pub fn filter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.filters.register(name, f);
        self
    }
}

/// File form of [`ViewConfig`]; only static helpers can be expressed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub root: PathBuf,
    pub layout: Option<String>,
    pub cache: bool,
    pub extension: Option<String>,
    pub helpers: BTreeMap<String, Value>,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("views"),
            layout: Some("layout.html".to_string()),
            cache: true,
            extension: Some("html".to_string()),
            helpers: BTreeMap::new(),
        }
    }
}

impl ViewSettings {
    /// Parse settings from YAML text.
    pub fn from_yaml(text: &str) -> TemplateResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read settings from a YAML file. A relative `root` is taken relative to
    /// the file's directory.
    pub fn load(path: &Path) -> TemplateResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| crate::error::TemplateError::from_io(path, e))?;
        let mut settings = Self::from_yaml(&text)?;
        if settings.root.is_relative() {
            if let Some(dir) = path.parent() {
                settings.root = dir.join(&settings.root);
            }
        }
        Ok(settings)
    }

    pub fn into_config(self) -> ViewConfig {
        let mut config = ViewConfig::new(self.root).cache(self.cache);
        config.layout = self.layout;
        config.extension = self.extension;
        for (name, value) in self.helpers {
            config.helpers.register_value(name, value);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config = ViewConfig::new("/views");
        assert_eq!(config.layout.as_deref(), Some("layout.html"));
        assert!(config.cache);
        assert_eq!(config.extension.as_deref(), Some("html"));
        assert!(config.filters.contains("truncate"));
    }

    #[test]
    fn test_config_builder() {
        let config = ViewConfig::new("/views")
            .layout("base.html")
            .cache(false)
            .helper("sitename", "demo")
            .helper_fn("requestURL", |req, _| json!(req.url))
            .filter("shout", |v, _| Ok(json!(format!("{}!", v))));

        assert_eq!(config.layout.as_deref(), Some("base.html"));
        assert!(!config.cache);
        assert!(config.helpers.contains("sitename"));
        assert!(config.helpers.contains("requestURL"));
        assert!(config.filters.contains("shout"));
    }

    #[test]
    fn test_settings_from_yaml() {
        let settings = ViewSettings::from_yaml(
            "root: /srv/views\nlayout: null\ncache: false\nhelpers:\n  sitename: demo site\n",
        )
        .unwrap();
        assert_eq!(settings.root, PathBuf::from("/srv/views"));
        assert!(settings.layout.is_none());
        assert_eq!(settings.extension.as_deref(), Some("html"));

        let config = settings.into_config();
        assert!(!config.cache);
        assert!(config.layout.is_none());
        assert!(config.helpers.contains("sitename"));
    }

    #[test]
    fn test_settings_reject_bad_yaml() {
        let err = ViewSettings::from_yaml("cache: [not, a, bool]").unwrap_err();
        assert!(err.to_string().starts_with("invalid view settings"));
    }

    #[test]
    fn test_settings_load_resolves_relative_root() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("vista.yaml");
        std::fs::write(&file, "root: templates\n").unwrap();

        let settings = ViewSettings::load(&file).unwrap();
        assert_eq!(settings.root, temp.path().join("templates"));
    }
}
