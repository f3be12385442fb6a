//! Per-call view requests.

use serde_json::{Map, Value};

/// Layout choice for one render call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LayoutOverride {
    /// Use the engine's configured default layout, if any.
    #[default]
    Default,
    /// Render the view on its own.
    Disabled,
    /// Use this layout instead of the default.
    Named(String),
}

/// A single render call: which view, with what locals, in which layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewRequest {
    pub view: String,
    pub locals: Map<String, Value>,
    pub layout: LayoutOverride,
}

impl ViewRequest {
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            ..Self::default()
        }
    }

    /// Build a request from a locals object that may carry a `layout` key.
    ///
    /// `layout: false` disables the layout, a string picks another one; the key
    /// is removed from the locals either way. Non-object locals are ignored.
    pub fn from_locals(view: impl Into<String>, locals: Value) -> Self {
        let mut locals = match locals {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let layout = match locals.remove("layout") {
            Some(Value::Bool(false)) => LayoutOverride::Disabled,
            Some(Value::String(name)) => LayoutOverride::Named(name),
            _ => LayoutOverride::Default,
        };
        Self {
            view: view.into(),
            locals,
            layout,
        }
    }

    pub fn local(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(name.into(), value.into());
        self
    }

    pub fn layout(mut self, name: impl Into<String>) -> Self {
        self.layout = LayoutOverride::Named(name.into());
        self
    }

    pub fn no_layout(mut self) -> Self {
        self.layout = LayoutOverride::Disabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_locals_layout_false() {
        let req = ViewRequest::from_locals("nolayout.html", json!({"layout": false, "a": 1}));
        assert_eq!(req.layout, LayoutOverride::Disabled);
        assert!(!req.locals.contains_key("layout"));
        assert_eq!(req.locals.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_from_locals_named_layout() {
        let req = ViewRequest::from_locals("index.html", json!({"layout": "error.html"}));
        assert_eq!(req.layout, LayoutOverride::Named("error.html".into()));
    }

    #[test]
    fn test_from_locals_defaults() {
        let req = ViewRequest::from_locals("index.html", Value::Null);
        assert_eq!(req.layout, LayoutOverride::Default);
        assert!(req.locals.is_empty());

        let req = ViewRequest::from_locals("index.html", json!({"layout": true}));
        assert_eq!(req.layout, LayoutOverride::Default);
    }

    #[test]
    fn test_builder() {
        let req = ViewRequest::new("index.html").local("name", "fengmk2").no_layout();
        assert_eq!(req.locals.get("name"), Some(&json!("fengmk2")));
        assert_eq!(req.layout, LayoutOverride::Disabled);
    }
}
