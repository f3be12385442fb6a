//! Per-request render context.
//!
//! Every render call gets a fresh [`DataContext`]: registered helpers are
//! evaluated first, then the caller's locals are laid over them, so a local
//! shadows a helper of the same name for that call only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::registry::HelperRegistry;

/// Request facts available to dynamic helpers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    pub method: String,
    /// Path and query as received, e.g. `/filters?page=2`.
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

impl RequestMeta {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }
}

/// Response facts known before the view is rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Content type set explicitly by the handler, if any.
    pub content_type: Option<String>,
}

impl ResponseMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// The merged variable map a template is rendered against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataContext {
    values: Map<String, Value>,
}

impl DataContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate helpers for this request, then overlay `locals`.
    pub fn build(
        helpers: &HelperRegistry,
        locals: &Map<String, Value>,
        request: &RequestMeta,
        response: &ResponseMeta,
    ) -> Self {
        let mut values = helpers.evaluate(request, response);
        for (key, value) in locals {
            values.insert(key.clone(), value.clone());
        }
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// A copy of this context with one extra binding.
    pub fn with(&self, name: impl Into<String>, value: Value) -> Self {
        let mut next = self.clone();
        next.insert(name, value);
        next
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl From<Map<String, Value>> for DataContext {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}
