//! Helper and filter registries.
//!
//! Both registries are filled once when the engine is configured and are
//! read-only afterwards. Helpers become variables in every render's data
//! context; filters are only reachable through `expr | name` pipelines.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::context::{RequestMeta, ResponseMeta};

/// A request-aware helper function.
pub type HelperFn = Arc<dyn Fn(&RequestMeta, &ResponseMeta) -> Value + Send + Sync>;

/// A filter: transforms an input value, optionally using arguments.
pub type FilterFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync>;

/// A registered helper.
#[derive(Clone)]
pub enum Helper {
    /// Same value for every render.
    Value(Value),
    /// Evaluated per render with the current request and response.
    Dynamic(HelperFn),
}

impl Helper {
    pub fn evaluate(&self, request: &RequestMeta, response: &ResponseMeta) -> Value {
        match self {
            Helper::Value(value) => value.clone(),
            Helper::Dynamic(f) => f(request, response),
        }
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Helper::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Helper::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Named helpers injected into every render.
#[derive(Debug, Clone, Default)]
pub struct HelperRegistry {
    helpers: HashMap<String, Helper>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a static value. Replaces an existing helper of the same name.
    pub fn register_value(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        debug!("Registering helper: {}", name);
        self.helpers.insert(name, Helper::Value(value));
    }

    /// Register a helper computed from the request and response.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&RequestMeta, &ResponseMeta) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering dynamic helper: {}", name);
        self.helpers.insert(name, Helper::Dynamic(Arc::new(f)));
    }

    pub fn get(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.helpers.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    /// Evaluate every helper for one request.
    pub fn evaluate(&self, request: &RequestMeta, response: &ResponseMeta) -> Map<String, Value> {
        self.helpers
            .iter()
            .map(|(name, helper)| (name.clone(), helper.evaluate(request, response)))
            .collect()
    }
}

/// Named filters available to template pipelines.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterFn>,
}

impl FilterRegistry {
    /// An empty registry, without the built-in filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-filled with the built-in filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::install(&mut registry);
        registry
    }

    /// Register a filter. Replaces an existing filter of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering filter: {}", name);
        self.filters.insert(name, Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Render a value the way template output shows it.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

mod builtins {
    use serde_json::{json, Value};
    use url::Url;

    use super::{display_value, FilterRegistry};

    pub(super) fn install(registry: &mut FilterRegistry) {
        registry.register("upcase", |v, _| Ok(Value::String(display_value(v).to_uppercase())));
        registry.register("downcase", |v, _| {
            Ok(Value::String(display_value(v).to_lowercase()))
        });
        registry.register("capitalize", |v, _| {
            let s = display_value(v);
            let mut chars = s.chars();
            Ok(Value::String(match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }))
        });
        registry.register("first", |v, _| match v {
            Value::Array(items) => Ok(items.first().cloned().unwrap_or(Value::Null)),
            Value::String(s) => Ok(s.chars().next().map(|c| json!(c.to_string())).unwrap_or(Value::Null)),
            other => Err(format!("first: expected an array or string, got {}", other)),
        });
        registry.register("last", |v, _| match v {
            Value::Array(items) => Ok(items.last().cloned().unwrap_or(Value::Null)),
            Value::String(s) => Ok(s.chars().last().map(|c| json!(c.to_string())).unwrap_or(Value::Null)),
            other => Err(format!("last: expected an array or string, got {}", other)),
        });
        registry.register("length", |v, _| match v {
            Value::Array(items) => Ok(json!(items.len())),
            Value::Object(map) => Ok(json!(map.len())),
            Value::String(s) => Ok(json!(s.chars().count())),
            Value::Null => Ok(json!(0)),
            other => Err(format!("length: unsupported value {}", other)),
        });
        registry.register("truncate", |v, args| {
            let len = args
                .first()
                .and_then(Value::as_u64)
                .ok_or_else(|| "truncate: expected a length argument".to_string())?
                as usize;
            let s = display_value(v);
            if s.chars().count() > len {
                Ok(Value::String(s.chars().take(len).collect::<String>() + "…"))
            } else {
                Ok(Value::String(s))
            }
        });
        registry.register("get", |v, args| {
            let key = args
                .first()
                .ok_or_else(|| "get: expected a key argument".to_string())?;
            Ok(match (v, key) {
                (Value::Object(map), key) => map.get(&display_value(key)).cloned().unwrap_or(Value::Null),
                (Value::Array(items), Value::Number(n)) => n
                    .as_u64()
                    .and_then(|i| items.get(i as usize))
                    .cloned()
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            })
        });
        registry.register("join", |v, args| {
            let sep = args.first().map(display_value).unwrap_or_else(|| ",".to_string());
            match v {
                Value::Array(items) => Ok(Value::String(
                    items.iter().map(display_value).collect::<Vec<_>>().join(&sep),
                )),
                other => Err(format!("join: expected an array, got {}", other)),
            }
        });
        registry.register("json", |v, _| {
            serde_json::to_string(v)
                .map(Value::String)
                .map_err(|e| e.to_string())
        });
        registry.register("default", |v, args| {
            let fallback = args.first().cloned().unwrap_or(Value::Null);
            Ok(match v {
                Value::Null => fallback,
                Value::String(s) if s.is_empty() => fallback,
                other => other.clone(),
            })
        });
        registry.register("url", |v, _| parse_url(&display_value(v)));
    }

    /// Split a URL (absolute or path-only) into its parts.
    fn parse_url(input: &str) -> Result<Value, String> {
        let base = Url::parse("http://localhost/").map_err(|e| e.to_string())?;
        let url = base.join(input).map_err(|e| format!("url: {}", e))?;
        let query: serde_json::Map<String, Value> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        Ok(json!({
            "href": input,
            "pathname": url.path(),
            "search": url.query().map(|q| format!("?{}", q)).unwrap_or_default(),
            "query": query,
            "hash": url.fragment().map(|f| format!("#{}", f)).unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(name: &str, input: Value, args: &[Value]) -> Result<Value, String> {
        let filters = FilterRegistry::with_builtins();
        let filter = filters.get(name).expect("builtin filter");
        filter(&input, args)
    }

    #[test]
    fn test_helper_registry_register() {
        let mut registry = HelperRegistry::new();
        assert!(registry.is_empty());

        registry.register_value("sitename", json!("demo"));
        registry.register_fn("method", |req, _| json!(req.method));

        assert_eq!(registry.len(), 2);
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["method", "sitename"]);

        let values = registry.evaluate(&RequestMeta::new("POST", "/"), &ResponseMeta::new());
        assert_eq!(values.get("method"), Some(&json!("POST")));
    }

    #[test]
    fn test_truncate_appends_ellipsis() {
        assert_eq!(apply("truncate", json!("你好"), &[json!(1)]), Ok(json!("你…")));
        assert_eq!(apply("truncate", json!("hi"), &[json!(5)]), Ok(json!("hi")));
        assert!(apply("truncate", json!("hi"), &[]).is_err());
    }

    #[test]
    fn test_url_filter_splits_path_and_query() {
        let parsed = apply("url", json!("/filters?page=2#top"), &[]).unwrap();
        assert_eq!(parsed["pathname"], json!("/filters"));
        assert_eq!(parsed["search"], json!("?page=2"));
        assert_eq!(parsed["query"]["page"], json!("2"));
        assert_eq!(parsed["hash"], json!("#top"));
    }

    #[test]
    fn test_collection_filters() {
        assert_eq!(apply("first", json!([1, 2, 3]), &[]), Ok(json!(1)));
        assert_eq!(apply("last", json!("abc"), &[]), Ok(json!("c")));
        assert_eq!(apply("length", json!({"a": 1}), &[]), Ok(json!(1)));
        assert_eq!(apply("join", json!(["a", "b"]), &[json!(" / ")]), Ok(json!("a / b")));
        assert_eq!(apply("get", json!({"k": "v"}), &[json!("k")]), Ok(json!("v")));
        assert_eq!(apply("default", Value::Null, &[json!("n/a")]), Ok(json!("n/a")));
        assert_eq!(apply("capitalize", json!("vista"), &[]), Ok(json!("Vista")));
    }

    #[test]
    fn test_user_filter_overrides_builtin() {
        let mut filters = FilterRegistry::with_builtins();
        filters.register("upcase", |_, _| Ok(json!("custom")));
        let f = filters.get("upcase").unwrap();
        assert_eq!(f(&json!("x"), &[]), Ok(json!("custom")));
    }
}
