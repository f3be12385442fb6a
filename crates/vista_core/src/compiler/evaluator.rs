//! Renders a parsed template against a [`RenderScope`].

use std::borrow::Cow;
use std::path::Path;

use serde_json::Value;

use super::ast::{Expr, Key, Node};
use super::RenderScope;
use crate::context::DataContext;
use crate::error::{SourceLocation, TemplateError, TemplateResult};
use crate::registry::display_value;

pub(super) struct Evaluator<'a> {
    scope: &'a RenderScope<'a>,
    filename: &'a Path,
    /// Loop bindings, innermost last.
    locals: Vec<(String, Value)>,
}

impl<'a> Evaluator<'a> {
    pub(super) fn new(scope: &'a RenderScope<'a>, filename: &'a Path) -> Self {
        Self {
            scope,
            filename,
            locals: Vec::new(),
        }
    }

    pub(super) fn render(&mut self, nodes: &[Node], out: &mut String) -> TemplateResult<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output { expr, escape, line } => {
                    let value = self.eval(expr, *line)?;
                    let text = display_value(&value);
                    if *escape {
                        out.push_str(&html_escape::encode_quoted_attribute(&text));
                    } else {
                        out.push_str(&text);
                    }
                }
                Node::If {
                    cond,
                    then,
                    otherwise,
                    line,
                } => {
                    if truthy(&self.eval(cond, *line)?) {
                        self.render(then, out)?;
                    } else {
                        self.render(otherwise, out)?;
                    }
                }
                Node::For {
                    var,
                    iter,
                    body,
                    line,
                } => {
                    let items = match self.eval(iter, *line)? {
                        Value::Array(items) => items,
                        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
                        Value::Null => Vec::new(),
                        other => {
                            return Err(self.type_error(
                                format!("{} is not iterable", display_value(&other)),
                                *line,
                            ))
                        }
                    };
                    for item in items {
                        self.locals.push((var.clone(), item));
                        let result = self.render(body, out);
                        self.locals.pop();
                        result?;
                    }
                }
                Node::Include { name, .. } => out.push_str(&self.partial(name)?),
            }
        }
        Ok(())
    }

    fn location(&self, line: usize) -> Option<SourceLocation> {
        Some(SourceLocation::new(self.filename, line))
    }

    fn type_error(&self, message: String, line: usize) -> TemplateError {
        TemplateError::type_error(message, self.location(line))
    }

    fn lookup(&self, name: &str, line: usize) -> TemplateResult<Value> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Ok(value.clone());
        }
        self.scope
            .data
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateError::undefined(name, self.location(line)))
    }

    /// The data context with the active loop bindings laid over it.
    fn bindings(&self) -> Cow<'_, DataContext> {
        if self.locals.is_empty() {
            return Cow::Borrowed(self.scope.data);
        }
        let mut data = self.scope.data.clone();
        for (name, value) in &self.locals {
            data.insert(name.clone(), value.clone());
        }
        Cow::Owned(data)
    }

    fn partial(&self, name: &str) -> TemplateResult<String> {
        let parent = self.filename.parent().unwrap_or(Path::new("/"));
        self.scope
            .partials
            .render_partial(name, parent, &self.bindings(), self.scope.depth + 1)
    }

    fn eval(&self, expr: &Expr, line: usize) -> TemplateResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => self.lookup(name, line),
            Expr::Member { object, key } => {
                let object = self.eval(object, line)?;
                let key = match key {
                    Key::Name(name) => Cow::Borrowed(name.as_str()),
                    Key::Index(index) => Cow::Owned(display_value(&self.eval(index, line)?)),
                };
                match object {
                    Value::Object(map) => Ok(map.get(key.as_ref()).cloned().unwrap_or(Value::Null)),
                    Value::Array(items) => Ok(match key.as_ref() {
                        "length" => Value::from(items.len()),
                        index => index
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| items.get(i).cloned())
                            .unwrap_or(Value::Null),
                    }),
                    Value::String(s) if key == "length" => Ok(Value::from(s.chars().count())),
                    Value::Null => Err(self.type_error(
                        format!("cannot read property '{}' of null", key),
                        line,
                    )),
                    _ => Ok(Value::Null),
                }
            }
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&self.eval(inner, line)?))),
            Expr::Compare { left, right, equal } => {
                let same = self.eval(left, line)? == self.eval(right, line)?;
                Ok(Value::Bool(same == *equal))
            }
            Expr::Partial(name) => Ok(Value::String(self.partial(name)?)),
            Expr::Filter { input, name, args } => {
                let filter = self.scope.filters.get(name).ok_or_else(|| {
                    TemplateError::undefined(&format!("filter '{}'", name), self.location(line))
                })?;
                let input = self.eval(input, line)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, line))
                    .collect::<TemplateResult<Vec<_>>>()?;
                filter(&input, &args).map_err(|message| self.type_error(message, line))
            }
        }
    }
}

/// Template truthiness: null, false, 0, "" and [] are false.
pub(super) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}
