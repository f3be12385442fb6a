//! Syntax tree of the built-in template language.

use serde_json::Value;

/// A node in a compiled template body.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text copied to the output.
    Text(String),
    /// `<%= expr %>` (escaped) or `<%- expr %>` (raw).
    Output { expr: Expr, escape: bool, line: usize },
    /// `<% if cond %> .. <% else %> .. <% end %>`
    If {
        cond: Expr,
        then: Vec<Node>,
        otherwise: Vec<Node>,
        line: usize,
    },
    /// `<% for var in iter %> .. <% end %>`
    For {
        var: String,
        iter: Expr,
        body: Vec<Node>,
        line: usize,
    },
    /// `<% include name %>`, spliced in raw.
    Include { name: String, line: usize },
}

/// How a member is selected from an object or array.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// `.name`
    Name(String),
    /// `[expr]`
    Index(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    Member { object: Box<Expr>, key: Key },
    Not(Box<Expr>),
    Compare {
        left: Box<Expr>,
        right: Box<Expr>,
        equal: bool,
    },
    /// `partial("name")`
    Partial(String),
    /// `input | name:arg1,arg2`
    Filter {
        input: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
}

/// Collect partial and include names in source order, without duplicates,
/// so each one is loaded once before rendering.
pub fn partial_names(nodes: &[Node]) -> Vec<String> {
    let mut names = Vec::new();
    collect_nodes(nodes, &mut names);
    names
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn collect_nodes(nodes: &[Node], names: &mut Vec<String>) {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Output { expr, .. } => collect_expr(expr, names),
            Node::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                collect_expr(cond, names);
                collect_nodes(then, names);
                collect_nodes(otherwise, names);
            }
            Node::For { iter, body, .. } => {
                collect_expr(iter, names);
                collect_nodes(body, names);
            }
            Node::Include { name, .. } => push_unique(names, name),
        }
    }
}

fn collect_expr(expr: &Expr, names: &mut Vec<String>) {
    match expr {
        Expr::Literal(_) | Expr::Variable(_) => {}
        Expr::Member { object, key } => {
            collect_expr(object, names);
            if let Key::Index(index) = key {
                collect_expr(index, names);
            }
        }
        Expr::Not(inner) => collect_expr(inner, names),
        Expr::Compare { left, right, .. } => {
            collect_expr(left, names);
            collect_expr(right, names);
        }
        Expr::Partial(name) => push_unique(names, name),
        Expr::Filter { input, args, .. } => {
            collect_expr(input, names);
            for arg in args {
                collect_expr(arg, names);
            }
        }
    }
}
