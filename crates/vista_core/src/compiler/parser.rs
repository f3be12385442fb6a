//! Parser for the built-in template language.

use serde_json::{Number, Value};

use super::ast::{Expr, Key, Node};
use super::scanner::{scan, Segment, TagKind};

/// A syntax error and the line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
}

impl SyntaxError {
    fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// An open block while parsing.
enum Frame {
    Root(Vec<Node>),
    If {
        cond: Expr,
        then: Vec<Node>,
        otherwise: Vec<Node>,
        in_else: bool,
        line: usize,
    },
    For {
        var: String,
        iter: Expr,
        body: Vec<Node>,
        line: usize,
    },
}

impl Frame {
    fn nodes(&mut self) -> &mut Vec<Node> {
        match self {
            Frame::Root(nodes) => nodes,
            Frame::If {
                then,
                otherwise,
                in_else,
                ..
            } => {
                if *in_else {
                    otherwise
                } else {
                    then
                }
            }
            Frame::For { body, .. } => body,
        }
    }
}

/// Parse template source into nodes.
pub fn parse(source: &str) -> Result<Vec<Node>, SyntaxError> {
    let segments = scan(source).map_err(|e| SyntaxError::new("could not find matching close tag for \"<%\"", e.line))?;
    let mut stack = vec![Frame::Root(Vec::new())];

    for segment in segments {
        match segment {
            Segment::Text(text) => push_node(&mut stack, Node::Text(text.to_string())),
            Segment::Tag { kind, body, line } => match kind {
                TagKind::Comment => {}
                TagKind::Escaped | TagKind::Raw => {
                    let expr = parse_expr(body).map_err(|m| SyntaxError::new(m, line))?;
                    push_node(
                        &mut stack,
                        Node::Output {
                            expr,
                            escape: kind == TagKind::Escaped,
                            line,
                        },
                    );
                }
                TagKind::Code => statement(&mut stack, body.trim(), line)?,
            },
        }
    }

    // `end` never pops the root, so only an unclosed block can sit above it
    match stack.pop() {
        Some(Frame::Root(nodes)) => Ok(nodes),
        Some(Frame::If { line, .. }) => Err(SyntaxError::new(
            format!("unclosed `if` block opened on line {}", line),
            line,
        )),
        Some(Frame::For { line, .. }) => Err(SyntaxError::new(
            format!("unclosed `for` block opened on line {}", line),
            line,
        )),
        None => Ok(Vec::new()),
    }
}

fn push_node(stack: &mut [Frame], node: Node) {
    if let Some(frame) = stack.last_mut() {
        frame.nodes().push(node);
    }
}

fn statement(stack: &mut Vec<Frame>, body: &str, line: usize) -> Result<(), SyntaxError> {
    let (keyword, rest) = match body.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (body, ""),
    };

    match keyword {
        "" => Ok(()),
        "include" => {
            let name = unquote(rest);
            if name.is_empty() {
                return Err(SyntaxError::new("`include` needs a template name", line));
            }
            push_node(
                stack,
                Node::Include {
                    name: name.to_string(),
                    line,
                },
            );
            Ok(())
        }
        "if" => {
            let cond = parse_expr(rest).map_err(|m| SyntaxError::new(m, line))?;
            stack.push(Frame::If {
                cond,
                then: Vec::new(),
                otherwise: Vec::new(),
                in_else: false,
                line,
            });
            Ok(())
        }
        "else" => match stack.last_mut() {
            Some(Frame::If { in_else, .. }) if !*in_else => {
                *in_else = true;
                Ok(())
            }
            _ => Err(SyntaxError::new("`else` without a matching `if`", line)),
        },
        "for" => {
            let (var, iter) = rest
                .split_once(" in ")
                .ok_or_else(|| SyntaxError::new("expected `for <name> in <expr>`", line))?;
            let var = var.trim();
            if !is_identifier(var) {
                return Err(SyntaxError::new(
                    format!("invalid loop variable `{}`", var),
                    line,
                ));
            }
            let iter = parse_expr(iter).map_err(|m| SyntaxError::new(m, line))?;
            stack.push(Frame::For {
                var: var.to_string(),
                iter,
                body: Vec::new(),
                line,
            });
            Ok(())
        }
        "end" => {
            if stack.len() < 2 {
                return Err(SyntaxError::new("`end` without an open block", line));
            }
            let node = match stack.pop() {
                Some(Frame::If {
                    cond,
                    then,
                    otherwise,
                    line,
                    ..
                }) => Node::If {
                    cond,
                    then,
                    otherwise,
                    line,
                },
                Some(Frame::For {
                    var,
                    iter,
                    body,
                    line,
                }) => Node::For {
                    var,
                    iter,
                    body,
                    line,
                },
                _ => return Err(SyntaxError::new("`end` without an open block", line)),
            };
            push_node(stack, node);
            Ok(())
        }
        other => Err(SyntaxError::new(
            format!("unexpected statement `{}`", other),
            line,
        )),
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(Number),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Pipe,
    Colon,
    Comma,
    Bang,
    EqEq,
    NotEq,
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = chars
                                .get(i + 1)
                                .ok_or_else(|| "unterminated string literal".to_string())?;
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => *other,
                            });
                            i += 2;
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_number(&text)?));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character `{}`", other)),
        }
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> Result<Number, String> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Number::from(n));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| format!("invalid number `{}`", text))
}

/// Parse a single expression, including filter pipelines.
pub fn parse_expr(src: &str) -> Result<Expr, String> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.pipeline()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(format!("unexpected token {:?}", token)),
    }
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), String> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(format!("expected {:?}, found {:?}", token, self.peek()))
        }
    }

    fn pipeline(&mut self) -> Result<Expr, String> {
        let mut expr = self.compare()?;
        while self.eat(&Token::Pipe) {
            let name = match self.next() {
                Some(Token::Ident(name)) => name,
                other => return Err(format!("expected filter name after `|`, found {:?}", other)),
            };
            let mut args = Vec::new();
            if self.eat(&Token::Colon) {
                args.push(self.compare()?);
                while self.eat(&Token::Comma) {
                    args.push(self.compare()?);
                }
            }
            expr = Expr::Filter {
                input: Box::new(expr),
                name,
                args,
            };
        }
        Ok(expr)
    }

    fn compare(&mut self) -> Result<Expr, String> {
        let left = self.unary()?;
        let equal = if self.eat(&Token::EqEq) {
            true
        } else if self.eat(&Token::NotEq) {
            false
        } else {
            return Ok(left);
        };
        let right = self.unary()?;
        Ok(Expr::Compare {
            left: Box::new(left),
            right: Box::new(right),
            equal,
        })
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Bang) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                match self.next() {
                    Some(Token::Ident(name)) => {
                        expr = Expr::Member {
                            object: Box::new(expr),
                            key: Key::Name(name),
                        }
                    }
                    other => return Err(format!("expected property name after `.`, found {:?}", other)),
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.pipeline()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    key: Key::Index(Box::new(index)),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::LParen) => {
                let expr = self.pipeline()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" | "undefined" => Ok(Expr::Literal(Value::Null)),
                _ if self.peek() == Some(&Token::LParen) => self.call(name),
                _ => Ok(Expr::Variable(name)),
            },
            other => Err(format!("unexpected token {:?}", other)),
        }
    }

    fn call(&mut self, name: String) -> Result<Expr, String> {
        self.expect(Token::LParen)?;
        if name != "partial" {
            return Err(format!("unknown function `{}`", name));
        }
        let target = match self.next() {
            Some(Token::Str(target)) => target,
            other => return Err(format!("partial() expects a string literal, found {:?}", other)),
        };
        self.expect(Token::RParen)?;
        Ok(Expr::Partial(target))
    }
}
