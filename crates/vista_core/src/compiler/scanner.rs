//! Splits template source into literal text and `<% .. %>` tags.

use std::sync::OnceLock;

use regex::Regex;

/// Kind of tag, from the character after `<%`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `<% .. %>` statement
    Code,
    /// `<%= .. %>`
    Escaped,
    /// `<%- .. %>`
    Raw,
    /// `<%# .. %>`
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Tag {
        kind: TagKind,
        body: &'a str,
        line: usize,
    },
}

/// A `<%` with no closing `%>`; carries the line it starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnclosedTag {
    pub line: usize,
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // `<%%` is an escaped literal `<%`
        Regex::new(r"(?s)<%%|<%([=\-#]?)(.*?)%>").expect("tag pattern is valid")
    })
}

/// Scan `source` into segments.
pub fn scan(source: &str) -> Result<Vec<Segment<'_>>, UnclosedTag> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut line = 1;

    for caps in tag_pattern().captures_iter(source) {
        let whole = caps.get(0).expect("capture group 0 always matches");
        let text = &source[cursor..whole.start()];
        push_text(&mut segments, text, line)?;
        line += text.matches('\n').count();

        if whole.as_str() == "<%%" {
            segments.push(Segment::Text("<%"));
        } else {
            let kind = match caps.get(1).map(|m| m.as_str()) {
                Some("=") => TagKind::Escaped,
                Some("-") => TagKind::Raw,
                Some("#") => TagKind::Comment,
                _ => TagKind::Code,
            };
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            segments.push(Segment::Tag { kind, body, line });
            line += whole.as_str().matches('\n').count();
        }
        cursor = whole.end();
    }

    push_text(&mut segments, &source[cursor..], line)?;
    Ok(segments)
}

fn push_text<'a>(
    segments: &mut Vec<Segment<'a>>,
    text: &'a str,
    line: usize,
) -> Result<(), UnclosedTag> {
    if let Some(pos) = text.find("<%") {
        return Err(UnclosedTag {
            line: line + text[..pos].matches('\n').count(),
        });
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(())
}
