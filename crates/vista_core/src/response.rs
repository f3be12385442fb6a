//! Framework-agnostic response produced by a render call.

use serde::Serialize;

use crate::error::TemplateError;

pub const DEFAULT_CONTENT_TYPE: &str = "text/html";
const ERROR_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Status, content type and body to write back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl ViewResponse {
    /// A 200 with the explicit content type, or `text/html`, in utf-8.
    pub fn ok(body: String, content_type: Option<&str>) -> Self {
        Self {
            status: 200,
            content_type: with_charset(content_type.unwrap_or(DEFAULT_CONTENT_TYPE)),
            body,
        }
    }

    /// A 500 whose body is the error's class name and message.
    pub fn error(err: &TemplateError) -> Self {
        Self {
            status: 500,
            content_type: ERROR_CONTENT_TYPE.to_string(),
            body: err.diagnostic(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Append `; charset=utf-8` unless a charset is already given.
pub fn with_charset(content_type: &str) -> String {
    if content_type.to_ascii_lowercase().contains("charset=") {
        content_type.to_string()
    } else {
        format!("{}; charset=utf-8", content_type)
    }
}
