//! Error types for the render pipeline.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias for render pipeline operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Where in a template file an error was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// Kind of runtime evaluation fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderErrorKind {
    /// A variable or filter name that is not in scope.
    Reference,
    /// An operation applied to a value of the wrong shape.
    Type,
}

/// Errors that can occur while resolving, compiling or rendering views.
///
/// Cloneable so a partial that failed to load can be raised each time it is
/// reached.
#[derive(Error, Debug, Clone)]
pub enum TemplateError {
    #[error("ENOENT, no such file or directory '{}'", .path.display())]
    NotFound { path: PathBuf },

    #[error("{source} '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("view '{view}' resolves outside of the views root")]
    OutsideRoot { view: String },

    #[error("{message}{}", at(.location))]
    Compile {
        message: String,
        location: Option<SourceLocation>,
    },

    #[error("{message}{}", at(.location))]
    Render {
        kind: RenderErrorKind,
        message: String,
        location: Option<SourceLocation>,
    },

    #[error("partial nesting deeper than {max_depth} levels at '{}'", .path.display())]
    PartialDepth { path: PathBuf, max_depth: usize },

    #[error("invalid view settings: {0}")]
    Settings(#[source] Arc<serde_yaml::Error>),
}

impl From<serde_yaml::Error> for TemplateError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Settings(Arc::new(err))
    }
}

fn at(location: &Option<SourceLocation>) -> String {
    match location {
        Some(location) => format!("\n    at {}", location),
        None => String::new(),
    }
}

impl TemplateError {
    /// Build a compile error.
    pub fn compile(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self::Compile {
            message: message.into(),
            location,
        }
    }

    /// Build a `ReferenceError` for a name that is not in scope.
    pub fn undefined(name: &str, location: Option<SourceLocation>) -> Self {
        Self::Render {
            kind: RenderErrorKind::Reference,
            message: format!("{} is not defined", name),
            location,
        }
    }

    /// Build a `TypeError`.
    pub fn type_error(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self::Render {
            kind: RenderErrorKind::Type,
            message: message.into(),
            location,
        }
    }

    /// Map an IO failure on `path`, keeping "not found" distinct.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io {
                path,
                source: Arc::new(source),
            }
        }
    }

    /// Whether this error means the template file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Class name used in diagnostic output, e.g. `ReferenceError`.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFoundError",
            Self::Io { .. } | Self::OutsideRoot { .. } | Self::Settings(_) => "Error",
            Self::Compile { .. } => "SyntaxError",
            Self::Render {
                kind: RenderErrorKind::Reference,
                ..
            } => "ReferenceError",
            Self::Render {
                kind: RenderErrorKind::Type,
                ..
            } => "TypeError",
            Self::PartialDepth { .. } => "RangeError",
        }
    }

    /// `ClassName: message`, the text sent back with a 500.
    pub fn diagnostic(&self) -> String {
        format!("{}: {}", self.class_name(), self)
    }
}
