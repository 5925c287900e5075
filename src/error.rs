/// Error types for the `OpenSCAD` parser.
use crate::ast::Position;
use crate::span::Span;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// A syntax error with source location.
///
/// The position is resolved through the source map, so errors inside spliced
/// `include` content point at the included file.
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ParseError {
    #[error("{position}: unexpected token: found `{found}`, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        position: Position,
        #[label("here")]
        span: miette::SourceSpan,
    },

    #[error("{position}: unexpected end of input, expected {expected}")]
    UnexpectedEof {
        expected: String,
        position: Position,
        #[label("here")]
        span: miette::SourceSpan,
    },

    #[error("{position}: {message}")]
    Custom {
        message: String,
        position: Position,
        #[label("{message}")]
        span: miette::SourceSpan,
    },
}

impl ParseError {
    #[must_use]
    pub fn unexpected_token(found: &str, expected: &str, position: Position, span: Span) -> Self {
        Self::UnexpectedToken {
            found: found.to_string(),
            expected: expected.to_string(),
            position,
            span: (span.start, span.len()).into(),
        }
    }

    #[must_use]
    pub fn unexpected_eof(expected: &str, position: Position, pos: usize) -> Self {
        Self::UnexpectedEof {
            expected: expected.to_string(),
            position,
            span: (pos, 0).into(),
        }
    }

    #[must_use]
    pub fn custom(message: &str, position: Position, span: Span) -> Self {
        Self::Custom {
            message: message.to_string(),
            position,
            span: (span.start, span.len()).into(),
        }
    }

    /// The resolved source position of the error.
    #[must_use]
    pub const fn position(&self) -> &Position {
        match self {
            Self::UnexpectedToken { position, .. }
            | Self::UnexpectedEof { position, .. }
            | Self::Custom { position, .. } => position,
        }
    }
}

/// Result type alias for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors surfaced by the file-level API.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("library file `{libfile}` not found in search paths")]
    LibraryNotFound { libfile: String },

    #[error("{position}: included file `{path}` not found")]
    IncludeNotFound { path: String, position: Position },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An offset that falls outside every segment of a source map (in a padding
/// gap, or beyond the combined length).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("offset {offset} is outside the mapped source")]
pub struct OutOfRange {
    pub offset: usize,
}

/// A serialized AST tree that cannot be rebuilt: unknown `_type` tag,
/// missing required field, or malformed JSON.
#[derive(Error, Debug)]
#[error("malformed AST tree: {reason}")]
pub struct DeserializeError {
    pub reason: String,
}

impl From<serde_json::Error> for DeserializeError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            reason: err.to_string(),
        }
    }
}
