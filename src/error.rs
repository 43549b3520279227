//! Error types for compiling patterns and decoding buffers.

use std::fmt;
use std::path::PathBuf;

/// Line/column position in pattern source (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors raised while turning pattern source into a program.
/// Any of these aborts the translation of the whole input.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{at}: syntax error: {message}")]
    Syntax { at: Location, message: String },
    #[error("{at}: unresolved type reference `{name}`")]
    UnresolvedTypeReference { name: String, at: Location },
    #[error("{at}: bitfield `{name}` declares {declared} bits but its backing type holds {capacity}")]
    BitFieldOverflow {
        name: String,
        declared: u32,
        capacity: u32,
        at: Location,
    },
    #[error("{at}: {message}")]
    InvalidDeclaration { message: String, at: Location },
    #[error("{at}: cannot find include `{path}`")]
    Include { path: String, at: Location },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<CompileError>,
    },
}

impl CompileError {
    pub(crate) fn syntax(at: Location, message: impl Into<String>) -> Self {
        CompileError::Syntax {
            at,
            message: message.into(),
        }
    }

    pub(crate) fn invalid(at: Location, message: impl Into<String>) -> Self {
        CompileError::InvalidDeclaration {
            message: message.into(),
            at,
        }
    }

    /// Attach the file the error came from, unless it already names one.
    pub(crate) fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            e @ (CompileError::InFile { .. } | CompileError::Io { .. }) => e,
            e => CompileError::InFile {
                path: path.into(),
                source: Box::new(e),
            },
        }
    }

    /// The underlying error with any file context stripped.
    pub fn root(&self) -> &CompileError {
        match self {
            CompileError::InFile { source, .. } => source.root(),
            e => e,
        }
    }
}

/// Errors raised while decoding a buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("buffer underrun at offset {offset}: wanted {wanted} byte(s), {available} available")]
    BufferUnderrun {
        offset: usize,
        wanted: usize,
        available: usize,
    },
    #[error("invalid cursor operand: {operand} cannot be used as a cursor")]
    InvalidCursorOperand { operand: String },
    #[error("invalid length {value} for array `{field}`")]
    InvalidLength { field: String, value: i128 },
    #[error("unsupported integer width: {width} byte(s)")]
    UnsupportedWidth { width: usize },
    #[error("unknown type `{name}`")]
    UnknownType { name: String },
}
