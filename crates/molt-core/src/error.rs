//! Error taxonomy and exit codes for molt.
//!
//! This module provides the unified error type (`MoltError`) every refactoring
//! surfaces to its caller. Subsystem errors (syntax tree, batch edits, text
//! search) are bridged into it with `From` impls so that `?` works across
//! crate boundaries.
//!
//! ## Exit codes
//!
//! - `2`: Invalid arguments or malformed target strings
//! - `3`: Resolution errors (class, method, field or function not found)
//! - `4`: Naming conflicts (the refactoring would shadow a declaration)
//! - `5`: Parse errors and unsupported usage patterns
//! - `10`: Internal errors (I/O failures, unexpected state)
//!
//! Nothing in molt retries; the first error ends the run.

use std::fmt;
use std::io;
use std::path::Path;

use thiserror::Error;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Process exit codes for each error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad target string, missing parameter).
    InvalidArguments = 2,
    /// Resolution errors (named element does not exist).
    ResolutionError = 3,
    /// The new declaration would collide with an existing one.
    ConflictError = 4,
    /// Source could not be parsed, or a usage pattern is not supported.
    ParseError = 5,
    /// Internal errors (I/O, bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for every refactoring and engine component.
#[derive(Debug, Error)]
pub enum MoltError {
    /// A target string or parameter does not follow the expected grammar.
    ///
    /// Always raised before any tree is touched.
    #[error("format error: {message}")]
    Format { message: String },

    /// A class, method, field or function required by the refactoring is missing.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    /// The refactoring would introduce a declaration that already exists.
    #[error("name conflict: '{name}' already exists in {scope}")]
    Conflict { name: String, scope: String },

    /// The source text is not valid Python.
    #[error("parse error in {file} at line {line}: {message}")]
    Parse {
        file: String,
        line: u32,
        message: String,
    },

    /// A usage pattern was requested that has no validator.
    #[error("usage pattern '{pattern}' is not implemented")]
    UnsupportedPattern { pattern: String },

    /// Invalid arguments (unknown refactoring, malformed parameter).
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A bug: e.g. a rewrite produced source that no longer parses.
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result type used across molt.
pub type MoltResult<T> = Result<T, MoltError>;

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&MoltError> for OutputErrorCode {
    fn from(err: &MoltError) -> Self {
        match err {
            MoltError::Format { .. } => OutputErrorCode::InvalidArguments,
            MoltError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            MoltError::NotFound { .. } => OutputErrorCode::ResolutionError,
            MoltError::Conflict { .. } => OutputErrorCode::ConflictError,
            MoltError::Parse { .. } => OutputErrorCode::ParseError,
            MoltError::UnsupportedPattern { .. } => OutputErrorCode::ParseError,
            MoltError::Io { .. } => OutputErrorCode::InternalError,
            MoltError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<MoltError> for OutputErrorCode {
    fn from(err: MoltError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl MoltError {
    /// Create a format error.
    pub fn format(message: impl Into<String>) -> Self {
        MoltError::Format {
            message: message.into(),
        }
    }

    /// Create a not-found error for an element of the given kind.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        MoltError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a naming conflict error.
    pub fn conflict(name: impl Into<String>, scope: impl Into<String>) -> Self {
        MoltError::Conflict {
            name: name.into(),
            scope: scope.into(),
        }
    }

    /// Create a parse error for a file.
    pub fn parse(file: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        MoltError::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an unsupported usage pattern error.
    pub fn unsupported_pattern(pattern: impl Into<String>) -> Self {
        MoltError::UnsupportedPattern {
            pattern: pattern.into(),
        }
    }

    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        MoltError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: &Path, source: io::Error) -> Self {
        MoltError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        MoltError::Internal {
            message: message.into(),
        }
    }

    /// Attach a file name to a parse error that was raised without one.
    ///
    /// Other variants are returned unchanged.
    pub fn in_file(self, path: &Path) -> Self {
        match self {
            MoltError::Parse { line, message, .. } => MoltError::Parse {
                file: path.display().to_string(),
                line,
                message,
            },
            other => other,
        }
    }

    /// Exit code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
