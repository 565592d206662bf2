//! Error types for tokenrules.
//!
//! Only compile-time and usage problems are errors. Evaluating an expression or
//! matching a pattern never fails: type mismatches degrade to `Null`, `NaN`, an
//! empty list or `false` (see `expr::eval`).

use thiserror::Error;

/// Result type for tokenrules operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for tokenrules operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Malformed expression or token pattern text.
    ///
    /// `position` is the byte offset into the compiled text.
    #[error("compile error at {position}: {message}")]
    Compile { position: usize, message: String },

    /// Malformed rule program (structure, unknown keys, undefined captures, or a
    /// nested expression/pattern error reported against its program line).
    #[error("program error at line {line}: {message}")]
    Program { line: usize, message: String },

    /// An operation requested on an expression whose type does not support it.
    #[error("usage error: {0}")]
    Usage(String),

    /// IO error while reading a program or lexicon file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a compile error at `position`.
    #[must_use]
    pub fn compile(position: usize, msg: impl Into<String>) -> Self {
        Self::Compile { position, message: msg.into() }
    }

    /// Create a program error at (1-based) `line`.
    #[must_use]
    pub fn program(line: usize, msg: impl Into<String>) -> Self {
        Self::Program { line, message: msg.into() }
    }

    /// Create a usage error.
    #[must_use]
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// True for errors raised while compiling expressions, patterns or programs.
    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Compile { .. } | Self::Program { .. })
    }
}
