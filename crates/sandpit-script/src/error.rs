//! Error types for script staging and execution.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Failure to stage a request payload on disk.
#[derive(Debug, Error)]
pub enum StagingError {
    /// The temporary file could not be allocated.
    #[error("failed to create temp file: {0}")]
    Allocate(#[source] std::io::Error),

    /// The payload could not be written to the temporary file.
    #[error("failed to write script to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An interpreter failure (syntax or runtime), reported against the file it
/// was executing.
///
/// Rendered the way interpreters conventionally report diagnostics:
/// `path:line:col: message`. The rendered text embeds the script path, so
/// anything user-facing must go through [`crate::sanitize`] first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    /// File that was being executed.
    pub path: PathBuf,
    /// 1-based line, if the interpreter reported one.
    pub line: Option<usize>,
    /// 1-based column, if the interpreter reported one.
    pub column: Option<usize>,
    /// Interpreter message without position information.
    pub message: String,
    /// What kind of failure this was.
    pub kind: ScriptErrorKind,
}

/// Coarse classification of a [`ScriptError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptErrorKind {
    /// The script failed to parse.
    Syntax,
    /// The script raised an error while running.
    Runtime,
    /// The script exhausted its wall-clock or operation budget.
    Limit,
    /// The script file could not be read.
    Io,
}

impl ScriptError {
    /// Create an error with no position.
    pub fn new(path: impl Into<PathBuf>, kind: ScriptErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: None,
            column: None,
            message: message.into(),
            kind,
        }
    }

    /// Attach a position.
    pub fn at(mut self, line: Option<usize>, column: Option<usize>) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// Error raised when the script ran past its time limit.
    pub fn timed_out(path: &Path, limit: Duration) -> Self {
        Self::new(
            path,
            ScriptErrorKind::Limit,
            format!("script exceeded time limit of {limit:?}"),
        )
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ScriptError {}

/// Errors from the execution guard.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The guarded closure panicked or its worker was cancelled.
    #[error("execution worker failed: {0}")]
    Worker(String),
}

/// Result type for script operations.
pub type ScriptResult<T> = std::result::Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_position() {
        let err = ScriptError::new("/tmp/exec_script123.rhai", ScriptErrorKind::Syntax, "oops")
            .at(Some(3), Some(7));
        assert_eq!(err.to_string(), "/tmp/exec_script123.rhai:3:7: oops");
    }

    #[test]
    fn test_display_without_position() {
        let err = ScriptError::new("/tmp/a.rhai", ScriptErrorKind::Io, "cannot read");
        assert_eq!(err.to_string(), "/tmp/a.rhai: cannot read");
    }

    #[test]
    fn test_display_line_only() {
        let err = ScriptError::new("/tmp/a.rhai", ScriptErrorKind::Runtime, "boom").at(Some(2), None);
        assert_eq!(err.to_string(), "/tmp/a.rhai:2: boom");
    }

    #[test]
    fn test_timed_out() {
        let err = ScriptError::timed_out(Path::new("/tmp/x"), Duration::from_secs(2));
        assert_eq!(err.kind, ScriptErrorKind::Limit);
        assert!(err.message.contains("time limit"));
    }
}
