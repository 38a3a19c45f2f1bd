use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the library
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read {}: {source}", .file.display())]
    Read {
        file: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {}: {message}", .file.display())]
    Parse { file: PathBuf, message: String },

    #[error(transparent)]
    CyclicPartial(#[from] CyclicPartialError),

    #[error(transparent)]
    MalformedTemplate(#[from] MalformedTemplateError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether the error comes from reading or parsing a template file.
    ///
    /// The walker absorbs these for partials and propagates everything else.
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Error::Read { .. } | Error::Parse { .. })
    }
}

/// Raised when a partial includes itself, directly or through other partials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cyclic partial inclusion: {}", display_chain(.chain))]
pub struct CyclicPartialError {
    /// The inclusion chain, starting at the root template and ending with the
    /// partial that closed the cycle.
    pub chain: Vec<PathBuf>,
}

/// Raised when the template AST violates the call/block node contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed template {}{}: {message}", .file.display(), line_suffix(.line))]
pub struct MalformedTemplateError {
    pub file: PathBuf,
    pub line: Option<usize>,
    pub message: String,
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|line| format!(":{}", line)).unwrap_or_default()
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML serialization error: {}", err))
    }
}
