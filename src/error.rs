use thiserror::Error;

/// Failures that prevent a compile from producing any output at all.
/// Everything recoverable is reported as a [`crate::diagnostic::Diagnostic`].
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("cannot read source `{path}`: {reason}")]
    SourceRead { path: String, reason: String },

    #[error("entry `{0}` does not contain any component")]
    EntryWithoutComponents(String),

    #[error("invalid compile options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    #[error("failed to build read pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

impl CompileError {
    pub fn read(path: &str, reason: impl std::fmt::Display) -> Self {
        CompileError::SourceRead {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}
