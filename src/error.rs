use std::path::PathBuf;
use thiserror::Error;

// Every failure aborts the run; there is no retry path.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Missing or unusable run configuration (project path, time_end, flow schedule)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Degenerate grid dimensions or malformed node arrays
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// An output sink refused a step's write
    #[error("failed to persist {sink} output: {message}")]
    Persistence { sink: &'static str, message: String },

    #[error("failed to open project {path:?}: {source}")]
    ProjectOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
}

impl SolverError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SolverError::Configuration(message.into())
    }

    pub fn invalid_grid(message: impl Into<String>) -> Self {
        SolverError::InvalidGrid(message.into())
    }

    pub fn persistence(sink: &'static str, error: impl std::fmt::Display) -> Self {
        SolverError::Persistence {
            sink,
            message: error.to_string(),
        }
    }
}

pub type SolverResult<T> = Result<T, SolverError>;
