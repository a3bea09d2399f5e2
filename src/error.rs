//! Error types for the log tail library.

use std::path::Path;
use thiserror::Error;

/// The main error type for log tail operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors when opening or reading the followed file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watching errors from the notify crate.
    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// The path cannot be followed (no file name component).
    #[error("Invalid file path: {message}")]
    InvalidPath { message: String },

    /// The followed path does not exist.
    #[error("File does not exist: {path}")]
    FileNotFound { path: String },

    /// A blocking open attempt panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A rotation was observed but the file could not be opened and watched again.
    #[error("Failed to reopen {path} after rotation: {source}")]
    Reopen {
        path: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn file_not_found(path: &Path) -> Self {
        Error::FileNotFound {
            path: path.display().to_string(),
        }
    }

    pub(crate) fn reopen(path: &Path, source: Error) -> Self {
        Error::Reopen {
            path: path.display().to_string(),
            source: Box::new(source),
        }
    }

    /// Returns `true` if the error means the followed path did not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::FileNotFound { .. } => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Error::Reopen { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// A convenient Result type for log tail operations.
pub type Result<T> = std::result::Result<T, Error>;
