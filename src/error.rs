use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    // Construction
    #[error("no search roots given")]
    NoRoots,

    #[error("search root is an empty path")]
    EmptyRoot,

    #[error("search root does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("search root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("empty search pattern")]
    EmptyPattern,

    #[error("invalid search pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid thread count: {0}")]
    InvalidThreadCount(usize),

    #[error("invalid fan-out level count: {0}")]
    InvalidFanOut(usize),

    // Runtime
    #[error("search cancelled")]
    Cancelled,

    #[error("IO error at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("thread pool failure: {0}")]
    ThreadPool(String),

    #[error("match observer panicked: {0}")]
    ObserverPanicked(String),

    #[error("search task failed: {0}")]
    Task(String),

    #[error("search has no cancellation scope")]
    NotCancellable,
}

impl SearchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The path this error occurred at, if applicable.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::RootNotFound(p) | Self::NotADirectory(p) | Self::Io { path: p, .. } => Some(p),
            _ => None,
        }
    }

    /// Whether this error is the cancellation signal rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether a caller may retry or continue after this error.
    ///
    /// Cancellation is recoverable: the session ended cleanly and reported
    /// its outcome. Configuration errors and uncatalogued IO failures are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Cancelled | Self::NotCancellable)
    }
}
